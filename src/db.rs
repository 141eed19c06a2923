use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::grading::PointScale;
use crate::models::{
    credit_units_from_db, Baseline, CourseDraft, CourseRecord, NewProfile, ProfileRecord, Score,
    SemesterRecord, ValidationError,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to apply schema migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("the database file {} was deleted while the app is running", .0.display())]
    DatabaseMissing(PathBuf),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    fn not_found(entity: &'static str, id: Uuid) -> Self {
        StoreError::NotFound { entity, id }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle over the local SQLite file. One connection, used sequentially.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    path: PathBuf,
}

// Callers clamp the stamp above the current maximum so selections never tie.
fn selection_stamp() -> i64 {
    Utc::now().timestamp_micros()
}

fn profile_from_row(row: &SqliteRow) -> StoreResult<ProfileRecord> {
    let point_scale = PointScale::try_from(row.try_get::<i64, _>("point_scale")?)?;
    let previous_credit_units = credit_units_from_db(row.try_get("previous_credit_units")?)?;
    let baseline = Baseline::new(
        point_scale,
        row.try_get("previous_cgpa")?,
        previous_credit_units,
    )?;

    Ok(ProfileRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        color: row.try_get("color")?,
        point_scale,
        baseline,
    })
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

impl Store {
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(path = %path.display(), "database ready");

        Ok(Store {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    fn ensure_present(&self) -> StoreResult<()> {
        if self.path.exists() {
            Ok(())
        } else {
            Err(StoreError::DatabaseMissing(self.path.clone()))
        }
    }

    pub async fn create_profile(&self, profile: &NewProfile) -> StoreResult<()> {
        self.ensure_present()?;
        sqlx::query(
            r#"
            INSERT INTO profiles (id, name, color, point_scale, last_selected_time)
            VALUES (
                ?, ?, ?, ?,
                MAX(?, (SELECT COALESCE(MAX(last_selected_time), 0) + 1 FROM profiles))
            )
            "#,
        )
        .bind(profile.id)
        .bind(&profile.name)
        .bind(&profile.color)
        .bind(i64::from(profile.point_scale))
        .bind(selection_stamp())
        .execute(&self.pool)
        .await?;

        debug!(profile_id = %profile.id, name = %profile.name, "profile created");
        Ok(())
    }

    pub async fn delete_profile(&self, profile_id: Uuid) -> StoreResult<()> {
        self.ensure_present()?;
        let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(profile_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("profile", profile_id));
        }

        debug!(%profile_id, "profile deleted");
        Ok(())
    }

    pub async fn list_profiles(&self) -> StoreResult<Vec<ProfileRecord>> {
        self.ensure_present()?;
        let rows = sqlx::query(
            r#"
            SELECT id, name, color, point_scale, previous_cgpa, previous_credit_units
            FROM profiles
            ORDER BY last_selected_time DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(profile_from_row).collect()
    }

    pub async fn find_profile(&self, profile_id: Uuid) -> StoreResult<ProfileRecord> {
        self.ensure_present()?;
        let row = sqlx::query(
            r#"
            SELECT id, name, color, point_scale, previous_cgpa, previous_credit_units
            FROM profiles
            WHERE id = ?
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("profile", profile_id))?;

        profile_from_row(&row)
    }

    /// Most recently selected profile; creates a default one on an empty database.
    pub async fn current_profile(&self) -> StoreResult<ProfileRecord> {
        self.ensure_present()?;
        let row = sqlx::query(
            r#"
            SELECT id, name, color, point_scale, previous_cgpa, previous_credit_units
            FROM profiles
            ORDER BY last_selected_time DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => profile_from_row(&row),
            None => {
                let profile = NewProfile::first_run();
                self.create_profile(&profile).await?;
                info!(profile_id = %profile.id, "no profile found, created a default one");
                self.find_profile(profile.id).await
            }
        }
    }

    pub async fn select_profile(&self, profile_id: Uuid) -> StoreResult<()> {
        self.ensure_present()?;
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET last_selected_time = MAX(?, (SELECT MAX(last_selected_time) + 1 FROM profiles))
            WHERE id = ?
            "#,
        )
        .bind(selection_stamp())
        .bind(profile_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("profile", profile_id));
        }
        Ok(())
    }

    /// Switches the scale and rescales the stored previous CGPA in one transaction,
    /// so the row never holds a baseline above its own scale.
    pub async fn set_point_scale(
        &self,
        profile_id: Uuid,
        scale: PointScale,
    ) -> StoreResult<ProfileRecord> {
        self.ensure_present()?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, name, color, point_scale, previous_cgpa, previous_credit_units
            FROM profiles
            WHERE id = ?
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("profile", profile_id))?;
        let mut profile = profile_from_row(&row)?;

        profile.baseline = profile.baseline.rescaled(profile.point_scale, scale);
        profile.point_scale = scale;

        sqlx::query("UPDATE profiles SET point_scale = ?, previous_cgpa = ? WHERE id = ?")
            .bind(i64::from(scale))
            .bind(profile.baseline.previous_cgpa())
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(%profile_id, %scale, "point scale changed");
        Ok(profile)
    }

    pub async fn set_baseline(&self, profile_id: Uuid, baseline: &Baseline) -> StoreResult<()> {
        self.ensure_present()?;
        let result = sqlx::query(
            "UPDATE profiles SET previous_cgpa = ?, previous_credit_units = ? WHERE id = ?",
        )
        .bind(baseline.previous_cgpa())
        .bind(i64::from(baseline.previous_credit_units()))
        .bind(profile_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("profile", profile_id));
        }
        Ok(())
    }

    pub async fn create_semester(&self, semester_id: Uuid, profile_id: Uuid) -> StoreResult<()> {
        self.ensure_present()?;
        sqlx::query("INSERT INTO semesters (id, parent_profile_id) VALUES (?, ?)")
            .bind(semester_id)
            .bind(profile_id)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    StoreError::not_found("profile", profile_id)
                } else {
                    err.into()
                }
            })?;

        debug!(%semester_id, %profile_id, "semester created");
        Ok(())
    }

    pub async fn delete_semester(&self, semester_id: Uuid) -> StoreResult<()> {
        self.ensure_present()?;
        let result = sqlx::query("DELETE FROM semesters WHERE id = ?")
            .bind(semester_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("semester", semester_id));
        }
        Ok(())
    }

    pub async fn create_course(
        &self,
        course: &CourseRecord,
        semester_id: Uuid,
    ) -> StoreResult<()> {
        self.ensure_present()?;
        sqlx::query(
            r#"
            INSERT INTO courses (id, parent_semester_id, name, score, credit_units)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(course.id)
        .bind(semester_id)
        .bind(&course.name)
        .bind(course.score.value())
        .bind(i64::from(course.credit_units))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                StoreError::not_found("semester", semester_id)
            } else {
                err.into()
            }
        })?;

        debug!(course_id = %course.id, %semester_id, "course created");
        Ok(())
    }

    pub async fn create_course_from_draft(
        &self,
        draft: CourseDraft,
        semester_id: Uuid,
    ) -> StoreResult<CourseRecord> {
        let course = draft.into_record(Uuid::new_v4());
        self.create_course(&course, semester_id).await?;
        Ok(course)
    }

    pub async fn delete_course(&self, course_id: Uuid) -> StoreResult<()> {
        self.ensure_present()?;
        let result = sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(course_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("course", course_id));
        }
        Ok(())
    }

    pub async fn update_course_name(&self, course_id: Uuid, name: &str) -> StoreResult<()> {
        self.ensure_present()?;
        let result = sqlx::query("UPDATE courses SET name = ? WHERE id = ?")
            .bind(name)
            .bind(course_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("course", course_id));
        }
        Ok(())
    }

    pub async fn update_course_score(&self, course_id: Uuid, score: Score) -> StoreResult<()> {
        self.ensure_present()?;
        let result = sqlx::query("UPDATE courses SET score = ? WHERE id = ?")
            .bind(score.value())
            .bind(course_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("course", course_id));
        }
        Ok(())
    }

    pub async fn update_course_credit_units(
        &self,
        course_id: Uuid,
        credit_units: u32,
    ) -> StoreResult<()> {
        self.ensure_present()?;
        let result = sqlx::query("UPDATE courses SET credit_units = ? WHERE id = ?")
            .bind(i64::from(credit_units))
            .bind(course_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("course", course_id));
        }
        Ok(())
    }

    /// Semesters of a profile with their courses, both in insertion order.
    pub async fn load_semesters(&self, profile_id: Uuid) -> StoreResult<Vec<SemesterRecord>> {
        self.ensure_present()?;
        let rows = sqlx::query(
            r#"
            SELECT s.id AS semester_id,
                   c.id AS course_id, c.name, c.score, c.credit_units
            FROM semesters s
            LEFT JOIN courses c ON c.parent_semester_id = s.id
            WHERE s.parent_profile_id = ?
            ORDER BY s.rowid, c.rowid
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        let mut semesters: Vec<SemesterRecord> = Vec::new();

        for row in rows {
            let semester_id: Uuid = row.try_get("semester_id")?;
            if semesters.last().map(|semester| semester.id) != Some(semester_id) {
                semesters.push(SemesterRecord {
                    id: semester_id,
                    courses: Vec::new(),
                });
            }

            let Some(course_id) = row.try_get::<Option<Uuid>, _>("course_id")? else {
                continue;
            };

            let course = CourseRecord {
                id: course_id,
                name: row.try_get("name")?,
                score: Score::new(row.try_get("score")?)?,
                credit_units: credit_units_from_db(row.try_get("credit_units")?)?,
            };

            if let Some(semester) = semesters.last_mut() {
                semester.courses.push(course);
            }
        }

        Ok(semesters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("nested/database.sqlite3"))
            .await
            .unwrap();
        (dir, store)
    }

    fn course(name: &str, score: f64, credit_units: u32) -> CourseRecord {
        CourseRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            score: Score::new(score).unwrap(),
            credit_units,
        }
    }

    #[tokio::test]
    async fn first_run_creates_default_profile() {
        let (_dir, store) = temp_store().await;

        let profile = store.current_profile().await.unwrap();
        assert_eq!(profile.name, "default");
        assert_eq!(profile.point_scale, PointScale::Five);
        assert_eq!(profile.baseline, Baseline::default());

        let again = store.current_profile().await.unwrap();
        assert_eq!(again.id, profile.id);
        assert_eq!(store.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn profiles_are_listed_by_latest_selection() {
        let (_dir, store) = temp_store().await;
        let first = store.current_profile().await.unwrap();

        let second = NewProfile::named("Test Profile", Some("#123abc")).unwrap();
        store.create_profile(&second).await.unwrap();
        assert_eq!(store.current_profile().await.unwrap().id, second.id);

        store.select_profile(first.id).await.unwrap();
        assert_eq!(store.current_profile().await.unwrap().id, first.id);

        let ids: Vec<Uuid> = store
            .list_profiles()
            .await
            .unwrap()
            .iter()
            .map(|profile| profile.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);

        store.delete_profile(first.id).await.unwrap();
        let remaining = store.list_profiles().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].color, "#123abc");
    }

    #[tokio::test]
    async fn unknown_ids_report_not_found() {
        let (_dir, store) = temp_store().await;
        let missing = Uuid::new_v4();

        assert!(matches!(
            store.select_profile(missing).await,
            Err(StoreError::NotFound { entity: "profile", .. })
        ));
        assert!(matches!(
            store.create_semester(Uuid::new_v4(), missing).await,
            Err(StoreError::NotFound { entity: "profile", .. })
        ));
        assert!(matches!(
            store.create_course(&course("Orphan", 50.0, 1), missing).await,
            Err(StoreError::NotFound { entity: "semester", .. })
        ));
        assert!(matches!(
            store.update_course_score(missing, Score::ZERO).await,
            Err(StoreError::NotFound { entity: "course", .. })
        ));
    }

    #[tokio::test]
    async fn courses_round_trip_in_insertion_order() {
        let (_dir, store) = temp_store().await;
        let profile = store.current_profile().await.unwrap();

        let first_semester = Uuid::new_v4();
        let second_semester = Uuid::new_v4();
        store.create_semester(first_semester, profile.id).await.unwrap();
        store.create_semester(second_semester, profile.id).await.unwrap();

        let math = course("Math-111", 0.0, 0);
        let physics = course("Phys-101", 0.0, 0);
        store.create_course(&math, second_semester).await.unwrap();
        store.create_course(&physics, second_semester).await.unwrap();

        store.update_course_name(math.id, "Math-112").await.unwrap();
        store
            .update_course_score(math.id, Score::new(88.5).unwrap())
            .await
            .unwrap();
        store.update_course_credit_units(math.id, 4).await.unwrap();

        let semesters = store.load_semesters(profile.id).await.unwrap();
        assert_eq!(semesters.len(), 2);
        assert_eq!(semesters[0].id, first_semester);
        assert!(semesters[0].courses.is_empty());
        assert_eq!(semesters[1].id, second_semester);
        assert_eq!(
            semesters[1].courses,
            vec![
                CourseRecord {
                    id: math.id,
                    name: "Math-112".to_string(),
                    score: Score::new(88.5).unwrap(),
                    credit_units: 4,
                },
                physics.clone(),
            ]
        );

        store.delete_course(math.id).await.unwrap();
        let semesters = store.load_semesters(profile.id).await.unwrap();
        assert_eq!(semesters[1].courses, vec![physics]);
    }

    #[tokio::test]
    async fn deleting_profile_cascades() {
        let (_dir, store) = temp_store().await;
        let profile = store.current_profile().await.unwrap();
        let semester_id = Uuid::new_v4();
        store.create_semester(semester_id, profile.id).await.unwrap();
        let math = course("Math-111", 91.0, 3);
        store.create_course(&math, semester_id).await.unwrap();

        store.delete_profile(profile.id).await.unwrap();

        assert!(store.list_profiles().await.unwrap().is_empty());
        assert!(store.load_semesters(profile.id).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_course(math.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn deleting_semester_cascades_to_courses() {
        let (_dir, store) = temp_store().await;
        let profile = store.current_profile().await.unwrap();
        let semester_id = Uuid::new_v4();
        store.create_semester(semester_id, profile.id).await.unwrap();
        let math = course("Math-111", 91.0, 3);
        store.create_course(&math, semester_id).await.unwrap();

        store.delete_semester(semester_id).await.unwrap();

        assert!(store.load_semesters(profile.id).await.unwrap().is_empty());
        assert!(matches!(
            store.update_course_name(math.id, "gone").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn profile_settings_persist() {
        let (_dir, store) = temp_store().await;
        let profile = store.current_profile().await.unwrap();

        store.set_point_scale(profile.id, PointScale::Four).await.unwrap();
        let baseline = Baseline::new(PointScale::Four, 3.25, 45).unwrap();
        store.set_baseline(profile.id, &baseline).await.unwrap();

        let reloaded = store.current_profile().await.unwrap();
        assert_eq!(reloaded.point_scale, PointScale::Four);
        assert_eq!(reloaded.baseline, baseline);
    }

    #[tokio::test]
    async fn scale_change_rescales_stored_baseline() {
        let (_dir, store) = temp_store().await;
        let profile = store.current_profile().await.unwrap();
        let baseline = Baseline::new(PointScale::Five, 4.5, 30).unwrap();
        store.set_baseline(profile.id, &baseline).await.unwrap();

        let changed = store
            .set_point_scale(profile.id, PointScale::Four)
            .await
            .unwrap();
        assert_eq!(changed.point_scale, PointScale::Four);
        assert!((changed.baseline.previous_cgpa() - 3.6).abs() < 0.001);

        let listed = store.list_profiles().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].point_scale, PointScale::Four);
        assert!((listed[0].baseline.previous_cgpa() - 3.6).abs() < 0.001);
        assert_eq!(listed[0].baseline.previous_credit_units(), 30);
        assert_eq!(store.current_profile().await.unwrap(), changed);
    }

    #[tokio::test]
    async fn scale_change_on_missing_profile_writes_nothing() {
        let (_dir, store) = temp_store().await;
        let profile = store.current_profile().await.unwrap();

        assert!(matches!(
            store.set_point_scale(Uuid::new_v4(), PointScale::Four).await,
            Err(StoreError::NotFound { entity: "profile", .. })
        ));
        assert_eq!(store.current_profile().await.unwrap(), profile);
    }

    #[tokio::test]
    async fn schema_check_blocks_scale_outside_four_or_five() {
        let (_dir, store) = temp_store().await;
        let profile = store.current_profile().await.unwrap();

        let result = sqlx::query("UPDATE profiles SET point_scale = 7 WHERE id = ?")
            .bind(profile.id)
            .execute(&store.pool)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn deleted_database_file_is_reported() {
        let (dir, store) = temp_store().await;
        store.current_profile().await.unwrap();

        std::fs::remove_file(dir.path().join("nested/database.sqlite3")).unwrap();

        assert!(matches!(
            store.list_profiles().await,
            Err(StoreError::DatabaseMissing(_))
        ));
    }
}
