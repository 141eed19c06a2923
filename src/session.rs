use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregate::{summarize_profile, ProfileSummary};
use crate::db::{Store, StoreError, StoreResult};
use crate::grading::{grade_for_score, reference_score_for_grade, Grade, PointScale};
use crate::models::{
    Baseline, CourseDraft, CourseRecord, NewProfile, ProfileRecord, Score, SemesterRecord,
};

type SummaryListener = Box<dyn FnMut(&ProfileSummary)>;

/// The current profile with its loaded tree and latest totals.
///
/// Every mutation is written to the store first, then applied to the in-memory
/// tree, then the whole summary is recomputed and pushed to subscribers.
pub struct Session {
    store: Store,
    profile: ProfileRecord,
    semesters: Vec<SemesterRecord>,
    summary: ProfileSummary,
    listeners: Vec<SummaryListener>,
}

impl Session {
    pub async fn open(store: Store) -> StoreResult<Self> {
        let profile = store.current_profile().await?;
        let semesters = store.load_semesters(profile.id).await?;
        let summary = summarize_profile(profile.point_scale, &semesters, &profile.baseline);

        Ok(Session {
            store,
            profile,
            semesters,
            summary,
            listeners: Vec::new(),
        })
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ProfileSummary) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    pub fn profile(&self) -> &ProfileRecord {
        &self.profile
    }

    pub fn semesters(&self) -> &[SemesterRecord] {
        &self.semesters
    }

    pub fn summary(&self) -> &ProfileSummary {
        &self.summary
    }

    fn recompute(&mut self) {
        self.summary = summarize_profile(
            self.profile.point_scale,
            &self.semesters,
            &self.profile.baseline,
        );
        debug!(
            profile_id = %self.profile.id,
            credits = self.summary.grand_credits,
            cgpa = ?self.summary.cgpa,
            "summary recomputed"
        );

        for listener in self.listeners.iter_mut() {
            listener(&self.summary);
        }
    }

    async fn reload(&mut self) -> StoreResult<()> {
        self.profile = self.store.current_profile().await?;
        self.semesters = self.store.load_semesters(self.profile.id).await?;
        self.recompute();
        Ok(())
    }

    fn semester_mut(&mut self, semester_id: Uuid) -> StoreResult<&mut SemesterRecord> {
        self.semesters
            .iter_mut()
            .find(|semester| semester.id == semester_id)
            .ok_or(StoreError::NotFound {
                entity: "semester",
                id: semester_id,
            })
    }

    fn course_mut(&mut self, course_id: Uuid) -> StoreResult<&mut CourseRecord> {
        self.semesters
            .iter_mut()
            .flat_map(|semester| semester.courses.iter_mut())
            .find(|course| course.id == course_id)
            .ok_or(StoreError::NotFound {
                entity: "course",
                id: course_id,
            })
    }

    fn course(&self, course_id: Uuid) -> StoreResult<&CourseRecord> {
        self.semesters
            .iter()
            .flat_map(|semester| semester.courses.iter())
            .find(|course| course.id == course_id)
            .ok_or(StoreError::NotFound {
                entity: "course",
                id: course_id,
            })
    }

    /// Creates a profile and switches to it.
    pub async fn create_profile(&mut self, profile: NewProfile) -> StoreResult<Uuid> {
        self.store.create_profile(&profile).await?;
        info!(profile_id = %profile.id, name = %profile.name, "switched to new profile");
        self.reload().await?;
        Ok(profile.id)
    }

    pub async fn select_profile(&mut self, profile_id: Uuid) -> StoreResult<()> {
        self.store.select_profile(profile_id).await?;
        self.reload().await
    }

    /// Deleting the active profile falls back to the next most recent one,
    /// or a fresh default profile when none remain.
    pub async fn delete_profile(&mut self, profile_id: Uuid) -> StoreResult<()> {
        self.store.delete_profile(profile_id).await?;
        info!(%profile_id, "profile deleted");

        if profile_id == self.profile.id {
            self.reload().await?;
        }
        Ok(())
    }

    pub async fn add_semester(&mut self) -> StoreResult<Uuid> {
        let semester_id = Uuid::new_v4();
        self.store
            .create_semester(semester_id, self.profile.id)
            .await?;

        self.semesters.push(SemesterRecord {
            id: semester_id,
            courses: Vec::new(),
        });
        self.recompute();
        Ok(semester_id)
    }

    pub async fn remove_semester(&mut self, semester_id: Uuid) -> StoreResult<()> {
        self.semester_mut(semester_id)?;
        self.store.delete_semester(semester_id).await?;

        self.semesters.retain(|semester| semester.id != semester_id);
        self.recompute();
        Ok(())
    }

    pub async fn add_course(&mut self, semester_id: Uuid, draft: CourseDraft) -> StoreResult<Uuid> {
        self.semester_mut(semester_id)?;
        let course = self
            .store
            .create_course_from_draft(draft, semester_id)
            .await?;
        let course_id = course.id;

        self.semester_mut(semester_id)?.courses.push(course);
        self.recompute();
        Ok(course_id)
    }

    pub async fn remove_course(&mut self, course_id: Uuid) -> StoreResult<()> {
        self.course(course_id)?;
        self.store.delete_course(course_id).await?;

        for semester in self.semesters.iter_mut() {
            semester.courses.retain(|course| course.id != course_id);
        }
        self.recompute();
        Ok(())
    }

    pub async fn rename_course(&mut self, course_id: Uuid, name: &str) -> StoreResult<()> {
        self.course(course_id)?;
        self.store.update_course_name(course_id, name).await?;

        self.course_mut(course_id)?.name = name.to_string();
        self.recompute();
        Ok(())
    }

    pub async fn set_course_score(&mut self, course_id: Uuid, score: Score) -> StoreResult<()> {
        self.course(course_id)?;
        self.store.update_course_score(course_id, score).await?;

        self.course_mut(course_id)?.score = score;
        self.recompute();
        Ok(())
    }

    pub async fn set_course_credit_units(
        &mut self,
        course_id: Uuid,
        credit_units: u32,
    ) -> StoreResult<()> {
        self.course(course_id)?;
        self.store
            .update_course_credit_units(course_id, credit_units)
            .await?;

        self.course_mut(course_id)?.credit_units = credit_units;
        self.recompute();
        Ok(())
    }

    /// Moves the score to the grade's reference score. `Undefined` leaves the course untouched.
    pub async fn set_course_grade(&mut self, course_id: Uuid, grade: Grade) -> StoreResult<Score> {
        let current = self.course(course_id)?.score;

        if grade == Grade::Undefined || grade_for_score(current) == grade {
            return Ok(current);
        }

        let score = Score::new(reference_score_for_grade(grade))?;
        self.set_course_score(course_id, score).await?;
        Ok(score)
    }

    pub async fn set_baseline(
        &mut self,
        previous_cgpa: f64,
        previous_credit_units: u32,
    ) -> StoreResult<()> {
        let baseline = Baseline::new(
            self.profile.point_scale,
            previous_cgpa,
            previous_credit_units,
        )?;
        self.store.set_baseline(self.profile.id, &baseline).await?;

        self.profile.baseline = baseline;
        self.recompute();
        Ok(())
    }

    /// Grade points are re-derived from stored scores; the baseline CGPA is rescaled.
    pub async fn set_point_scale(&mut self, scale: PointScale) -> StoreResult<()> {
        if scale == self.profile.point_scale {
            return Ok(());
        }

        self.profile = self.store.set_point_scale(self.profile.id, scale).await?;
        info!(profile_id = %self.profile.id, %scale, "point scale changed");

        self.recompute();
        Ok(())
    }
}
