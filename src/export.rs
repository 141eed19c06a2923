use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::{Store, StoreResult};
use crate::grading::PointScale;
use crate::models::{CourseRecord, ProfileRecord, Score, SemesterRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedProfileData {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub point_scale: PointScale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedCourse {
    pub id: Uuid,
    pub name: String,
    pub score: Score,
    pub credit_units: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedSemester {
    /// Reserved for per-semester metadata; always exported as `null`.
    pub semester_data: Option<serde_json::Value>,
    pub courses: Vec<ExportedCourse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedProfile {
    pub profile_data: ExportedProfileData,
    pub semesters: Vec<ExportedSemester>,
}

impl From<&ProfileRecord> for ExportedProfileData {
    fn from(profile: &ProfileRecord) -> Self {
        ExportedProfileData {
            id: profile.id,
            name: profile.name.clone(),
            color: profile.color.clone(),
            point_scale: profile.point_scale,
        }
    }
}

impl From<CourseRecord> for ExportedCourse {
    fn from(course: CourseRecord) -> Self {
        ExportedCourse {
            id: course.id,
            name: course.name,
            score: course.score,
            credit_units: course.credit_units,
        }
    }
}

impl From<SemesterRecord> for ExportedSemester {
    fn from(semester: SemesterRecord) -> Self {
        ExportedSemester {
            semester_data: None,
            courses: semester.courses.into_iter().map(ExportedCourse::from).collect(),
        }
    }
}

pub async fn build_export(store: &Store) -> StoreResult<Vec<ExportedProfile>> {
    let mut exported = Vec::new();

    for profile in store.list_profiles().await? {
        let semesters = store
            .load_semesters(profile.id)
            .await?
            .into_iter()
            .map(ExportedSemester::from)
            .collect();

        exported.push(ExportedProfile {
            profile_data: ExportedProfileData::from(&profile),
            semesters,
        });
    }

    Ok(exported)
}

pub async fn export_to_file(store: &Store, path: &Path) -> StoreResult<usize> {
    let document = build_export(store).await?;

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!(path = %path.display(), profiles = document.len(), "exported data");
    Ok(document.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProfile;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn export_matches_document_shape() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("database.sqlite3"))
            .await
            .unwrap();

        let profile = NewProfile::named("Test Profile", Some("#000000")).unwrap();
        store.create_profile(&profile).await.unwrap();

        let semester_id = Uuid::new_v4();
        store.create_semester(semester_id, profile.id).await.unwrap();
        let course = CourseRecord {
            id: Uuid::new_v4(),
            name: "Math-112".to_string(),
            score: Score::new(87.25).unwrap(),
            credit_units: 3,
        };
        store.create_course(&course, semester_id).await.unwrap();

        let path = dir.path().join("exported_data.json");
        let written = export_to_file(&store, &path).await.unwrap();
        assert_eq!(written, 1);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            value,
            json!([
                {
                    "profile_data": {
                        "id": profile.id,
                        "name": "Test Profile",
                        "color": "#000000",
                        "point_scale": 5
                    },
                    "semesters": [
                        {
                            "semester_data": null,
                            "courses": [
                                {
                                    "id": course.id,
                                    "name": "Math-112",
                                    "score": 87.25,
                                    "credit_units": 3
                                }
                            ]
                        }
                    ]
                }
            ])
        );
    }

    #[tokio::test]
    async fn deleted_profiles_leave_the_export() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("database.sqlite3"))
            .await
            .unwrap();

        let kept = store.current_profile().await.unwrap();
        let dropped = NewProfile::named("Dropped", None).unwrap();
        store.create_profile(&dropped).await.unwrap();
        store.create_semester(Uuid::new_v4(), dropped.id).await.unwrap();

        store.delete_profile(dropped.id).await.unwrap();

        let document = build_export(&store).await.unwrap();
        assert_eq!(document.len(), 1);
        assert_eq!(document[0].profile_data.id, kept.id);
        assert!(document[0].semesters.is_empty());
    }

    #[tokio::test]
    async fn written_file_reads_back_as_the_built_document() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("database.sqlite3"))
            .await
            .unwrap();

        let first = store.current_profile().await.unwrap();
        let second = NewProfile::named("Masters", Some("#336699")).unwrap();
        store.create_profile(&second).await.unwrap();
        store
            .set_point_scale(second.id, PointScale::Four)
            .await
            .unwrap();

        for (profile_id, score) in [(first.id, 95.0), (second.id, 61.5)] {
            let semester_id = Uuid::new_v4();
            store.create_semester(semester_id, profile_id).await.unwrap();
            store.create_semester(Uuid::new_v4(), profile_id).await.unwrap();
            let course = CourseRecord {
                id: Uuid::new_v4(),
                name: "Math-111".to_string(),
                score: Score::new(score).unwrap(),
                credit_units: 2,
            };
            store.create_course(&course, semester_id).await.unwrap();
        }

        let path = dir.path().join("exported_data.json");
        export_to_file(&store, &path).await.unwrap();

        let read_back: Vec<ExportedProfile> =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(read_back, build_export(&store).await.unwrap());
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].profile_data.id, second.id);
        assert_eq!(read_back[0].profile_data.point_scale, PointScale::Four);
        assert_eq!(read_back[0].semesters.len(), 2);
        assert_eq!(read_back[0].semesters[0].courses[0].score.value(), 61.5);
        assert_eq!(read_back[1].semesters[0].courses[0].score.value(), 95.0);
        assert!(read_back[1].semesters[1].courses.is_empty());
    }

    #[test]
    fn exported_scale_rejects_other_values() {
        let raw = json!({"id": Uuid::nil(), "name": "x", "color": "#000000", "point_scale": 3});
        assert!(serde_json::from_value::<ExportedProfileData>(raw).is_err());
    }
}
