use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grading::PointScale;

pub const DEFAULT_PROFILE_NAME: &str = "default";
pub const DEFAULT_PROFILE_COLOR: &str = "#000000";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("unsupported point scale {0}; expected 4 or 5")]
    UnsupportedScale(i64),
    #[error("point scale must be 4 or 5, got {0:?}")]
    UnparsableScale(String),
    #[error("score {0} is outside the range 0 to 100")]
    ScoreOutOfRange(f64),
    #[error("previous CGPA {cgpa} is outside the range 0 to {max}")]
    BaselineOutOfRange { cgpa: f64, max: f64 },
    #[error("credit units {0} must be a non-negative integer")]
    CreditUnitsOutOfRange(i64),
    #[error("color {0:?} is not a #rrggbb hex value")]
    InvalidColor(String),
    #[error("unknown grade {0:?}")]
    UnknownGrade(String),
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(f64);

impl Score {
    pub const ZERO: Score = Score(0.0);

    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Score(value))
        } else {
            Err(ValidationError::ScoreOutOfRange(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Score {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.0
    }
}

pub fn credit_units_from_db(raw: i64) -> Result<u32, ValidationError> {
    u32::try_from(raw).map_err(|_| ValidationError::CreditUnitsOutOfRange(raw))
}

/// Prior academic history folded into the cumulative result.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Baseline {
    previous_cgpa: f64,
    previous_credit_units: u32,
}

impl Baseline {
    pub fn new(
        scale: PointScale,
        previous_cgpa: f64,
        previous_credit_units: u32,
    ) -> Result<Self, ValidationError> {
        if !previous_cgpa.is_finite() || previous_cgpa < 0.0 || previous_cgpa > scale.max() {
            return Err(ValidationError::BaselineOutOfRange {
                cgpa: previous_cgpa,
                max: scale.max(),
            });
        }

        Ok(Baseline {
            previous_cgpa,
            previous_credit_units,
        })
    }

    pub fn previous_cgpa(&self) -> f64 {
        self.previous_cgpa
    }

    pub fn previous_credit_units(&self) -> u32 {
        self.previous_credit_units
    }

    pub fn previous_points(&self) -> f64 {
        self.previous_cgpa * f64::from(self.previous_credit_units)
    }

    /// Keeps the baseline proportional when the profile moves to another point scale.
    pub fn rescaled(&self, from: PointScale, to: PointScale) -> Baseline {
        Baseline {
            previous_cgpa: (self.previous_cgpa * to.max() / from.max()).clamp(0.0, to.max()),
            previous_credit_units: self.previous_credit_units,
        }
    }
}

pub fn validate_color(raw: &str) -> Result<String, ValidationError> {
    let hex = raw.strip_prefix('#').unwrap_or_default();
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(raw.to_ascii_lowercase())
    } else {
        Err(ValidationError::InvalidColor(raw.to_string()))
    }
}

/// Derives a stable display color from the profile id.
pub fn color_for_id(id: Uuid) -> String {
    let bytes = id.as_bytes();
    format!("#{:02x}{:02x}{:02x}", bytes[0], bytes[1], bytes[2])
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub point_scale: PointScale,
    pub baseline: Baseline,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub point_scale: PointScale,
}

impl NewProfile {
    pub fn named(name: &str, color: Option<&str>) -> Result<Self, ValidationError> {
        let id = Uuid::new_v4();
        let color = match color {
            Some(raw) => validate_color(raw)?,
            None => color_for_id(id),
        };

        Ok(NewProfile {
            id,
            name: name.to_string(),
            color,
            point_scale: PointScale::Five,
        })
    }

    pub fn first_run() -> Self {
        NewProfile {
            id: Uuid::new_v4(),
            name: DEFAULT_PROFILE_NAME.to_string(),
            color: DEFAULT_PROFILE_COLOR.to_string(),
            point_scale: PointScale::Five,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseRecord {
    pub id: Uuid,
    pub name: String,
    pub score: Score,
    pub credit_units: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemesterRecord {
    pub id: Uuid,
    pub courses: Vec<CourseRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct CourseDraft {
    pub name: String,
    pub score: Option<Score>,
    pub credit_units: u32,
}

impl CourseDraft {
    pub fn into_record(self, id: Uuid) -> CourseRecord {
        CourseRecord {
            id,
            name: self.name,
            score: self.score.unwrap_or(Score::ZERO),
            credit_units: self.credit_units,
        }
    }
}
