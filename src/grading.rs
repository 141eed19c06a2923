use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Score, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PointScale {
    Four,
    Five,
}

impl PointScale {
    pub fn max(self) -> f64 {
        match self {
            PointScale::Four => 4.0,
            PointScale::Five => 5.0,
        }
    }
}

impl TryFrom<i64> for PointScale {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(PointScale::Four),
            5 => Ok(PointScale::Five),
            other => Err(ValidationError::UnsupportedScale(other)),
        }
    }
}

impl From<PointScale> for i64 {
    fn from(scale: PointScale) -> Self {
        match scale {
            PointScale::Four => 4,
            PointScale::Five => 5,
        }
    }
}

impl std::str::FromStr for PointScale {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value: i64 = raw
            .trim()
            .parse()
            .map_err(|_| ValidationError::UnparsableScale(raw.to_string()))?;
        PointScale::try_from(value)
    }
}

impl fmt::Display for PointScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.max())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grade {
    Undefined,
    APlus,
    A,
    BPlus,
    B,
    CPlus,
    C,
    DPlus,
    D,
    F,
}

impl Grade {
    pub const ALL: [Grade; 10] = [
        Grade::Undefined,
        Grade::APlus,
        Grade::A,
        Grade::BPlus,
        Grade::B,
        Grade::CPlus,
        Grade::C,
        Grade::DPlus,
        Grade::D,
        Grade::F,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Grade::Undefined => "Undefined",
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Grade {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        Grade::ALL
            .into_iter()
            .find(|grade| grade.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownGrade(raw.to_string()))
    }
}

/// Score tiers as (inclusive lower bound, grade, 5-scale point, 4-scale point).
const SCORE_TIERS: [(f64, Grade, f64, f64); 8] = [
    (95.0, Grade::APlus, 5.0, 4.0),
    (90.0, Grade::A, 4.75, 3.75),
    (85.0, Grade::BPlus, 4.5, 3.5),
    (80.0, Grade::B, 4.0, 3.0),
    (75.0, Grade::CPlus, 3.5, 2.5),
    (70.0, Grade::C, 3.0, 2.0),
    (65.0, Grade::DPlus, 2.5, 1.5),
    (60.0, Grade::D, 2.0, 1.0),
];

const FAILING_FIVE: f64 = 1.0;
const FAILING_FOUR: f64 = 0.0;

const GPA_BOUNDS_FIVE: [f64; 8] = [4.75, 4.5, 4.0, 3.5, 3.0, 2.5, 2.0, 1.0];
const GPA_BOUNDS_FOUR: [f64; 8] = [4.0, 3.75, 3.5, 3.0, 2.5, 2.0, 1.5, 1.0];

pub fn grade_for_score(score: Score) -> Grade {
    SCORE_TIERS
        .iter()
        .find(|(bound, ..)| score.value() >= *bound)
        .map(|(_, grade, ..)| *grade)
        .unwrap_or(Grade::F)
}

pub fn grade_point_for_score(scale: PointScale, score: Score) -> f64 {
    let tier = SCORE_TIERS
        .iter()
        .find(|(bound, ..)| score.value() >= *bound);

    match (scale, tier) {
        (PointScale::Five, Some((_, _, five, _))) => *five,
        (PointScale::Four, Some((_, _, _, four))) => *four,
        (PointScale::Five, None) => FAILING_FIVE,
        (PointScale::Four, None) => FAILING_FOUR,
    }
}

pub fn reference_score_for_grade(grade: Grade) -> f64 {
    SCORE_TIERS
        .iter()
        .find(|(_, tier_grade, ..)| *tier_grade == grade)
        .map(|(bound, ..)| *bound)
        .unwrap_or(0.0)
}

pub fn grade_for_gpa(scale: PointScale, gpa: f64) -> Grade {
    let bounds = match scale {
        PointScale::Five => &GPA_BOUNDS_FIVE,
        PointScale::Four => &GPA_BOUNDS_FOUR,
    };

    bounds
        .iter()
        .zip(SCORE_TIERS.iter())
        .find(|(bound, _)| gpa >= **bound)
        .map(|(_, (_, grade, ..))| *grade)
        .unwrap_or(Grade::F)
}
