use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Values written for any field a reset-style save leaves out.
pub const DEFAULT_MOOD: i32 = 5;
pub const DEFAULT_BM_COUNT: i32 = 0;
pub const DEFAULT_BM_TYPE: i32 = 4;
pub const DEFAULT_WATER_INTAKE: i32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailyLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub log_date: NaiveDate,
    pub mood: i32,
    pub bm_count: i32,
    pub bm_type: i32,
    pub water_intake: i32,
    pub exercise: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How omitted fields of a save are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Every omitted field (and child list) is reset to its default.
    #[default]
    Replace,
    /// Omitted fields keep their stored values; omitted child lists are untouched.
    Merge,
}

/// Scalar fields of a daily log write. `None` means "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogFields {
    pub mood: Option<i32>,
    pub bm_count: Option<i32>,
    pub bm_type: Option<i32>,
    pub water_intake: Option<i32>,
    pub exercise: Option<String>,
    pub notes: Option<String>,
}

impl LogFields {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(mood) = self.mood {
            if !(1..=10).contains(&mood) {
                return Err(AppError::Validation("Mood must be between 1 and 10".into()));
            }
        }
        if let Some(bm_type) = self.bm_type {
            if BristolType::from_i32(bm_type).is_none() {
                return Err(AppError::Validation(
                    "Stool type must be between 1 and 7".into(),
                ));
            }
        }
        if matches!(self.bm_count, Some(n) if n < 0) {
            return Err(AppError::Validation(
                "Bowel movement count cannot be negative".into(),
            ));
        }
        if matches!(self.water_intake, Some(n) if n < 0) {
            return Err(AppError::Validation("Water intake cannot be negative".into()));
        }
        Ok(())
    }

    /// The overlay a store applies for `mode`.
    ///
    /// Stores treat `Some` as "overwrite" and `None` as "keep the stored value
    /// (or the default for a new row)". A `Replace` write therefore becomes a
    /// fully populated overlay so that omission resets the field on every call.
    pub fn overlay(&self, mode: WriteMode) -> LogFields {
        match mode {
            WriteMode::Merge => self.clone(),
            WriteMode::Replace => {
                let d = self.with_defaults();
                LogFields {
                    mood: Some(d.mood),
                    bm_count: Some(d.bm_count),
                    bm_type: Some(d.bm_type),
                    water_intake: Some(d.water_intake),
                    exercise: Some(d.exercise),
                    notes: Some(d.notes),
                }
            }
        }
    }

    /// Concrete values for a brand new row.
    pub fn with_defaults(&self) -> ResolvedFields {
        ResolvedFields {
            mood: self.mood.unwrap_or(DEFAULT_MOOD),
            bm_count: self.bm_count.unwrap_or(DEFAULT_BM_COUNT),
            bm_type: self.bm_type.unwrap_or(DEFAULT_BM_TYPE),
            water_intake: self.water_intake.unwrap_or(DEFAULT_WATER_INTAKE),
            exercise: self.exercise.clone().unwrap_or_default(),
            notes: self.notes.clone().unwrap_or_default(),
        }
    }

    /// Apply this overlay on top of a stored row.
    pub fn apply_to(&self, log: &mut DailyLog) {
        if let Some(mood) = self.mood {
            log.mood = mood;
        }
        if let Some(bm_count) = self.bm_count {
            log.bm_count = bm_count;
        }
        if let Some(bm_type) = self.bm_type {
            log.bm_type = bm_type;
        }
        if let Some(water_intake) = self.water_intake {
            log.water_intake = water_intake;
        }
        if let Some(exercise) = &self.exercise {
            log.exercise = exercise.clone();
        }
        if let Some(notes) = &self.notes {
            log.notes = notes.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields {
    pub mood: i32,
    pub bm_count: i32,
    pub bm_type: i32,
    pub water_intake: i32,
    pub exercise: String,
    pub notes: String,
}

/// Bristol stool scale classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BristolType {
    HardLumps = 1,
    LumpySausage = 2,
    CrackedSausage = 3,
    SmoothSausage = 4,
    SoftBlobs = 5,
    Mushy = 6,
    Liquid = 7,
}

impl BristolType {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::HardLumps),
            2 => Some(Self::LumpySausage),
            3 => Some(Self::CrackedSausage),
            4 => Some(Self::SmoothSausage),
            5 => Some(Self::SoftBlobs),
            6 => Some(Self::Mushy),
            7 => Some(Self::Liquid),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HardLumps => "Hard lumps",
            Self::LumpySausage => "Lumpy sausage",
            Self::CrackedSausage => "Cracked sausage",
            Self::SmoothSausage => "Smooth sausage",
            Self::SoftBlobs => "Soft blobs",
            Self::Mushy => "Mushy consistency",
            Self::Liquid => "Liquid consistency",
        }
    }
}

/// Coarse mood grouping used by the history view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodBand {
    Great,
    Good,
    Fair,
    Poor,
}

impl MoodBand {
    pub fn for_mood(mood: i32) -> Self {
        match mood {
            m if m >= 8 => Self::Great,
            m if m >= 6 => Self::Good,
            m if m >= 4 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_log() -> DailyLog {
        DailyLog {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            log_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            mood: 8,
            bm_count: 2,
            bm_type: 3,
            water_intake: 6,
            exercise: "Yoga".into(),
            notes: "Felt fine".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_replace_overlay_resets_omitted_fields() {
        let fields = LogFields {
            mood: Some(7),
            ..Default::default()
        };
        let mut log = stored_log();
        fields.overlay(WriteMode::Replace).apply_to(&mut log);

        assert_eq!(log.mood, 7);
        assert_eq!(log.bm_count, DEFAULT_BM_COUNT);
        assert_eq!(log.bm_type, DEFAULT_BM_TYPE);
        assert_eq!(log.water_intake, DEFAULT_WATER_INTAKE);
        assert_eq!(log.exercise, "");
        assert_eq!(log.notes, "");
    }

    #[test]
    fn test_merge_overlay_keeps_stored_fields() {
        let fields = LogFields {
            water_intake: Some(9),
            ..Default::default()
        };
        let mut log = stored_log();
        fields.overlay(WriteMode::Merge).apply_to(&mut log);

        assert_eq!(log.water_intake, 9);
        assert_eq!(log.mood, 8);
        assert_eq!(log.exercise, "Yoga");
        assert_eq!(log.notes, "Felt fine");
    }

    #[test]
    fn test_with_defaults_fills_every_field() {
        let resolved = LogFields::default().with_defaults();
        assert_eq!(resolved.mood, 5);
        assert_eq!(resolved.bm_count, 0);
        assert_eq!(resolved.bm_type, 4);
        assert_eq!(resolved.water_intake, 0);
        assert!(resolved.exercise.is_empty());
        assert!(resolved.notes.is_empty());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let bad = [
            LogFields { mood: Some(0), ..Default::default() },
            LogFields { mood: Some(11), ..Default::default() },
            LogFields { bm_type: Some(8), ..Default::default() },
            LogFields { bm_count: Some(-1), ..Default::default() },
            LogFields { water_intake: Some(-3), ..Default::default() },
        ];
        for fields in bad {
            assert!(
                matches!(fields.validate(), Err(AppError::Validation(_))),
                "{:?} should be rejected",
                fields
            );
        }
    }

    #[test]
    fn test_validate_accepts_boundaries() {
        let fields = LogFields {
            mood: Some(10),
            bm_count: Some(0),
            bm_type: Some(7),
            water_intake: Some(0),
            ..Default::default()
        };
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn test_bristol_labels() {
        assert_eq!(BristolType::from_i32(1).unwrap().label(), "Hard lumps");
        assert_eq!(BristolType::from_i32(4), Some(BristolType::SmoothSausage));
        assert_eq!(BristolType::from_i32(0), None);
    }

    #[test]
    fn test_mood_bands() {
        assert_eq!(MoodBand::for_mood(10), MoodBand::Great);
        assert_eq!(MoodBand::for_mood(8), MoodBand::Great);
        assert_eq!(MoodBand::for_mood(7), MoodBand::Good);
        assert_eq!(MoodBand::for_mood(4), MoodBand::Fair);
        assert_eq!(MoodBand::for_mood(3), MoodBand::Poor);
    }
}
