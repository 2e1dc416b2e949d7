//! # Request/Response DTOs
//!
//! Conventions:
//! - `*Request`  → deserialized from client JSON body or query params
//! - `*Response` → serialized to client JSON
//! - Size limits are expressed via `validator` derive macros; value ranges
//!   are checked by the journal so every caller gets them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::collection::{ChildUpdate, HydratedLog};
use crate::models::daily_log::{BristolType, LogFields, MoodBand, WriteMode};
use crate::services::insights::MonthSummary;
use crate::services::journal::{DaySave, MonthHistory};
use crate::services::window::{DateWindow, InsightPeriod};

// ============================================================================
// Daily logs
// ============================================================================

/// PUT/PATCH /api/daily-logs/:date and POST /api/daily-logs
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SaveDailyLogRequest {
    /// Only read by POST; defaults to today.
    pub log_date: Option<NaiveDate>,
    pub mood: Option<i32>,
    pub bm_count: Option<i32>,
    pub bm_type: Option<i32>,
    pub water_intake: Option<i32>,

    #[validate(length(max = 500, message = "Exercise must be at most 500 characters"))]
    pub exercise: Option<String>,

    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,

    #[validate(length(max = 50, message = "At most 50 symptoms per day"))]
    pub symptoms: Option<Vec<String>>,

    #[validate(length(max = 50, message = "At most 50 supplements per day"))]
    pub supplements: Option<Vec<String>>,

    #[validate(length(max = 100, message = "At most 100 foods per day"))]
    pub foods: Option<Vec<String>>,
}

impl SaveDailyLogRequest {
    pub fn into_save(self, mode: WriteMode) -> DaySave {
        DaySave {
            mode,
            fields: LogFields {
                mood: self.mood,
                bm_count: self.bm_count,
                bm_type: self.bm_type,
                water_intake: self.water_intake,
                exercise: self.exercise,
                notes: self.notes,
            },
            lists: ChildUpdate {
                symptoms: self.symptoms,
                supplements: self.supplements,
                foods: self.foods,
            },
        }
    }
}

/// PUT /api/daily-logs/:date/:collection
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceCollectionRequest {
    #[validate(length(max = 100, message = "At most 100 entries per list"))]
    pub names: Vec<String>,
}

/// GET /api/daily-logs
#[derive(Debug, Deserialize)]
pub struct DailyLogRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

// ============================================================================
// History
// ============================================================================

/// One day in the history view.
#[derive(Debug, Serialize)]
pub struct HistoryDay {
    #[serde(flatten)]
    pub day: HydratedLog,
    pub mood_band: MoodBand,
    pub bm_type_label: Option<&'static str>,
    pub exercised: bool,
}

impl From<HydratedLog> for HistoryDay {
    fn from(day: HydratedLog) -> Self {
        Self {
            mood_band: MoodBand::for_mood(day.log.mood),
            bm_type_label: BristolType::from_i32(day.log.bm_type).map(BristolType::label),
            exercised: !day.log.exercise.trim().is_empty(),
            day,
        }
    }
}

/// GET /api/history/:year/:month
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub window: DateWindow,
    pub summary: MonthSummary,
    pub days: Vec<HistoryDay>,
}

impl From<MonthHistory> for HistoryResponse {
    fn from(history: MonthHistory) -> Self {
        Self {
            window: history.window,
            summary: history.summary,
            days: history.logs.into_iter().map(HistoryDay::from).collect(),
        }
    }
}

// ============================================================================
// Insights
// ============================================================================

/// GET /api/insights
#[derive(Debug, Deserialize)]
pub struct InsightsQuery {
    #[serde(default)]
    pub period: InsightPeriod,
}

// ============================================================================
// Data management
// ============================================================================

/// GET /api/export
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub exported_at: DateTime<Utc>,
    pub days: Vec<HydratedLog>,
}

/// DELETE /api/daily-logs/:date and DELETE /api/data
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}
