use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use validator::Validate;

use crate::auth::session::Session;
use crate::dto::{DailyLogRangeQuery, DeleteResponse, ReplaceCollectionRequest, SaveDailyLogRequest};
use crate::error::AppResult;
use crate::models::collection::{Collection, HydratedLog};
use crate::models::daily_log::WriteMode;
use crate::services::window::DateWindow;
use crate::AppState;

/// Default look-back for range queries without a `start_date`.
const DEFAULT_RANGE_DAYS: u32 = 30;

pub async fn get_today(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> AppResult<Json<Option<HydratedLog>>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.journal.fetch(&session, today).await?))
}

pub async fn get_daily_log(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<Option<HydratedLog>>> {
    Ok(Json(state.journal.fetch(&session, date).await?))
}

/// Full save: omitted fields fall back to defaults, omitted lists are cleared.
pub async fn put_daily_log(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(date): Path<NaiveDate>,
    Json(body): Json<SaveDailyLogRequest>,
) -> AppResult<Json<Option<HydratedLog>>> {
    body.validate()?;
    let save = body.into_save(WriteMode::Replace);
    Ok(Json(state.journal.save(&session, date, &save).await?))
}

/// Partial save: omitted fields and lists keep their stored values.
pub async fn patch_daily_log(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(date): Path<NaiveDate>,
    Json(body): Json<SaveDailyLogRequest>,
) -> AppResult<Json<Option<HydratedLog>>> {
    body.validate()?;
    let save = body.into_save(WriteMode::Merge);

    if save.lists.is_empty() {
        // Scalar-only patch; the child lists are untouched.
        if state
            .journal
            .upsert(&session, date, &save.fields, WriteMode::Merge)
            .await?
            .is_none()
        {
            return Ok(Json(None));
        }
        return Ok(Json(state.journal.fetch(&session, date).await?));
    }

    Ok(Json(state.journal.save(&session, date, &save).await?))
}

/// Save the day named by `log_date`, or today.
pub async fn create_daily_log(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<SaveDailyLogRequest>,
) -> AppResult<Json<Option<HydratedLog>>> {
    body.validate()?;
    let date = body.log_date.unwrap_or_else(|| Utc::now().date_naive());
    let save = body.into_save(WriteMode::Replace);
    Ok(Json(state.journal.save(&session, date, &save).await?))
}

pub async fn delete_daily_log(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<DeleteResponse>> {
    let deleted = state.journal.delete_day(&session, date).await?;
    Ok(Json(DeleteResponse {
        deleted: u64::from(deleted),
    }))
}

pub async fn list_daily_logs(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<DailyLogRangeQuery>,
) -> AppResult<Json<Vec<HydratedLog>>> {
    let today = Utc::now().date_naive();
    let end = query.end_date.unwrap_or(today);
    let start = query
        .start_date
        .unwrap_or_else(|| DateWindow::trailing(end, DEFAULT_RANGE_DAYS).start);

    Ok(Json(state.journal.fetch_range(&session, start, end).await?))
}

/// Replace a single child list of an existing day.
pub async fn replace_collection(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((date, collection)): Path<(NaiveDate, Collection)>,
    Json(body): Json<ReplaceCollectionRequest>,
) -> AppResult<Json<Option<HydratedLog>>> {
    body.validate()?;
    Ok(Json(
        state
            .journal
            .replace(&session, date, collection, &body.names)
            .await?,
    ))
}
