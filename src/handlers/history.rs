use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::auth::session::Session;
use crate::dto::HistoryResponse;
use crate::error::AppResult;
use crate::AppState;

/// Logs of one calendar month, newest first, with the month's averages.
pub async fn get_month(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((year, month)): Path<(i32, u32)>,
) -> AppResult<Json<HistoryResponse>> {
    let history = state.journal.month(&session, year, month).await?;
    Ok(Json(history.into()))
}
