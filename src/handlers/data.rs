use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::auth::session::Session;
use crate::dto::{DeleteResponse, ExportResponse};
use crate::error::AppResult;
use crate::AppState;

pub async fn export(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> AppResult<Json<ExportResponse>> {
    let days = state.journal.export(&session).await?;
    Ok(Json(ExportResponse {
        exported_at: Utc::now(),
        days,
    }))
}

pub async fn delete_all(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> AppResult<Json<DeleteResponse>> {
    let deleted = state.journal.delete_all(&session).await?;
    Ok(Json(DeleteResponse { deleted }))
}
