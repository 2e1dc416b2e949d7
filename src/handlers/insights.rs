use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;

use crate::auth::session::Session;
use crate::dto::InsightsQuery;
use crate::error::AppResult;
use crate::services::insights::InsightReport;
use crate::AppState;

pub async fn get_insights(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<InsightsQuery>,
) -> AppResult<Json<Option<InsightReport>>> {
    let today = Utc::now().date_naive();
    let report = state
        .journal
        .insights(&session, query.period, today, state.insight_options())
        .await?;
    Ok(Json(report))
}
