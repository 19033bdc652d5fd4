use axum::extract::{Path, Query, State};
use axum::Json;
use pulse_db::progress::models::MetricsFilter;
use pulse_progress::service::{BatchOutcome, TeamProgress};
use pulse_progress::summary::ClassProgress;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extractors::AdminKey;
use crate::progress::requests::HistoryQuery;
use crate::progress::responses::{
    InsightResponse, InsightsResponse, MetricsHistoryResponse, MetricsResponse,
};
use crate::AppState;

pub async fn get_team_progress(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<TeamProgress>, ApiError> {
    Ok(Json(state.progress.team_progress(team_id).await?))
}

pub async fn list_progress_history(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MetricsHistoryResponse>, ApiError> {
    query.validate()?;
    let data = state
        .progress
        .metrics_history(MetricsFilter {
            team_id: Some(team_id),
            since: query.since,
            limit: query.limit,
        })
        .await?;
    let count = data.len();
    Ok(Json(MetricsHistoryResponse { data, count }))
}

pub async fn calculate_team_progress(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let data = state.progress.recompute_team(team_id).await?;
    Ok(Json(MetricsResponse { data }))
}

pub async fn list_team_insights(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<InsightsResponse>, ApiError> {
    let data = state.progress.active_insights(team_id).await?;
    let count = data.len();
    Ok(Json(InsightsResponse { data, count }))
}

pub async fn get_class_progress(
    State(state): State<AppState>,
    Path(class_id): Path<Uuid>,
) -> Result<Json<ClassProgress>, ApiError> {
    Ok(Json(state.progress.class_progress(class_id).await?))
}

pub async fn resolve_insight(
    State(state): State<AppState>,
    Path(insight_id): Path<Uuid>,
) -> Result<Json<InsightResponse>, ApiError> {
    let data = state.progress.resolve_insight(insight_id).await?;
    Ok(Json(InsightResponse { data }))
}

pub async fn run_all_teams(
    State(state): State<AppState>,
    _admin: AdminKey,
) -> Result<Json<BatchOutcome>, ApiError> {
    tracing::info!("manual progress run requested");
    Ok(Json(state.progress.process_all_teams().await?))
}
