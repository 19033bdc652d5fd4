pub mod handlers;
pub mod requests;
pub mod responses;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/teams/{team_id}/progress", get(handlers::get_team_progress))
        .route(
            "/teams/{team_id}/progress/history",
            get(handlers::list_progress_history),
        )
        .route(
            "/teams/{team_id}/progress/calculate",
            post(handlers::calculate_team_progress),
        )
        .route("/teams/{team_id}/insights", get(handlers::list_team_insights))
        .route("/classes/{class_id}/progress", get(handlers::get_class_progress))
        .route("/insights/{insight_id}/resolve", post(handlers::resolve_insight))
        .route("/admin/progress/run", post(handlers::run_all_teams))
}
