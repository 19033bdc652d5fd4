use pulse_db::progress::models::{TeamInsight, TeamMetrics};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub data: TeamMetrics,
}

#[derive(Debug, Serialize)]
pub struct MetricsHistoryResponse {
    pub data: Vec<TeamMetrics>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct InsightResponse {
    pub data: TeamInsight,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    pub data: Vec<TeamInsight>,
    pub count: usize,
}
