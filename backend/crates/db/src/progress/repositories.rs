use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::progress::models::{MetricsFilter, TeamInsight, TeamMetrics};
use pulse_common::error::PulseResult;

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert or overwrite the row keyed by (team_id, week_start).
    async fn upsert_metrics(&self, metrics: TeamMetrics) -> PulseResult<TeamMetrics>;
    async fn get_latest(&self, team_id: Uuid) -> PulseResult<Option<TeamMetrics>>;
    async fn list_history(&self, filter: MetricsFilter) -> PulseResult<Vec<TeamMetrics>>;
    async fn save_insights(&self, insights: Vec<TeamInsight>) -> PulseResult<Vec<TeamInsight>>;
    async fn list_active_insights(&self, team_id: Uuid) -> PulseResult<Vec<TeamInsight>>;
    /// Returns `None` when no insight has this id.
    async fn resolve_insight(
        &self,
        insight_id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> PulseResult<Option<TeamInsight>>;
    /// Delete insights resolved before `cutoff`; returns the number removed.
    async fn delete_resolved_before(&self, cutoff: DateTime<Utc>) -> PulseResult<u64>;
}
