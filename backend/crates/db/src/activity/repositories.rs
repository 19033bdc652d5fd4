use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::activity::models::{SubmissionRecord, TaskRecord};
use pulse_common::error::PulseResult;

/// Read-only view of the classroom data the scoring engine consumes.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Every team id, in a stable order.
    async fn list_team_ids(&self) -> PulseResult<Vec<Uuid>>;

    async fn list_class_team_ids(&self, class_id: Uuid) -> PulseResult<Vec<Uuid>>;

    async fn list_tasks(&self, team_id: Uuid) -> PulseResult<Vec<TaskRecord>>;

    /// All submissions on the team's tasks, one entry per submission row.
    async fn list_submissions(&self, team_id: Uuid) -> PulseResult<Vec<SubmissionRecord>>;

    async fn list_member_ids(&self, team_id: Uuid) -> PulseResult<Vec<Uuid>>;

    /// Messages posted to the team chat within `[from, to]`.
    async fn count_messages(
        &self,
        team_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PulseResult<i64>;
}
