//! In-memory doubles for the activity source and the progress store.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use pulse_common::error::{PulseError, PulseResult};
use pulse_db::activity::models::{SubmissionRecord, TaskRecord};
use pulse_db::activity::repositories::ActivitySource;
use pulse_db::progress::models::{MetricsFilter, TeamInsight, TeamMetrics};
use pulse_db::progress::repositories::ProgressRepository;

#[derive(Default)]
struct ActivityState {
    teams: Vec<(Uuid, Option<Uuid>)>,
    tasks: HashMap<Uuid, Vec<TaskRecord>>,
    submissions: HashMap<Uuid, Vec<SubmissionRecord>>,
    members: HashMap<Uuid, Vec<Uuid>>,
    messages: HashMap<Uuid, i64>,
    failing: HashSet<Uuid>,
    fail_listing: bool,
}

#[derive(Default)]
pub struct FakeActivity {
    state: Mutex<ActivityState>,
}

impl FakeActivity {
    pub fn add_team(&self, class_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().teams.push((id, class_id));
        id
    }

    pub fn push_task(&self, team_id: Uuid, task: TaskRecord) {
        let mut state = self.state.lock().unwrap();
        state.tasks.entry(team_id).or_default().push(task);
    }

    pub fn push_submission(&self, team_id: Uuid, submission: SubmissionRecord) {
        let mut state = self.state.lock().unwrap();
        state.submissions.entry(team_id).or_default().push(submission);
    }

    pub fn push_member(&self, team_id: Uuid, user_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        state.members.entry(team_id).or_default().push(user_id);
    }

    pub fn set_messages(&self, team_id: Uuid, count: i64) {
        self.state.lock().unwrap().messages.insert(team_id, count);
    }

    /// Every fetch for this team fails with a database error.
    pub fn fail_team(&self, team_id: Uuid) {
        self.state.lock().unwrap().failing.insert(team_id);
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    fn check(&self, team_id: Uuid) -> PulseResult<()> {
        if self.state.lock().unwrap().failing.contains(&team_id) {
            return Err(PulseError::Database(format!("team {team_id} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl ActivitySource for FakeActivity {
    async fn list_team_ids(&self) -> PulseResult<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(PulseError::Database("connection refused".into()));
        }
        Ok(state.teams.iter().map(|(id, _)| *id).collect())
    }

    async fn list_class_team_ids(&self, class_id: Uuid) -> PulseResult<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .teams
            .iter()
            .filter(|(_, class)| *class == Some(class_id))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn list_tasks(&self, team_id: Uuid) -> PulseResult<Vec<TaskRecord>> {
        self.check(team_id)?;
        let state = self.state.lock().unwrap();
        Ok(state.tasks.get(&team_id).cloned().unwrap_or_default())
    }

    async fn list_submissions(&self, team_id: Uuid) -> PulseResult<Vec<SubmissionRecord>> {
        self.check(team_id)?;
        let state = self.state.lock().unwrap();
        Ok(state.submissions.get(&team_id).cloned().unwrap_or_default())
    }

    async fn list_member_ids(&self, team_id: Uuid) -> PulseResult<Vec<Uuid>> {
        self.check(team_id)?;
        let state = self.state.lock().unwrap();
        Ok(state.members.get(&team_id).cloned().unwrap_or_default())
    }

    async fn count_messages(
        &self,
        team_id: Uuid,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> PulseResult<i64> {
        self.check(team_id)?;
        let state = self.state.lock().unwrap();
        Ok(state.messages.get(&team_id).copied().unwrap_or(0))
    }
}

#[derive(Default)]
pub struct MemoryProgressRepo {
    metrics: Mutex<Vec<TeamMetrics>>,
    insights: Mutex<Vec<TeamInsight>>,
}

impl MemoryProgressRepo {
    pub fn metrics_count(&self) -> usize {
        self.metrics.lock().unwrap().len()
    }

    pub fn insight_count(&self) -> usize {
        self.insights.lock().unwrap().len()
    }
}

#[async_trait]
impl ProgressRepository for MemoryProgressRepo {
    async fn upsert_metrics(&self, metrics: TeamMetrics) -> PulseResult<TeamMetrics> {
        let mut rows = self.metrics.lock().unwrap();
        let existing = rows
            .iter_mut()
            .find(|m| m.team_id == metrics.team_id && m.week_start == metrics.week_start);
        match existing {
            Some(row) => {
                let (id, created_at) = (row.id, row.created_at);
                *row = TeamMetrics {
                    id,
                    created_at,
                    updated_at: Utc::now(),
                    ..metrics
                };
                Ok(row.clone())
            }
            None => {
                rows.push(metrics.clone());
                Ok(metrics)
            }
        }
    }

    async fn get_latest(&self, team_id: Uuid) -> PulseResult<Option<TeamMetrics>> {
        let rows = self.metrics.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| m.team_id == team_id)
            .max_by_key(|m| m.week_start)
            .cloned())
    }

    async fn list_history(&self, filter: MetricsFilter) -> PulseResult<Vec<TeamMetrics>> {
        let rows = self.metrics.lock().unwrap();
        let mut matched: Vec<TeamMetrics> = rows
            .iter()
            .filter(|m| filter.team_id.map_or(true, |id| m.team_id == id))
            .filter(|m| filter.since.map_or(true, |since| m.week_start >= since))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.week_start.cmp(&a.week_start));
        matched.truncate(filter.limit.unwrap_or(50).max(0) as usize);
        Ok(matched)
    }

    async fn save_insights(&self, insights: Vec<TeamInsight>) -> PulseResult<Vec<TeamInsight>> {
        self.insights.lock().unwrap().extend(insights.iter().cloned());
        Ok(insights)
    }

    async fn list_active_insights(&self, team_id: Uuid) -> PulseResult<Vec<TeamInsight>> {
        let rows = self.insights.lock().unwrap();
        let mut active: Vec<TeamInsight> = rows
            .iter()
            .filter(|i| i.team_id == team_id && i.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(active)
    }

    async fn resolve_insight(
        &self,
        insight_id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> PulseResult<Option<TeamInsight>> {
        let mut rows = self.insights.lock().unwrap();
        Ok(rows.iter_mut().find(|i| i.id == insight_id).map(|i| {
            i.is_active = false;
            i.resolved_at.get_or_insert(resolved_at);
            i.clone()
        }))
    }

    async fn delete_resolved_before(&self, cutoff: DateTime<Utc>) -> PulseResult<u64> {
        let mut rows = self.insights.lock().unwrap();
        let before = rows.len();
        rows.retain(|i| i.resolved_at.map_or(true, |at| at >= cutoff));
        Ok((before - rows.len()) as u64)
    }
}
