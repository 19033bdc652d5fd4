use chrono::{Duration, Utc, Weekday};
use serde::Serialize;
use uuid::Uuid;

use pulse_common::error::{PulseError, PulseResult};
use pulse_db::activity::repositories::ActivitySource;
use pulse_db::progress::models::{MetricsFilter, TeamInsight, TeamMetrics};
use pulse_db::progress::repositories::ProgressRepository;

use crate::calculators::ActivitySnapshot;
use crate::insights::build_insights;
use crate::scoring::score_team;
use crate::summary::{ClassProgress, TeamStanding};
use crate::week::WeekWindow;

/// Weeks of history returned alongside a team's current metrics.
pub const HISTORY_WEEKS: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamProgress {
    pub team_id: Uuid,
    pub current: Option<TeamMetrics>,
    pub history: Vec<TeamMetrics>,
    pub insights: Vec<TeamInsight>,
}

/// Runs the scoring pipeline (calculate → store → generate insights) against
/// injected data sources.
pub struct ProgressService<A: ActivitySource, R: ProgressRepository> {
    activity: A,
    repo: R,
    week_start: Weekday,
}

impl<A: ActivitySource, R: ProgressRepository> ProgressService<A, R> {
    pub fn new(activity: A, repo: R, week_start: Weekday) -> Self {
        Self {
            activity,
            repo,
            week_start,
        }
    }

    pub fn current_window(&self) -> WeekWindow {
        WeekWindow::containing(Utc::now(), self.week_start)
    }

    /// Compute (without storing) the metrics row for one team and week.
    pub async fn calculate_team_metrics(
        &self,
        team_id: Uuid,
        window: &WeekWindow,
    ) -> PulseResult<TeamMetrics> {
        let tasks = self.activity.list_tasks(team_id).await?;
        if tasks.is_empty() {
            return Ok(score_team(team_id, window, &ActivitySnapshot::default(), Utc::now()));
        }

        let snapshot = ActivitySnapshot {
            tasks,
            submissions: self.activity.list_submissions(team_id).await?,
            member_ids: self.activity.list_member_ids(team_id).await?,
            message_count: self
                .activity
                .count_messages(team_id, window.start, window.end)
                .await?,
        };

        Ok(score_team(team_id, window, &snapshot, Utc::now()))
    }

    pub async fn store_metrics(&self, metrics: TeamMetrics) -> PulseResult<TeamMetrics> {
        let team_id = metrics.team_id;
        let saved = self.repo.upsert_metrics(metrics).await?;
        tracing::debug!(%team_id, week_start = %saved.week_start, "metrics stored");
        Ok(saved)
    }

    /// Persist an insight for every high or medium reason on the stored row.
    pub async fn generate_insights(&self, metrics: &TeamMetrics) -> PulseResult<Vec<TeamInsight>> {
        let insights = build_insights(metrics.team_id, &metrics.risk_reasons, Utc::now());
        if insights.is_empty() {
            return Ok(insights);
        }

        tracing::info!(team_id = %metrics.team_id, count = insights.len(), "saving insights");
        self.repo.save_insights(insights).await
    }

    pub async fn process_team(&self, team_id: Uuid, window: &WeekWindow) -> PulseResult<TeamMetrics> {
        let metrics = self.calculate_team_metrics(team_id, window).await?;
        let saved = self.store_metrics(metrics).await?;
        self.generate_insights(&saved).await?;
        Ok(saved)
    }

    /// Recompute one team for the current week and return the fresh row.
    pub async fn recompute_team(&self, team_id: Uuid) -> PulseResult<TeamMetrics> {
        let window = self.current_window();
        self.process_team(team_id, &window).await
    }

    pub async fn process_all_teams(&self) -> PulseResult<BatchOutcome> {
        let window = self.current_window();
        self.process_all_teams_for(&window).await
    }

    /// Process every team sequentially. A failing team is logged and skipped;
    /// only a failure to enumerate teams aborts the batch.
    pub async fn process_all_teams_for(&self, window: &WeekWindow) -> PulseResult<BatchOutcome> {
        let team_ids = self.activity.list_team_ids().await?;
        tracing::info!(
            week_start = %window.start_date(),
            week_end = %window.end_date(),
            teams = team_ids.len(),
            "processing all teams"
        );

        let mut processed = 0;
        for team_id in &team_ids {
            match self.process_team(*team_id, window).await {
                Ok(_) => processed += 1,
                Err(e) => tracing::error!(%team_id, error = %e, "team processing failed"),
            }
        }

        let outcome = BatchOutcome {
            processed,
            total: team_ids.len(),
        };
        tracing::info!(
            processed = outcome.processed,
            total = outcome.total,
            "team processing finished"
        );
        Ok(outcome)
    }

    /// Delete insights resolved more than `retention_days` ago.
    pub async fn cleanup_resolved_insights(&self, retention_days: i64) -> PulseResult<u64> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let removed = self.repo.delete_resolved_before(cutoff).await?;
        tracing::info!(removed, %cutoff, "resolved insights cleaned up");
        Ok(removed)
    }

    pub async fn latest_metrics(&self, team_id: Uuid) -> PulseResult<Option<TeamMetrics>> {
        self.repo.get_latest(team_id).await
    }

    pub async fn metrics_history(&self, filter: MetricsFilter) -> PulseResult<Vec<TeamMetrics>> {
        self.repo.list_history(filter).await
    }

    pub async fn active_insights(&self, team_id: Uuid) -> PulseResult<Vec<TeamInsight>> {
        self.repo.list_active_insights(team_id).await
    }

    pub async fn team_progress(&self, team_id: Uuid) -> PulseResult<TeamProgress> {
        let since = self.current_window().start_date() - Duration::weeks(HISTORY_WEEKS);

        Ok(TeamProgress {
            team_id,
            current: self.repo.get_latest(team_id).await?,
            history: self
                .repo
                .list_history(MetricsFilter {
                    team_id: Some(team_id),
                    since: Some(since),
                    limit: Some(HISTORY_WEEKS + 1),
                })
                .await?,
            insights: self.repo.list_active_insights(team_id).await?,
        })
    }

    pub async fn class_progress(&self, class_id: Uuid) -> PulseResult<ClassProgress> {
        let team_ids = self.activity.list_class_team_ids(class_id).await?;
        let mut standings = Vec::with_capacity(team_ids.len());
        for team_id in team_ids {
            standings.push(TeamStanding {
                team_id,
                metrics: self.repo.get_latest(team_id).await?,
            });
        }
        Ok(ClassProgress::new(class_id, standings))
    }

    pub async fn resolve_insight(&self, insight_id: Uuid) -> PulseResult<TeamInsight> {
        self.repo
            .resolve_insight(insight_id, Utc::now())
            .await?
            .ok_or_else(|| PulseError::NotFound(format!("insight {insight_id}")))
    }
}
