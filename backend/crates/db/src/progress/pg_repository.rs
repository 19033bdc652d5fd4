use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::progress::models::{
    decode_list, encode_list, InsightSeverity, InsightType, MetricsFilter, RiskBand,
    TeamInsight, TeamMetrics,
};
use crate::progress::repositories::ProgressRepository;
use pulse_common::error::{PulseError, PulseResult};

const METRICS_COLUMNS: &str = "id, team_id, week_start, week_end, timeliness, velocity, \
     engagement, work_balance, rework, scope_remaining, progress_score, risk_score, \
     risk_band, risk_reasons, total_tasks, completed_tasks, overdue_tasks, active_members, \
     created_at, updated_at";

const INSIGHT_COLUMNS: &str = "id, team_id, insight_type, severity, title, description, \
     recommendations, is_active, created_at, resolved_at";

#[derive(Clone)]
pub struct PgProgressRepository {
    pool: PgPool,
}

impl PgProgressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressRepository for PgProgressRepository {
    async fn upsert_metrics(&self, metrics: TeamMetrics) -> PulseResult<TeamMetrics> {
        let sql = format!(
            "insert into team_metrics
             (id, team_id, week_start, week_end, timeliness, velocity, engagement,
              work_balance, rework, scope_remaining, progress_score, risk_score,
              risk_band, risk_reasons, total_tasks, completed_tasks, overdue_tasks,
              active_members, created_at, updated_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
             on conflict (team_id, week_start)
             do update set
               week_end = excluded.week_end,
               timeliness = excluded.timeliness,
               velocity = excluded.velocity,
               engagement = excluded.engagement,
               work_balance = excluded.work_balance,
               rework = excluded.rework,
               scope_remaining = excluded.scope_remaining,
               progress_score = excluded.progress_score,
               risk_score = excluded.risk_score,
               risk_band = excluded.risk_band,
               risk_reasons = excluded.risk_reasons,
               total_tasks = excluded.total_tasks,
               completed_tasks = excluded.completed_tasks,
               overdue_tasks = excluded.overdue_tasks,
               active_members = excluded.active_members,
               updated_at = excluded.updated_at
             returning {METRICS_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(metrics.id)
            .bind(metrics.team_id)
            .bind(metrics.week_start)
            .bind(metrics.week_end)
            .bind(metrics.timeliness)
            .bind(metrics.velocity)
            .bind(metrics.engagement)
            .bind(metrics.work_balance)
            .bind(metrics.rework)
            .bind(metrics.scope_remaining)
            .bind(metrics.progress_score)
            .bind(metrics.risk_score)
            .bind(metrics.risk_band.as_str())
            .bind(encode_list(&metrics.risk_reasons))
            .bind(metrics.total_tasks)
            .bind(metrics.completed_tasks)
            .bind(metrics.overdue_tasks)
            .bind(metrics.active_members)
            .bind(metrics.created_at)
            .bind(metrics.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PulseError::Database(e.to_string()))?;

        Ok(map_metrics_row(&row))
    }

    async fn get_latest(&self, team_id: Uuid) -> PulseResult<Option<TeamMetrics>> {
        let sql = format!(
            "select {METRICS_COLUMNS} from team_metrics
             where team_id = $1
             order by week_start desc
             limit 1"
        );
        let row = sqlx::query(&sql)
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PulseError::Database(e.to_string()))?;

        Ok(row.map(|r| map_metrics_row(&r)))
    }

    async fn list_history(&self, filter: MetricsFilter) -> PulseResult<Vec<TeamMetrics>> {
        let mut qb = QueryBuilder::new(format!(
            "select {METRICS_COLUMNS} from team_metrics where 1=1"
        ));

        if let Some(team_id) = filter.team_id {
            qb.push(" and team_id = ").push_bind(team_id);
        }
        if let Some(since) = filter.since {
            qb.push(" and week_start >= ").push_bind(since);
        }

        qb.push(" order by week_start desc");
        qb.push(" limit ").push_bind(filter.limit.unwrap_or(50));

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PulseError::Database(e.to_string()))?;

        Ok(rows.iter().map(map_metrics_row).collect())
    }

    async fn save_insights(&self, insights: Vec<TeamInsight>) -> PulseResult<Vec<TeamInsight>> {
        let sql = format!(
            "insert into team_insights
             (id, team_id, insight_type, severity, title, description, recommendations,
              is_active, created_at, resolved_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             returning {INSIGHT_COLUMNS}"
        );
        let mut saved = Vec::with_capacity(insights.len());

        for insight in insights {
            let row = sqlx::query(&sql)
                .bind(insight.id)
                .bind(insight.team_id)
                .bind(insight.insight_type.as_str())
                .bind(insight.severity.as_str())
                .bind(&insight.title)
                .bind(&insight.description)
                .bind(encode_list(&insight.recommendations))
                .bind(insight.is_active)
                .bind(insight.created_at)
                .bind(insight.resolved_at)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PulseError::Database(e.to_string()))?;

            saved.push(map_insight_row(&row)?);
        }

        Ok(saved)
    }

    async fn list_active_insights(&self, team_id: Uuid) -> PulseResult<Vec<TeamInsight>> {
        let sql = format!(
            "select {INSIGHT_COLUMNS} from team_insights
             where team_id = $1 and is_active
             order by (severity = 'critical') desc, created_at desc"
        );
        let rows = sqlx::query(&sql)
            .bind(team_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PulseError::Database(e.to_string()))?;

        rows.iter().map(map_insight_row).collect()
    }

    async fn resolve_insight(
        &self,
        insight_id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> PulseResult<Option<TeamInsight>> {
        let sql = format!(
            "update team_insights
             set is_active = false, resolved_at = coalesce(resolved_at, $2)
             where id = $1
             returning {INSIGHT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(insight_id)
            .bind(resolved_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PulseError::Database(e.to_string()))?;

        row.as_ref().map(map_insight_row).transpose()
    }

    async fn delete_resolved_before(&self, cutoff: DateTime<Utc>) -> PulseResult<u64> {
        let result = sqlx::query(
            "delete from team_insights
             where resolved_at is not null and resolved_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| PulseError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

fn map_metrics_row(row: &sqlx::postgres::PgRow) -> TeamMetrics {
    let risk_score: i32 = row.get("risk_score");
    let raw_band: String = row.get("risk_band");
    let raw_reasons: Option<String> = row.get("risk_reasons");

    TeamMetrics {
        id: row.get("id"),
        team_id: row.get("team_id"),
        week_start: row.get("week_start"),
        week_end: row.get("week_end"),
        timeliness: row.get("timeliness"),
        velocity: row.get("velocity"),
        engagement: row.get("engagement"),
        work_balance: row.get("work_balance"),
        rework: row.get("rework"),
        scope_remaining: row.get("scope_remaining"),
        progress_score: row.get("progress_score"),
        risk_score,
        risk_band: RiskBand::parse(&raw_band).unwrap_or_else(|| RiskBand::from_score(risk_score)),
        risk_reasons: decode_list(raw_reasons.as_deref(), "risk_reasons"),
        total_tasks: row.get("total_tasks"),
        completed_tasks: row.get("completed_tasks"),
        overdue_tasks: row.get("overdue_tasks"),
        active_members: row.get("active_members"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn map_insight_row(row: &sqlx::postgres::PgRow) -> PulseResult<TeamInsight> {
    let raw_type: String = row.get("insight_type");
    let raw_severity: String = row.get("severity");
    let raw_recommendations: Option<String> = row.get("recommendations");

    Ok(TeamInsight {
        id: row.get("id"),
        team_id: row.get("team_id"),
        insight_type: InsightType::parse(&raw_type).unwrap_or(InsightType::AtRisk),
        severity: InsightSeverity::parse(&raw_severity).ok_or_else(|| {
            PulseError::Database(format!("unknown insight severity: {raw_severity}"))
        })?,
        title: row.get("title"),
        description: row.get("description"),
        recommendations: decode_list(raw_recommendations.as_deref(), "recommendations"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        resolved_at: row.get("resolved_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::models::{ReasonSeverity, ReasonType, RiskReason};
    use crate::{create_pool, run_migrations};
    use chrono::{Duration, NaiveDate};

    async fn test_repo() -> Option<(PgProgressRepository, PgPool)> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.expect("db should connect");
        run_migrations(&pool).await.expect("migrations should apply");
        Some((PgProgressRepository::new(pool.clone()), pool))
    }

    async fn insert_team(pool: &PgPool) -> Uuid {
        let class_id = Uuid::new_v4();
        sqlx::query("insert into classes (id, name, teacher_id) values ($1, 'Biology', $2)")
            .bind(class_id)
            .bind(Uuid::new_v4())
            .execute(pool)
            .await
            .expect("insert class");
        let team_id = Uuid::new_v4();
        sqlx::query("insert into teams (id, class_id, name) values ($1, $2, 'Team B')")
            .bind(team_id)
            .bind(class_id)
            .execute(pool)
            .await
            .expect("insert team");
        team_id
    }

    fn make_metrics(team_id: Uuid, week_start: NaiveDate) -> TeamMetrics {
        let now = Utc::now();
        TeamMetrics {
            id: Uuid::new_v4(),
            team_id,
            week_start,
            week_end: week_start + Duration::days(6),
            timeliness: 80,
            velocity: 3,
            engagement: 65,
            work_balance: 12,
            rework: 10,
            scope_remaining: 40,
            progress_score: 66,
            risk_score: 27,
            risk_band: RiskBand::Green,
            risk_reasons: vec![RiskReason {
                reason_type: ReasonType::OnTrack,
                severity: ReasonSeverity::None,
                message: "Team is performing well".to_string(),
                recommendation: "Continue monitoring progress".to_string(),
            }],
            total_tasks: 10,
            completed_tasks: 6,
            overdue_tasks: 1,
            active_members: 4,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_insight(team_id: Uuid, severity: InsightSeverity) -> TeamInsight {
        TeamInsight {
            id: Uuid::new_v4(),
            team_id,
            insight_type: InsightType::FallingBehind,
            severity,
            title: "Only 40% of tasks completed on time".to_string(),
            description: "Review task assignments and provide deadline reminders".to_string(),
            recommendations: vec![
                "Review task assignments and provide deadline reminders".to_string(),
            ],
            is_active: true,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    fn week(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    #[tokio::test]
    async fn upsert_overwrites_same_team_week() {
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let team_id = insert_team(&pool).await;

        let first = repo
            .upsert_metrics(make_metrics(team_id, week(1)))
            .await
            .expect("first upsert");

        let mut second = make_metrics(team_id, week(1));
        second.risk_score = 75;
        second.risk_band = RiskBand::Red;
        let second = repo.upsert_metrics(second).await.expect("second upsert");

        assert_eq!(second.id, first.id);
        assert_eq!(second.risk_score, 75);
        assert_eq!(second.risk_band, RiskBand::Red);

        let count: i64 = sqlx::query_scalar(
            "select count(*) from team_metrics where team_id = $1 and week_start = $2",
        )
        .bind(team_id)
        .bind(week(1))
        .fetch_one(&pool)
        .await
        .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn reasons_survive_storage() {
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let team_id = insert_team(&pool).await;
        repo.upsert_metrics(make_metrics(team_id, week(8)))
            .await
            .expect("upsert");

        let latest = repo.get_latest(team_id).await.expect("latest").unwrap();
        assert_eq!(latest.risk_reasons.len(), 1);
        assert_eq!(latest.risk_reasons[0].reason_type, ReasonType::OnTrack);
    }

    #[tokio::test]
    async fn malformed_reasons_read_as_empty() {
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let team_id = insert_team(&pool).await;
        repo.upsert_metrics(make_metrics(team_id, week(15)))
            .await
            .expect("upsert");
        sqlx::query("update team_metrics set risk_reasons = '{broken' where team_id = $1")
            .bind(team_id)
            .execute(&pool)
            .await
            .expect("corrupt reasons");

        let latest = repo.get_latest(team_id).await.expect("latest").unwrap();
        assert!(latest.risk_reasons.is_empty());
        assert_eq!(latest.total_tasks, 10);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_filtered() {
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let team_id = insert_team(&pool).await;
        for day in [1, 8, 15] {
            repo.upsert_metrics(make_metrics(team_id, week(day)))
                .await
                .expect("upsert");
        }

        let history = repo
            .list_history(MetricsFilter {
                team_id: Some(team_id),
                since: Some(week(8)),
                limit: None,
            })
            .await
            .expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].week_start, week(15));
        assert_eq!(history[1].week_start, week(8));
    }

    #[tokio::test]
    async fn resolve_then_cleanup_removes_old_insights() {
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let team_id = insert_team(&pool).await;
        let saved = repo
            .save_insights(vec![
                make_insight(team_id, InsightSeverity::Warning),
                make_insight(team_id, InsightSeverity::Critical),
            ])
            .await
            .expect("save");
        assert_eq!(saved.len(), 2);

        let active = repo.list_active_insights(team_id).await.expect("active");
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].severity, InsightSeverity::Critical);

        let long_ago = Utc::now() - Duration::days(45);
        let resolved = repo
            .resolve_insight(saved[0].id, long_ago)
            .await
            .expect("resolve")
            .expect("insight exists");
        assert!(!resolved.is_active);

        let removed = repo
            .delete_resolved_before(Utc::now() - Duration::days(30))
            .await
            .expect("cleanup");
        assert!(removed >= 1);

        let active = repo.list_active_insights(team_id).await.expect("active");
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn resolve_unknown_insight_returns_none() {
        let (repo, _pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let result = repo
            .resolve_insight(Uuid::new_v4(), Utc::now())
            .await
            .expect("resolve");
        assert!(result.is_none());
    }
}
