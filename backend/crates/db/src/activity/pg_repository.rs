use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::activity::models::{SubmissionRecord, TaskRecord, TaskStatus};
use crate::activity::repositories::ActivitySource;
use pulse_common::error::{PulseError, PulseResult};

#[derive(Clone)]
pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivitySource for PgActivityRepository {
    async fn list_team_ids(&self) -> PulseResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("select id from teams order by created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PulseError::Database(e.to_string()))
    }

    async fn list_class_team_ids(&self, class_id: Uuid) -> PulseResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "select id from teams where class_id = $1 order by name, id",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PulseError::Database(e.to_string()))
    }

    async fn list_tasks(&self, team_id: Uuid) -> PulseResult<Vec<TaskRecord>> {
        let rows = sqlx::query(
            "select t.id, t.team_id, t.status, t.due_date, t.assigned_to, t.created_by,
                    t.updated_at,
                    ls.submitted_at as latest_submission_at,
                    ls.submission_text as latest_submission_text
             from tasks t
             left join lateral (
               select s.submitted_at, s.submission_text from task_submissions s
               where s.task_id = t.id
               order by s.submitted_at desc, s.id desc
               limit 1
             ) ls on true
             where t.team_id = $1
             order by t.created_at, t.id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PulseError::Database(e.to_string()))?;

        rows.iter().map(map_task_row).collect()
    }

    async fn list_submissions(&self, team_id: Uuid) -> PulseResult<Vec<SubmissionRecord>> {
        let rows = sqlx::query(
            "select s.id, s.task_id, s.submitted_by, s.submitted_at, s.submission_text
             from task_submissions s
             join tasks t on t.id = s.task_id
             where t.team_id = $1
             order by s.submitted_at, s.id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PulseError::Database(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| SubmissionRecord {
                id: r.get("id"),
                task_id: r.get("task_id"),
                submitted_by: r.get("submitted_by"),
                submitted_at: r.get("submitted_at"),
                submission_text: r.get("submission_text"),
            })
            .collect())
    }

    async fn list_member_ids(&self, team_id: Uuid) -> PulseResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "select user_id from team_members where team_id = $1 order by joined_at, user_id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PulseError::Database(e.to_string()))
    }

    async fn count_messages(
        &self,
        team_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PulseResult<i64> {
        let row = sqlx::query(
            "select count(*) as cnt from messages
             where team_id = $1 and created_at between $2 and $3",
        )
        .bind(team_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PulseError::Database(e.to_string()))?;
        Ok(row.get::<i64, _>("cnt"))
    }
}

fn map_task_row(row: &sqlx::postgres::PgRow) -> PulseResult<TaskRecord> {
    let raw_status: String = row.get("status");
    let status = TaskStatus::parse(&raw_status)
        .ok_or_else(|| PulseError::Database(format!("unknown task status: {raw_status}")))?;

    Ok(TaskRecord {
        id: row.get("id"),
        team_id: row.get("team_id"),
        status,
        due_date: row.get("due_date"),
        assigned_to: row.get("assigned_to"),
        created_by: row.get("created_by"),
        updated_at: row.get("updated_at"),
        latest_submission_at: row.get("latest_submission_at"),
        latest_submission_text: row.get("latest_submission_text"),
    })
}
