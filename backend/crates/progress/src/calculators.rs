//! Pure reducers from a team's raw activity to one bounded dimension each.
//!
//! Percentages are rounded to the nearest integer and stay within 0..=100.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use pulse_db::activity::models::{SubmissionRecord, TaskRecord};

use crate::week::WeekWindow;

/// Messages per active member that saturate the message part of engagement.
pub const MESSAGES_PER_MEMBER: f64 = 5.0;
/// Submissions per active member that saturate the submission part of engagement.
pub const SUBMISSIONS_PER_MEMBER: f64 = 1.0;
pub const MESSAGE_WEIGHT: f64 = 30.0;
pub const SUBMISSION_WEIGHT: f64 = 70.0;

/// Everything the calculators need about one team, fetched up front.
#[derive(Debug, Clone, Default)]
pub struct ActivitySnapshot {
    pub tasks: Vec<TaskRecord>,
    pub submissions: Vec<SubmissionRecord>,
    pub member_ids: Vec<Uuid>,
    pub message_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: i32,
    pub completed: i32,
    pub overdue: i32,
}

/// Share of completed tasks whose latest submission landed on or before the due date.
/// Tasks without a due date count as on time.
pub fn timeliness(tasks: &[TaskRecord]) -> i32 {
    let completed: Vec<&TaskRecord> = tasks.iter().filter(|t| t.status.is_completed()).collect();
    if completed.is_empty() {
        return 0;
    }

    let on_time = completed
        .iter()
        .filter(|t| match (t.due_date, t.latest_submission_at) {
            (None, _) => true,
            (Some(due), Some(submitted)) => submitted <= due,
            (Some(_), None) => false,
        })
        .count();

    percentage(on_time, completed.len())
}

/// Tasks completed within the window, judged by their last update.
pub fn velocity(tasks: &[TaskRecord], window: &WeekWindow) -> i32 {
    tasks
        .iter()
        .filter(|t| t.status.is_completed() && window.contains(t.updated_at))
        .count() as i32
}

/// Message volume (30%) plus submission volume (70%), each capped at its weight.
pub fn engagement(message_count: i64, submission_count: i64, active_members: i64) -> i32 {
    let members = active_members.max(1) as f64;

    let message_score =
        (message_count as f64 / (members * MESSAGES_PER_MEMBER) * MESSAGE_WEIGHT).min(MESSAGE_WEIGHT);
    let submission_score = (submission_count as f64 / (members * SUBMISSIONS_PER_MEMBER)
        * SUBMISSION_WEIGHT)
        .min(SUBMISSION_WEIGHT);

    (message_score + submission_score).round().clamp(0.0, 100.0) as i32
}

/// Gini coefficient of per-member submission totals, scaled to 0..=100.
/// Only members with at least one submission are compared; fewer than two
/// contributors is balanced by definition.
pub fn work_balance(member_ids: &[Uuid], submissions: &[SubmissionRecord]) -> i32 {
    let members: HashSet<Uuid> = member_ids.iter().copied().collect();
    let mut totals: HashMap<Uuid, f64> = HashMap::new();
    for submission in submissions.iter().filter(|s| members.contains(&s.submitted_by)) {
        *totals.entry(submission.submitted_by).or_default() += 1.0;
    }

    if totals.len() <= 1 {
        return 0;
    }

    let values: Vec<f64> = totals.into_values().collect();
    (gini(&values) * 100.0).round().clamp(0.0, 100.0) as i32
}

/// `G = Σ (2i - n - 1) * x_i / (n * Σ x)` over values sorted ascending, `i` 1-based.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let sum: f64 = sorted.iter().sum();
    if sum == 0.0 {
        return 0.0;
    }

    let numerator: f64 = sorted
        .iter()
        .enumerate()
        .map(|(idx, x)| (2.0 * (idx as f64 + 1.0) - n as f64 - 1.0) * x)
        .sum();

    numerator / (n as f64 * sum)
}

/// Share of tasks that received more than one submission.
pub fn rework(tasks: &[TaskRecord], submissions: &[SubmissionRecord]) -> i32 {
    if tasks.is_empty() {
        return 0;
    }

    let task_ids: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
    let mut per_task: HashMap<Uuid, usize> = HashMap::new();
    for submission in submissions.iter().filter(|s| task_ids.contains(&s.task_id)) {
        *per_task.entry(submission.task_id).or_default() += 1;
    }

    let resubmitted = per_task.values().filter(|count| **count > 1).count();
    percentage(resubmitted, tasks.len())
}

/// Share of tasks not yet completed.
pub fn scope_remaining(tasks: &[TaskRecord]) -> i32 {
    if tasks.is_empty() {
        return 0;
    }
    let open = tasks.iter().filter(|t| !t.status.is_completed()).count();
    percentage(open, tasks.len())
}

/// Submissions made within the window.
pub fn submissions_in_window(submissions: &[SubmissionRecord], window: &WeekWindow) -> i64 {
    submissions
        .iter()
        .filter(|s| window.contains(s.submitted_at))
        .map(|s| s.id)
        .collect::<HashSet<_>>()
        .len() as i64
}

/// Raw task counts; a task is overdue when its due date has passed and it is not completed.
pub fn task_counts(tasks: &[TaskRecord], now: DateTime<Utc>) -> TaskCounts {
    TaskCounts {
        total: tasks.len() as i32,
        completed: tasks.iter().filter(|t| t.status.is_completed()).count() as i32,
        overdue: tasks
            .iter()
            .filter(|t| !t.status.is_completed() && t.due_date.is_some_and(|due| due < now))
            .count() as i32,
    }
}

fn percentage(part: usize, whole: usize) -> i32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as i32
}
