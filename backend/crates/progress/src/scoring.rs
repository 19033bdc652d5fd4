use chrono::{DateTime, Utc};
use uuid::Uuid;

use pulse_db::progress::models::{RiskBand, TeamMetrics};

use crate::calculators::{self, ActivitySnapshot};
use crate::insights::{no_data_reason, risk_reasons};
use crate::week::WeekWindow;

/// The six per-week dimensions every score is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub timeliness: i32,
    pub velocity: i32,
    pub engagement: i32,
    pub work_balance: i32,
    pub rework: i32,
    pub scope_remaining: i32,
}

impl Dimensions {
    pub fn from_activity(snapshot: &ActivitySnapshot, window: &WeekWindow) -> Self {
        let submissions_this_week =
            calculators::submissions_in_window(&snapshot.submissions, window);

        Self {
            timeliness: calculators::timeliness(&snapshot.tasks),
            velocity: calculators::velocity(&snapshot.tasks, window),
            engagement: calculators::engagement(
                snapshot.message_count,
                submissions_this_week,
                snapshot.member_ids.len() as i64,
            ),
            work_balance: calculators::work_balance(&snapshot.member_ids, &snapshot.submissions),
            rework: calculators::rework(&snapshot.tasks, &snapshot.submissions),
            scope_remaining: calculators::scope_remaining(&snapshot.tasks),
        }
    }
}

/// Progress score (0-100, higher is better).
///
/// Weighted formula:
///   - timeliness contributes 30%
///   - velocity contributes 20% (normalized: 5 tasks/week → 100)
///   - engagement contributes 25%
///   - completion (100 - scope_remaining) contributes 25%
pub fn progress_score(d: &Dimensions) -> i32 {
    let normalized_velocity = (d.velocity as f64 * 20.0).min(100.0);
    let completion = 100.0 - d.scope_remaining as f64;

    let raw = d.timeliness as f64 * 0.30
        + normalized_velocity * 0.20
        + d.engagement as f64 * 0.25
        + completion * 0.25;

    raw.round().clamp(0.0, 100.0) as i32
}

/// Risk score (0-100, higher is worse), accumulated additively and capped at 100.
pub fn risk_score(d: &Dimensions) -> i32 {
    let mut risk = (100 - d.timeliness) as f64 * 0.25;

    risk += match d.velocity {
        v if v < 2 => 25.0,
        v if v < 4 => 10.0,
        _ => 0.0,
    };

    risk += (100 - d.engagement) as f64 * 0.20;

    risk += match d.work_balance {
        w if w > 35 => 20.0,
        w if w > 25 => 10.0,
        _ => 0.0,
    };

    risk += match d.rework {
        r if r > 30 => 15.0,
        r if r > 15 => 8.0,
        _ => 0.0,
    };

    risk += match d.scope_remaining {
        s if s > 70 => 15.0,
        s if s > 50 => 8.0,
        _ => 0.0,
    };

    risk.round().clamp(0.0, 100.0) as i32
}

/// Derive the full metrics row for one team and week.
///
/// A team without tasks short-circuits to the fixed no-data result.
pub fn score_team(
    team_id: Uuid,
    window: &WeekWindow,
    snapshot: &ActivitySnapshot,
    now: DateTime<Utc>,
) -> TeamMetrics {
    if snapshot.tasks.is_empty() {
        return no_data_metrics(team_id, window, now);
    }

    let dimensions = Dimensions::from_activity(snapshot, window);
    let risk = risk_score(&dimensions);
    let counts = calculators::task_counts(&snapshot.tasks, now);

    TeamMetrics {
        id: Uuid::new_v4(),
        team_id,
        week_start: window.start_date(),
        week_end: window.end_date(),
        timeliness: dimensions.timeliness,
        velocity: dimensions.velocity,
        engagement: dimensions.engagement,
        work_balance: dimensions.work_balance,
        rework: dimensions.rework,
        scope_remaining: dimensions.scope_remaining,
        progress_score: progress_score(&dimensions),
        risk_score: risk,
        risk_band: RiskBand::from_score(risk),
        risk_reasons: risk_reasons(&dimensions),
        total_tasks: counts.total,
        completed_tasks: counts.completed,
        overdue_tasks: counts.overdue,
        active_members: snapshot.member_ids.len() as i32,
        created_at: now,
        updated_at: now,
    }
}

pub fn no_data_metrics(team_id: Uuid, window: &WeekWindow, now: DateTime<Utc>) -> TeamMetrics {
    TeamMetrics {
        id: Uuid::new_v4(),
        team_id,
        week_start: window.start_date(),
        week_end: window.end_date(),
        timeliness: 0,
        velocity: 0,
        engagement: 0,
        work_balance: 0,
        rework: 0,
        scope_remaining: 100,
        progress_score: 0,
        risk_score: 100,
        risk_band: RiskBand::Red,
        risk_reasons: vec![no_data_reason()],
        total_tasks: 0,
        completed_tasks: 0,
        overdue_tasks: 0,
        active_members: 0,
        created_at: now,
        updated_at: now,
    }
}
