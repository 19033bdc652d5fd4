use chrono::{DateTime, Utc};
use uuid::Uuid;

use pulse_db::progress::models::{
    InsightSeverity, InsightType, ReasonSeverity, ReasonType, RiskReason, TeamInsight,
};

use crate::scoring::Dimensions;

pub const TIMELINESS_THRESHOLD: i32 = 60;
pub const VELOCITY_THRESHOLD: i32 = 2;
pub const ENGAGEMENT_THRESHOLD: i32 = 50;
pub const WORK_BALANCE_THRESHOLD: i32 = 35;
pub const REWORK_THRESHOLD: i32 = 30;
pub const SCOPE_THRESHOLD: i32 = 70;

fn reason(
    reason_type: ReasonType,
    severity: ReasonSeverity,
    message: String,
    recommendation: &str,
) -> RiskReason {
    RiskReason {
        reason_type,
        severity,
        message,
        recommendation: recommendation.to_owned(),
    }
}

/// Ordered reasons for every out-of-threshold dimension, or a single `on_track`.
pub fn risk_reasons(d: &Dimensions) -> Vec<RiskReason> {
    let mut reasons = Vec::new();

    if d.timeliness < TIMELINESS_THRESHOLD {
        reasons.push(reason(
            ReasonType::Timeliness,
            ReasonSeverity::High,
            format!("Only {}% of tasks completed on time", d.timeliness),
            "Review task assignments and provide deadline reminders",
        ));
    }

    if d.velocity < VELOCITY_THRESHOLD {
        reasons.push(reason(
            ReasonType::Velocity,
            ReasonSeverity::High,
            format!("Low completion rate ({} tasks/week)", d.velocity),
            "Check if team has too many tasks or needs support",
        ));
    }

    if d.engagement < ENGAGEMENT_THRESHOLD {
        reasons.push(reason(
            ReasonType::Engagement,
            ReasonSeverity::Medium,
            format!("Low team engagement ({}/100)", d.engagement),
            "Encourage team communication and collaboration",
        ));
    }

    if d.work_balance > WORK_BALANCE_THRESHOLD {
        reasons.push(reason(
            ReasonType::WorkBalance,
            ReasonSeverity::Medium,
            "Uneven work distribution across team members".to_owned(),
            "Redistribute tasks to balance workload",
        ));
    }

    if d.rework > REWORK_THRESHOLD {
        reasons.push(reason(
            ReasonType::Rework,
            ReasonSeverity::Low,
            format!("High rework rate ({}% of tasks resubmitted)", d.rework),
            "Provide clearer task requirements and examples",
        ));
    }

    if d.scope_remaining > SCOPE_THRESHOLD {
        reasons.push(reason(
            ReasonType::Scope,
            ReasonSeverity::High,
            format!("{}% of tasks still incomplete", d.scope_remaining),
            "Consider adjusting deadlines or reducing scope",
        ));
    }

    if reasons.is_empty() {
        reasons.push(reason(
            ReasonType::OnTrack,
            ReasonSeverity::None,
            "Team is performing well".to_owned(),
            "Continue monitoring progress",
        ));
    }

    reasons
}

/// The synthetic reason attached to teams that have no tasks at all.
pub fn no_data_reason() -> RiskReason {
    reason(
        ReasonType::NoData,
        ReasonSeverity::High,
        "No task data available for this team".to_owned(),
        "Assign tasks to get started",
    )
}

pub fn insight_type_for(reason_type: &ReasonType) -> InsightType {
    match reason_type {
        ReasonType::Timeliness => InsightType::FallingBehind,
        ReasonType::Velocity | ReasonType::Scope => InsightType::AtRisk,
        ReasonType::Engagement => InsightType::LowEngagement,
        ReasonType::WorkBalance => InsightType::WorkImbalance,
        ReasonType::OnTrack => InsightType::OnTrack,
        _ => InsightType::AtRisk,
    }
}

/// Only high and medium reasons become standalone insights.
pub fn insight_severity_for(severity: ReasonSeverity) -> Option<InsightSeverity> {
    match severity {
        ReasonSeverity::High => Some(InsightSeverity::Critical),
        ReasonSeverity::Medium => Some(InsightSeverity::Warning),
        ReasonSeverity::Low | ReasonSeverity::None => None,
    }
}

pub fn build_insights(team_id: Uuid, reasons: &[RiskReason], now: DateTime<Utc>) -> Vec<TeamInsight> {
    reasons
        .iter()
        .filter_map(|r| {
            let severity = insight_severity_for(r.severity)?;
            Some(TeamInsight {
                id: Uuid::new_v4(),
                team_id,
                insight_type: insight_type_for(&r.reason_type),
                severity,
                title: r.message.clone(),
                description: r.recommendation.clone(),
                recommendations: vec![r.recommendation.clone()],
                is_active: true,
                created_at: now,
                resolved_at: None,
            })
        })
        .collect()
}
