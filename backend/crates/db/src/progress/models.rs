use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Green / yellow / red classification of a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Green,
    Yellow,
    Red,
}

impl RiskBand {
    /// Step function with fixed breakpoints: >= 70 red, >= 40 yellow, otherwise green.
    pub fn from_score(risk_score: i32) -> Self {
        if risk_score >= 70 {
            Self::Red
        } else if risk_score >= 40 {
            Self::Yellow
        } else {
            Self::Green
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "green" => Some(Self::Green),
            "yellow" => Some(Self::Yellow),
            "red" => Some(Self::Red),
            _ => None,
        }
    }
}

/// Dimension (or pseudo-dimension) a risk reason is about.
///
/// Serialized as a bare string; unrecognised strings survive as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReasonType {
    Timeliness,
    Velocity,
    Engagement,
    WorkBalance,
    Rework,
    Scope,
    OnTrack,
    NoData,
    Other(String),
}

impl ReasonType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Timeliness => "timeliness",
            Self::Velocity => "velocity",
            Self::Engagement => "engagement",
            Self::WorkBalance => "work_balance",
            Self::Rework => "rework",
            Self::Scope => "scope",
            Self::OnTrack => "on_track",
            Self::NoData => "no_data",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for ReasonType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "timeliness" => Self::Timeliness,
            "velocity" => Self::Velocity,
            "engagement" => Self::Engagement,
            "work_balance" => Self::WorkBalance,
            "rework" => Self::Rework,
            "scope" => Self::Scope,
            "on_track" => Self::OnTrack,
            "no_data" => Self::NoData,
            _ => Self::Other(value),
        }
    }
}

impl From<ReasonType> for String {
    fn from(value: ReasonType) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for ReasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonSeverity {
    High,
    Medium,
    Low,
    None,
}

/// One entry of the ordered reason list stored on a metrics row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskReason {
    #[serde(rename = "type")]
    pub reason_type: ReasonType,
    pub severity: ReasonSeverity,
    pub message: String,
    pub recommendation: String,
}

/// One row per (team, week_start). Recomputing the same week overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMetrics {
    pub id: Uuid,
    pub team_id: Uuid,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub timeliness: i32,
    pub velocity: i32,
    pub engagement: i32,
    pub work_balance: i32,
    pub rework: i32,
    pub scope_remaining: i32,
    pub progress_score: i32,
    pub risk_score: i32,
    pub risk_band: RiskBand,
    pub risk_reasons: Vec<RiskReason>,
    pub total_tasks: i32,
    pub completed_tasks: i32,
    pub overdue_tasks: i32,
    pub active_members: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    FallingBehind,
    AtRisk,
    LowEngagement,
    WorkImbalance,
    OnTrack,
}

impl InsightType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FallingBehind => "falling_behind",
            Self::AtRisk => "at_risk",
            Self::LowEngagement => "low_engagement",
            Self::WorkImbalance => "work_imbalance",
            Self::OnTrack => "on_track",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "falling_behind" => Some(Self::FallingBehind),
            "at_risk" => Some(Self::AtRisk),
            "low_engagement" => Some(Self::LowEngagement),
            "work_imbalance" => Some(Self::WorkImbalance),
            "on_track" => Some(Self::OnTrack),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSeverity {
    Warning,
    Critical,
}

impl InsightSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "warning" => Some(Self::Warning),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInsight {
    pub id: Uuid,
    pub team_id: Uuid,
    pub insight_type: InsightType,
    pub severity: InsightSeverity,
    pub title: String,
    pub description: String,
    pub recommendations: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsFilter {
    pub team_id: Option<Uuid>,
    pub since: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// Encode a list field for a text column.
pub fn encode_list<T: Serialize>(items: &[T]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_owned())
}

/// Decode a list field stored as JSON text. Malformed payloads yield an empty list.
pub fn decode_list<T: DeserializeOwned>(raw: Option<&str>, column: &str) -> Vec<T> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<T>>(raw) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(column, error = %e, "malformed stored list, defaulting to empty");
            Vec::new()
        }
    }
}
