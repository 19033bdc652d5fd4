use serde::Serialize;
use uuid::Uuid;

use pulse_db::progress::models::{RiskBand, TeamMetrics};

/// Latest metrics for one team of a class; `metrics` is `None` until the first run.
#[derive(Debug, Clone, Serialize)]
pub struct TeamStanding {
    pub team_id: Uuid,
    pub metrics: Option<TeamMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BandSummary {
    pub total_teams: usize,
    pub at_risk: usize,
    pub needs_attention: usize,
    pub on_track: usize,
}

impl BandSummary {
    pub fn from_standings(standings: &[TeamStanding]) -> Self {
        let mut summary = Self {
            total_teams: standings.len(),
            ..Default::default()
        };
        for band in standings.iter().filter_map(|s| s.metrics.as_ref().map(|m| m.risk_band)) {
            match band {
                RiskBand::Red => summary.at_risk += 1,
                RiskBand::Yellow => summary.needs_attention += 1,
                RiskBand::Green => summary.on_track += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassProgress {
    pub class_id: Uuid,
    pub teams: Vec<TeamStanding>,
    pub summary: BandSummary,
}

impl ClassProgress {
    /// Riskiest teams first; teams without metrics go last.
    pub fn new(class_id: Uuid, mut teams: Vec<TeamStanding>) -> Self {
        teams.sort_by_key(|s| std::cmp::Reverse(s.metrics.as_ref().map(|m| m.risk_score)));
        let summary = BandSummary::from_standings(&teams);
        Self {
            class_id,
            teams,
            summary,
        }
    }
}
