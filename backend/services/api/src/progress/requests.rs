use chrono::NaiveDate;
use pulse_common::error::{PulseError, PulseResult};
use serde::Deserialize;

pub const MAX_HISTORY_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub since: Option<NaiveDate>,
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn validate(&self) -> PulseResult<()> {
        if let Some(limit) = self.limit {
            if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
                return Err(PulseError::Validation(format!(
                    "limit must be between 1 and {MAX_HISTORY_LIMIT}"
                )));
            }
        }
        Ok(())
    }
}
