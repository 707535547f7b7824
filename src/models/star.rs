//! Star model and related types
//!
//! Models for the per-login star history time series and the stargazer
//! event feed it is built from.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One day of star activity for a tracked login.
///
/// Samples form an append-only series per login: `cumulative_stars` is the
/// running sum of `new_stars` over all samples up to and including `date`,
/// and is non-decreasing in date order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarSample {
    pub login: String,
    pub new_stars: u64,
    pub cumulative_stars: u64,
    pub date: NaiveDate,
}

/// A single stargazer event from the upstream feed.
///
/// Field names follow the upstream snake_case wire format. The timestamp
/// is required; a payload without it is a decode failure, not a silently
/// dropped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StargazerEvent {
    pub starred_at: DateTime<Utc>,
}

impl StargazerEvent {
    /// The UTC calendar day this event is bucketed into.
    pub fn day(&self) -> NaiveDate {
        self.starred_at.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_buckets_to_utc_day() {
        let event: StargazerEvent =
            serde_json::from_str(r#"{"starred_at":"2024-03-01T23:59:30Z"}"#).unwrap();
        assert_eq!(event.day(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn event_without_timestamp_fails_to_decode() {
        let result = serde_json::from_str::<StargazerEvent>(r#"{"user":"octocat"}"#);
        assert!(result.is_err());
    }
}
