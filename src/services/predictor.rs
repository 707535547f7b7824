//! Trend Predictor
//!
//! Extrapolates when the main trending feed is next expected to turn over,
//! from the historical snapshot boundary markers. A self-reinforcing
//! moving-average heuristic, not a statistical model: each forecast step
//! feeds its own synthesized interval back into the mean.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::services::store::TrendingStore;
use crate::services::trending_diff::TrendingError;

/// Hard cap on forecast steps.
const MAX_FORECAST_STEPS: usize = 500;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Service that forecasts future trending snapshot boundaries.
#[derive(Clone)]
pub struct TrendPredictor {
    store: Arc<dyn TrendingStore>,
}

impl TrendPredictor {
    pub fn new(store: Arc<dyn TrendingStore>) -> Self {
        Self { store }
    }

    /// Forecast boundary dates for the main (all-languages) feed, oldest
    /// first. Fewer than two historical markers yield an empty forecast.
    pub async fn predict(&self) -> Result<Vec<DateTime<Utc>>, TrendingError> {
        let history = self.store.trending_history("").await?;
        Ok(forecast(&history))
    }
}

/// Project future dates from a chronological history.
///
/// Each step takes the mean of all inter-arrival intervals seen so far
/// (historical and synthesized, in fractional days), emits the last date
/// plus that mean, and appends the mean as a new interval. Emitted dates
/// strictly increase; a history too degenerate to move time forward stops
/// the forecast early.
pub fn forecast(history: &[DateTime<Utc>]) -> Vec<DateTime<Utc>> {
    if history.len() < 2 {
        return Vec::new();
    }

    let mut intervals: Vec<f64> = history
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / MS_PER_DAY)
        .collect();
    let mut last = history[history.len() - 1];
    let mut forecasts = Vec::new();

    for _ in 0..MAX_FORECAST_STEPS {
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let step_ms = (mean * MS_PER_DAY).round() as i64;
        if step_ms <= 0 {
            break;
        }

        let next = last + Duration::milliseconds(step_ms);
        forecasts.push(next);
        intervals.push(mean);
        last = next;
    }

    forecasts
}
