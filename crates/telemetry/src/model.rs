//! Data model for committed cost reservations and cost summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Micro-dollars per USD. Costs are stored as integer micro-dollars so
/// budget comparisons are exact.
pub const MICROS_PER_USD: f64 = 1_000_000.0;

/// Convert a USD amount to micro-dollars, rounding to the nearest unit.
pub fn to_micros(usd: f64) -> u64 {
    if usd.is_finite() && usd > 0.0 {
        (usd * MICROS_PER_USD).round() as u64
    } else {
        0
    }
}

/// Convert micro-dollars back to USD.
pub fn to_usd(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_USD
}

/// One committed unit of spend. Reservations are permanent for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// What the money was spent on (e.g. "edit:MOVE sofa").
    pub label: String,
    /// Cost in micro-dollars.
    pub cost_micros: u64,
    /// When the reservation was committed.
    pub at: DateTime<Utc>,
}

impl Reservation {
    pub fn cost_usd(&self) -> f64 {
        to_usd(self.cost_micros)
    }
}

/// Aggregated view of a tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSummary {
    /// Budget ceiling in USD.
    pub max_usd: f64,
    /// Total committed spend in USD.
    pub spent_usd: f64,
    /// Remaining headroom in USD.
    pub remaining_usd: f64,
    /// Number of committed reservations.
    pub reservations: u64,
    /// Number of rejected reservation attempts.
    pub rejections: u64,
}
