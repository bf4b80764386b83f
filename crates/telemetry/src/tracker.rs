//! Budget gate for the run loop.

use crate::TelemetryError;
use crate::model::*;
use chrono::Utc;

/// Accepts or rejects fixed-cost units of work against a spending ceiling.
///
/// Owned by a single run loop, so it needs no interior locking. A committed
/// reservation is never rolled back: the money is considered spent even
/// when the work it paid for fails.
#[derive(Debug, Clone)]
pub struct CostTracker {
    max_micros: u64,
    spent_micros: u64,
    ledger: Vec<Reservation>,
    rejections: u64,
}

impl CostTracker {
    /// Create a tracker with the given ceiling in USD.
    pub fn new(max_cost: f64) -> Self {
        Self {
            max_micros: to_micros(max_cost),
            spent_micros: 0,
            ledger: Vec::new(),
            rejections: 0,
        }
    }

    /// Commit `unit_cost` iff `spent + unit_cost <= max`.
    ///
    /// Returns `false` and changes nothing otherwise.
    pub fn try_reserve(&mut self, unit_cost: f64) -> bool {
        self.reserve("unit", unit_cost).is_ok()
    }

    /// Labelled variant of [`try_reserve`](Self::try_reserve) that explains rejections.
    pub fn reserve(&mut self, label: impl Into<String>, unit_cost: f64) -> Result<(), TelemetryError> {
        let cost = to_micros(unit_cost);
        let projected = self.spent_micros.saturating_add(cost);

        if projected > self.max_micros {
            self.rejections += 1;
            tracing::warn!(
                projected = to_usd(projected),
                limit = to_usd(self.max_micros),
                "Budget reservation rejected"
            );
            return Err(TelemetryError::BudgetExceeded(format!(
                "projected ${:.4} exceeds limit ${:.4} (spent: ${:.4})",
                to_usd(projected),
                to_usd(self.max_micros),
                to_usd(self.spent_micros)
            )));
        }

        self.spent_micros = projected;
        self.ledger.push(Reservation {
            label: label.into(),
            cost_micros: cost,
            at: Utc::now(),
        });
        tracing::debug!(spent = to_usd(self.spent_micros), "Budget reservation committed");
        Ok(())
    }

    /// Cumulative committed cost in USD.
    pub fn spent(&self) -> f64 {
        to_usd(self.spent_micros)
    }

    /// The ceiling in USD.
    pub fn max_cost(&self) -> f64 {
        to_usd(self.max_micros)
    }

    /// Headroom left in USD.
    pub fn remaining(&self) -> f64 {
        to_usd(self.max_micros - self.spent_micros)
    }

    /// Whether a unit of the given cost would still fit.
    pub fn can_afford(&self, unit_cost: f64) -> bool {
        self.spent_micros.saturating_add(to_micros(unit_cost)) <= self.max_micros
    }

    /// Committed reservations, oldest first.
    pub fn ledger(&self) -> &[Reservation] {
        &self.ledger
    }

    pub fn summary(&self) -> CostSummary {
        CostSummary {
            max_usd: self.max_cost(),
            spent_usd: self.spent(),
            remaining_usd: self.remaining(),
            reservations: self.ledger.len() as u64,
            rejections: self.rejections,
        }
    }
}
