//! Cost tracking and budget enforcement for designloop runs.
//!
//! Every costly edit reserves a fixed unit of spend before it is issued.
//! Reservations are committed against a hard ceiling and never rolled back,
//! so the ledger always reflects money already spent.

pub mod model;
pub mod tracker;

pub use model::{CostSummary, Reservation};
pub use tracker::CostTracker;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),
}
