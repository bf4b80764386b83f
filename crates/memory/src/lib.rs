//! Learned-pattern memory for designloop agents.
//!
//! Provides [`PatternMemory`]: the bounded, decay-weighted store of
//! execution and style rules the decision stage draws its context from.

pub mod patterns;

pub use patterns::{MemoryLimits, PatternMemory};
