//! The design improvement agent.
//!
//! Each iteration follows a fixed cycle:
//!
//! 1. **Consolidate** pattern memory every few iterations
//! 2. **Decide** on one change from the goal, the scene, and learned rules
//! 3. **Validate** the change: target existence, then spatial plausibility
//! 4. **Execute** it through the image editor, after reserving budget
//! 5. **Analyze** the result and apply the style-regression penalty
//! 6. **Learn** execution and style rules from the outcome
//!
//! The run ends at the iteration cap, when the budget refuses an edit, or
//! when a caller stops it through an [`AgentHandle`].

pub mod analysis;
pub mod control;
pub mod decision;
pub mod loop_runner;
pub mod parse;
pub mod summarizer;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use analysis::{ANALYSIS_SYSTEM, AnalysisStage, STYLE_REGRESSION_MARGIN, apply_style_policy};
pub use control::{AgentHandle, RunSignal};
pub use decision::{DECISION_SYSTEM, DecisionContext, DecisionStage};
pub use loop_runner::{DesignAgent, IterationOutcome};
pub use parse::ParseError;
pub use summarizer::{CONSOLIDATION_SYSTEM, LlmSummarizer};
pub use validation::{GateVerdict, REJECTION_SCORE, Rejection, ValidationGate};
