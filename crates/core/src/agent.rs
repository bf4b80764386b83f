//! Run configuration and agent state types.

use serde::{Deserialize, Serialize};
use crate::analysis::IterationAnalysis;
use crate::decision::Decision;
use crate::image::ImageRef;
use crate::pattern::LearnedPatterns;
use crate::perception::DetectedObject;

/// Immutable per-run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Simulate execution instead of calling the editor; no cost is charged
    #[serde(default)]
    pub test_mode: bool,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Pause between iterations
    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,

    /// Hard spending ceiling in USD
    #[serde(default = "default_max_cost")]
    pub max_cost: f64,

    pub design_goal: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub style_keywords: Vec<String>,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_iteration_delay_ms() -> u64 {
    2000
}
fn default_max_cost() -> f64 {
    1.0
}

impl RunConfig {
    pub fn new(design_goal: impl Into<String>) -> Self {
        Self {
            test_mode: false,
            max_iterations: default_max_iterations(),
            iteration_delay_ms: default_iteration_delay_ms(),
            max_cost: default_max_cost(),
            design_goal: design_goal.into(),
            style_keywords: Vec::new(),
        }
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Paused,
    /// Explicit stop or budget exhaustion
    Stopped,
    /// Iteration cap reached
    Completed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Rolling aggregates over every analysis recorded so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallProgress {
    pub avg_quality: f64,
    pub avg_style_score: f64,
    pub success_rate: f64,
    pub total_changes: u32,
}

impl OverallProgress {
    pub fn from_analyses(analyses: &[IterationAnalysis]) -> Self {
        if analyses.is_empty() {
            return Self::default();
        }
        let n = analyses.len() as f64;
        Self {
            avg_quality: analyses.iter().map(|a| a.quality_score).sum::<f64>() / n,
            avg_style_score: analyses.iter().map(|a| a.style_score).sum::<f64>() / n,
            success_rate: analyses.iter().filter(|a| a.success).count() as f64 / n,
            total_changes: analyses.iter().filter(|a| a.image_ref.is_some()).count() as u32,
        }
    }
}

/// Run-scoped state. The loop owns the live value; callers only ever see copies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    pub is_running: bool,
    pub is_paused: bool,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub current_iteration: u32,
    pub total_cost: f64,
    pub decisions: Vec<Decision>,
    /// Plain-text improvement log
    pub improvements: Vec<String>,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_image: Option<ImageRef>,
    pub analyses: Vec<IterationAnalysis>,
    pub overall_progress: OverallProgress,
    pub learned_patterns: LearnedPatterns,
    pub detected_objects: Vec<DetectedObject>,
}
