//! Per-iteration analysis: the scored outcome of one decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::decision::Decision;
use crate::image::ImageRef;

/// The critique of one iteration. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationAnalysis {
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
    pub decision: Decision,
    /// 0.0..=1.0
    pub quality_score: f64,
    /// 0.0..=1.0
    pub style_score: f64,
    pub success: bool,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub style_notes: String,
    #[serde(default)]
    pub lesson_learned: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub better_approach: Option<String>,
    /// The image this analysis judged; absent when the iteration never executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<ImageRef>,
    /// Confidence fed into pattern memory for this iteration
    #[serde(default)]
    pub learning_weight: f64,
}

impl IterationAnalysis {
    /// A failed analysis with zero scores and a single weakness.
    pub fn failed(decision: Decision, weakness: impl Into<String>, lesson: impl Into<String>) -> Self {
        Self {
            iteration: decision.iteration,
            timestamp: Utc::now(),
            decision,
            quality_score: 0.0,
            style_score: 0.0,
            success: false,
            strengths: Vec::new(),
            weaknesses: vec![weakness.into()],
            style_notes: String::new(),
            lesson_learned: lesson.into(),
            better_approach: None,
            image_ref: None,
            learning_weight: 0.0,
        }
    }
}
