//! Learned patterns: scored textual rules distilled from iteration outcomes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::MemoryError;

/// Which of the two pattern collections a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// What actions work or fail
    Execution,
    /// Aesthetic rules
    Style,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Execution => write!(f, "execution"),
            Self::Style => write!(f, "style"),
        }
    }
}

/// One learned rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub id: String,
    pub content: String,
    /// 0.0..=1.0
    pub score: f64,
    /// Number of observations folded into this rule (≥ 1)
    pub frequency: u32,
    pub last_iteration: u32,
}

impl Pattern {
    pub fn new(content: impl Into<String>, score: f64, iteration: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            score: score.clamp(0.0, 1.0),
            frequency: 1,
            last_iteration: iteration,
        }
    }
}

/// Both collections, each sorted by descending score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnedPatterns {
    pub execution: Vec<Pattern>,
    pub style: Vec<Pattern>,
}

impl LearnedPatterns {
    pub fn get(&self, kind: PatternKind) -> &[Pattern] {
        match kind {
            PatternKind::Execution => &self.execution,
            PatternKind::Style => &self.style,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.execution.is_empty() && self.style.is_empty()
    }
}

/// Distills a collection of raw rules into a few consolidated ones.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, kind: PatternKind, rules: &[String]) -> Result<Vec<String>, MemoryError>;
}
