//! Decisions: the one change the loop commits to per iteration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The kind of change a decision asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Reposition an existing object
    Move,
    /// Change an object or the whole scene in place
    Edit,
    /// Take an object out of the scene
    Remove,
    /// Do nothing this iteration
    Wait,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Move => "MOVE",
            Self::Edit => "EDIT",
            Self::Remove => "REMOVE",
            Self::Wait => "WAIT",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MOVE" => Ok(Self::Move),
            "EDIT" => Ok(Self::Edit),
            "REMOVE" => Ok(Self::Remove),
            "WAIT" => Ok(Self::Wait),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// A single decided change. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub iteration: u32,
    pub action: Action,
    pub target: String,
    pub reason: String,
    /// Instruction handed to the image editor
    pub prompt: String,
    /// 0.0..=1.0
    pub confidence: f64,
    pub estimated_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_alignment: Option<String>,
}

impl Decision {
    /// The safe default used whenever no usable decision could be obtained.
    pub fn wait(iteration: u32, reason: impl Into<String>) -> Self {
        Self {
            iteration,
            action: Action::Wait,
            target: String::new(),
            reason: reason.into(),
            prompt: String::new(),
            confidence: 0.0,
            estimated_cost: 0.0,
            style_alignment: None,
        }
    }

    /// One-line summary, e.g. `MOVE sofa: open up the walkway`.
    pub fn summary(&self) -> String {
        if self.target.is_empty() {
            format!("{}: {}", self.action, self.reason)
        } else {
            format!("{} {}: {}", self.action, self.target, self.reason)
        }
    }
}
