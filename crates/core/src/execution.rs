//! Execution and spatial-validation collaborators.
//!
//! The image editor is the only costly call in an iteration; the spatial
//! validator runs before it so doomed edits never spend budget.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::decision::Decision;
use crate::error::{ExecutionError, ValidationError};
use crate::image::ImageRef;
use crate::perception::DetectedObject;

/// Applies a decision to an image.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Returns the edited image, or `None` when the editor produced nothing.
    /// `None` is a failed edit, not an error.
    async fn execute(&self, image: &ImageRef, decision: &Decision) -> Result<Option<ImageRef>, ExecutionError>;
}

/// What the spatial validator knows about the current scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpatialConstraints {
    pub objects: Vec<DetectedObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

/// Result of a spatial / physical plausibility check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialVerdict {
    pub valid: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SpatialVerdict {
    pub fn ok() -> Self {
        Self { valid: true, warnings: Vec::new() }
    }

    pub fn rejected(warning: impl Into<String>) -> Self {
        Self { valid: false, warnings: vec![warning.into()] }
    }
}

/// Checks a decision against physical constraints of the scene.
#[async_trait]
pub trait SpatialValidator: Send + Sync {
    async fn validate(&self, decision: &Decision, constraints: &SpatialConstraints) -> Result<SpatialVerdict, ValidationError>;
}
