//! Perception: what the object detector sees in the current image.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::PerceptionError;
use crate::image::ImageRef;

/// Axis-aligned box in normalized image coordinates (0.0..=1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Area as a fraction of the whole image.
    pub fn area(&self) -> f64 {
        (self.width * self.height).max(0.0)
    }
}

/// One object found in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Object name as the detector labels it (e.g. "sofa")
    pub name: String,

    /// Coarse category (e.g. "furniture", "lighting", "decor")
    #[serde(default)]
    pub category: String,

    /// Location in the image, when the detector provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl DetectedObject {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            bounding_box: None,
        }
    }

    pub fn with_box(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = Some(bbox);
        self
    }
}

/// Object detection over an image.
///
/// Called once at run start and again after every successful edit.
#[async_trait]
pub trait Perceiver: Send + Sync {
    async fn detect_objects(&self, image: &ImageRef) -> Result<Vec<DetectedObject>, PerceptionError>;
}
