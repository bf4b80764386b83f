//! Perception and spatial checks backed by a vision-capable reasoning model.

use async_trait::async_trait;
use designloop_core::decision::Decision;
use designloop_core::error::{PerceptionError, ValidationError};
use designloop_core::execution::{SpatialConstraints, SpatialValidator, SpatialVerdict};
use designloop_core::image::ImageRef;
use designloop_core::message::Message;
use designloop_core::perception::{BoundingBox, DetectedObject, Perceiver};
use designloop_core::provider::{Provider, ProviderRequest, extract_json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const DETECT_SYSTEM: &str = "You are an object detector for interior photographs. \
List every distinct piece of furniture, lighting, decor and architectural feature you can see. \
Reply with JSON only: {\"objects\": [{\"name\": string, \"category\": string, \
\"boundingBox\": {\"x\": number, \"y\": number, \"width\": number, \"height\": number}}]}. \
Coordinates are fractions of the image size (0 to 1). Omit boundingBox when unsure.";

const SPATIAL_SYSTEM: &str = "You check proposed interior edits for physical plausibility. \
An edit is invalid if it would leave objects floating, overlapping solid objects, blocking \
doors or walkways, or exceeding the room's space. \
Reply with JSON only: {\"valid\": boolean, \"warnings\": [string]}.";

/// Asks a vision model to list the objects in an image.
pub struct VisionPerceiver {
    provider: Arc<dyn Provider>,
    model: String,
}

impl VisionPerceiver {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Perceiver for VisionPerceiver {
    async fn detect_objects(&self, image: &ImageRef) -> Result<Vec<DetectedObject>, PerceptionError> {
        let user = Message::user("Detect the objects in this room.").with_image(image.clone());
        let mut request = ProviderRequest::json(&self.model, DETECT_SYSTEM, user);
        request.temperature = 0.0;

        let response = self.provider.complete(request).await?;
        let objects = parse_detections(&response.message.content)?;
        debug!(count = objects.len(), "Objects detected");
        Ok(objects)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionReply {
    Wrapped { objects: Vec<RawObject> },
    Bare(Vec<RawObject>),
}

#[derive(Deserialize)]
struct RawObject {
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default, alias = "boundingBox", alias = "bbox")]
    bounding_box: Option<BoundingBox>,
}

fn parse_detections(content: &str) -> Result<Vec<DetectedObject>, PerceptionError> {
    let json = extract_json(content)
        .ok_or_else(|| PerceptionError::InvalidResponse("no JSON in detector reply".into()))?;
    let reply: DetectionReply =
        serde_json::from_str(json).map_err(|e| PerceptionError::InvalidResponse(e.to_string()))?;

    let raw = match reply {
        DetectionReply::Wrapped { objects } | DetectionReply::Bare(objects) => objects,
    };

    Ok(raw
        .into_iter()
        .filter(|o| !o.name.trim().is_empty())
        .map(|o| DetectedObject {
            name: o.name.trim().to_string(),
            category: o.category,
            bounding_box: o.bounding_box,
        })
        .collect())
}

/// Asks a vision model whether a decision is physically plausible.
pub struct VisionSpatialValidator {
    provider: Arc<dyn Provider>,
    model: String,
}

impl VisionSpatialValidator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

fn describe_scene(constraints: &SpatialConstraints) -> String {
    if constraints.objects.is_empty() {
        return "(no objects detected)".into();
    }
    constraints
        .objects
        .iter()
        .map(|o| match &o.bounding_box {
            Some(b) => format!(
                "- {} ({}) at x={:.2} y={:.2} w={:.2} h={:.2}",
                o.name, o.category, b.x, b.y, b.width, b.height
            ),
            None => format!("- {} ({})", o.name, o.category),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl SpatialValidator for VisionSpatialValidator {
    async fn validate(
        &self,
        decision: &Decision,
        constraints: &SpatialConstraints,
    ) -> Result<SpatialVerdict, ValidationError> {
        let text = format!(
            "Proposed edit: {} {}\nInstruction: {}\n\nObjects in the scene:\n{}",
            decision.action,
            decision.target,
            decision.prompt,
            describe_scene(constraints)
        );
        let mut user = Message::user(text);
        if let Some(image) = &constraints.image {
            user = user.with_image(image.clone());
        }
        let mut request = ProviderRequest::json(&self.model, SPATIAL_SYSTEM, user);
        request.temperature = 0.0;

        let response = self.provider.complete(request).await?;
        let json = extract_json(&response.message.content)
            .ok_or_else(|| ValidationError::InvalidResponse("no JSON in validator reply".into()))?;
        serde_json::from_str(json).map_err(|e| ValidationError::InvalidResponse(e.to_string()))
    }
}
