//! Pre-flight checks that run before any costly edit.
//!
//! A rejected decision never reaches the image editor. The loop turns the
//! rejection into a synthetic failed analysis and a high-confidence
//! "avoid" rule, without asking the critic.

use designloop_core::analysis::IterationAnalysis;
use designloop_core::decision::{Action, Decision};
use designloop_core::error::ValidationError;
use designloop_core::execution::{SpatialConstraints, SpatialValidator};
use designloop_core::image::ImageRef;
use designloop_core::perception::DetectedObject;
use std::sync::Arc;
use tracing::debug;

/// Confidence of the negative rule learned from a rejected decision.
pub const REJECTION_SCORE: f64 = 0.8;

/// Target that always refers to the whole scene.
const SCENE_TARGET: &str = "room";

/// Why a decision was stopped before execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The target is not among the detected objects.
    MissingTarget,
    /// The spatial validator found the edit physically implausible.
    Spatial(Vec<String>),
}

impl Rejection {
    /// Short reason for logs and the improvement history.
    pub fn detail(&self) -> String {
        match self {
            Self::MissingTarget => "target not present in scene".into(),
            Self::Spatial(warnings) if warnings.is_empty() => "spatially invalid".into(),
            Self::Spatial(warnings) => format!("spatially invalid ({})", warnings.join("; ")),
        }
    }

    /// The negative rule fed into execution memory.
    ///
    /// One rule per action/target pair, whatever the reason, so repeated
    /// rejections reinforce a single pattern. The reason lives in the
    /// synthetic analysis.
    pub fn avoid_rule(&self, decision: &Decision) -> String {
        format!("Avoid {} on {}", decision.action, decision.target)
    }

    /// A zero-score failed analysis describing the rejection.
    pub fn into_analysis(self, decision: Decision) -> IterationAnalysis {
        let (weakness, lesson) = match &self {
            Self::MissingTarget => (
                format!("Target '{}' was not found in the scene", decision.target),
                format!(
                    "Only {} objects that are visible in the current image",
                    decision.action.as_str().to_lowercase()
                ),
            ),
            Self::Spatial(warnings) => (
                format!("Spatial check failed: {}", warnings.join("; ")),
                format!(
                    "{} on {} breaks physical constraints: {}",
                    decision.action,
                    decision.target,
                    warnings.join("; ")
                ),
            ),
        };
        IterationAnalysis::failed(decision, weakness, lesson)
    }
}

/// Outcome of the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    Clear,
    Rejected(Rejection),
}

/// Existence check plus optional spatial check.
#[derive(Clone, Default)]
pub struct ValidationGate {
    spatial: Option<Arc<dyn SpatialValidator>>,
}

impl ValidationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spatial_validator(mut self, validator: Arc<dyn SpatialValidator>) -> Self {
        self.spatial = Some(validator);
        self
    }

    /// Whether `decision.target` refers to something in the scene.
    ///
    /// EDIT decisions may target the whole scene and always pass. Otherwise
    /// the target must equal, contain, or be contained in a detected object
    /// name (case-insensitive), or be the literal `room`.
    pub fn target_exists(decision: &Decision, objects: &[DetectedObject]) -> bool {
        if decision.action == Action::Edit {
            return true;
        }
        let target = decision.target.trim().to_lowercase();
        if target.is_empty() {
            return false;
        }
        if target == SCENE_TARGET {
            return true;
        }
        objects.iter().any(|o| {
            let name = o.name.trim().to_lowercase();
            !name.is_empty() && (name == target || name.contains(&target) || target.contains(&name))
        })
    }

    /// Run both checks. The spatial check is skipped in test mode and when
    /// no validator is configured.
    pub async fn check(
        &self,
        decision: &Decision,
        objects: &[DetectedObject],
        image: Option<&ImageRef>,
        test_mode: bool,
    ) -> Result<GateVerdict, ValidationError> {
        if !Self::target_exists(decision, objects) {
            debug!(action = %decision.action, target = %decision.target, "Target not in scene");
            return Ok(GateVerdict::Rejected(Rejection::MissingTarget));
        }

        let Some(validator) = self.spatial.as_ref().filter(|_| !test_mode) else {
            return Ok(GateVerdict::Clear);
        };

        let constraints = SpatialConstraints {
            objects: objects.to_vec(),
            image: image.cloned(),
        };
        let verdict = validator.validate(decision, &constraints).await?;
        if verdict.valid {
            Ok(GateVerdict::Clear)
        } else {
            debug!(action = %decision.action, target = %decision.target, warnings = ?verdict.warnings, "Spatial check failed");
            Ok(GateVerdict::Rejected(Rejection::Spatial(verdict.warnings)))
        }
    }
}
