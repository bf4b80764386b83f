//! Decision stage: turns the current run state into one proposed change.

use crate::parse::{ParseError, parse_reply, unit};
use designloop_core::agent::RunConfig;
use designloop_core::decision::{Action, Decision};
use designloop_core::image::ImageRef;
use designloop_core::message::Message;
use designloop_core::pattern::PatternKind;
use designloop_core::perception::DetectedObject;
use designloop_core::provider::{Provider, ProviderRequest};
use designloop_memory::PatternMemory;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// System instruction for decision requests.
pub const DECISION_SYSTEM: &str = "You are an interior designer improving a room photograph one change at a time. \
Pick the single next change that best moves the room toward the design goal. \
Actions: MOVE (reposition an existing object), EDIT (change an object or the whole scene in place), \
REMOVE (take an object out), WAIT (nothing worth changing now). \
Only target objects listed as present, unless the action is EDIT. \
Respect the learned rules; rules starting with \"Avoid\" describe changes that failed before. \
Reply with JSON only: {\"action\": \"MOVE|EDIT|REMOVE|WAIT\", \"target\": string, \"reason\": string, \
\"prompt\": string (instruction for the image editor), \"confidence\": number 0-1, \
\"styleAlignment\": string (optional)}.";

/// How many previous decisions are summarized in the prompt.
const RECENT_ACTIONS: usize = 3;

/// Everything the decision request is built from.
pub struct DecisionContext<'a> {
    pub config: &'a RunConfig,
    pub iteration: u32,
    /// All decisions so far, oldest first.
    pub history: &'a [Decision],
    pub objects: &'a [DetectedObject],
    pub memory: &'a PatternMemory,
    pub image: Option<&'a ImageRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDecision {
    action: String,
    #[serde(default)]
    target: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    style_alignment: Option<String>,
}

/// Asks the reasoning service for the next decision.
///
/// Never fails: any call or parse failure becomes a zero-confidence WAIT.
pub struct DecisionStage {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    unit_cost: f64,
    recall_min_score: f64,
    recall_limit: usize,
}

impl DecisionStage {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            unit_cost: 0.04,
            recall_min_score: 0.4,
            recall_limit: 5,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Cost estimate attached to every non-WAIT decision.
    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    /// Which learned rules reach the prompt: `score > min_score`, at most `limit` per kind.
    pub fn with_recall(mut self, min_score: f64, limit: usize) -> Self {
        self.recall_min_score = min_score;
        self.recall_limit = limit;
        self
    }

    /// Format the user message for a decision request.
    pub fn build_context(&self, ctx: &DecisionContext<'_>) -> String {
        let keywords = if ctx.config.style_keywords.is_empty() {
            "(none)".to_string()
        } else {
            ctx.config.style_keywords.join(", ")
        };

        let recent = if ctx.history.is_empty() {
            "(none yet)".to_string()
        } else {
            let skip = ctx.history.len().saturating_sub(RECENT_ACTIONS);
            ctx.history[skip..]
                .iter()
                .map(|d| format!("- iteration {}: {}", d.iteration, d.summary()))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let objects = if ctx.objects.is_empty() {
            "(nothing detected)".to_string()
        } else {
            ctx.objects
                .iter()
                .map(|o| {
                    if o.category.is_empty() {
                        format!("- {}", o.name)
                    } else {
                        format!("- {} ({})", o.name, o.category)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "Design goal: {goal}\n\
             Style keywords: {keywords}\n\
             Iteration: {iteration} of {max}\n\n\
             Recent actions:\n{recent}\n\n\
             Objects present:\n{objects}\n\n\
             Learned execution rules:\n{execution}\n\n\
             Learned style rules:\n{style}",
            goal = ctx.config.design_goal,
            iteration = ctx.iteration,
            max = ctx.config.max_iterations,
            execution = ctx.memory.render(PatternKind::Execution, self.recall_min_score, self.recall_limit),
            style = ctx.memory.render(PatternKind::Style, self.recall_min_score, self.recall_limit),
        )
    }

    /// Produce the decision for `ctx.iteration`.
    pub async fn decide(&self, ctx: &DecisionContext<'_>) -> Decision {
        let mut user = Message::user(self.build_context(ctx));
        if let Some(image) = ctx.image {
            user = user.with_image(image.clone());
        }
        let mut request = ProviderRequest::json(&self.model, DECISION_SYSTEM, user);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let response = match self.provider.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(iteration = ctx.iteration, error = %e, "Decision request failed, waiting");
                return Decision::wait(ctx.iteration, format!("decision unavailable: {e}"));
            }
        };

        match self.parse(ctx.iteration, &response.message.content) {
            Ok(decision) => {
                debug!(
                    iteration = ctx.iteration,
                    action = %decision.action,
                    target = %decision.target,
                    confidence = decision.confidence,
                    "Decision parsed"
                );
                decision
            }
            Err(e) => {
                warn!(iteration = ctx.iteration, error = %e, "Unusable decision reply, waiting");
                Decision::wait(ctx.iteration, format!("decision unavailable: {e}"))
            }
        }
    }

    fn parse(&self, iteration: u32, content: &str) -> Result<Decision, ParseError> {
        let raw: RawDecision = parse_reply(content)?;
        let action: Action = raw.action.parse().map_err(ParseError::Invalid)?;

        // Some models answer on a 0-100 scale. Small overshoots of 1.0 are clamped, not rescaled.
        let confidence = if raw.confidence > 2.0 { raw.confidence / 100.0 } else { raw.confidence };

        Ok(Decision {
            iteration,
            action,
            target: raw.target.trim().to_string(),
            reason: raw.reason,
            prompt: raw.prompt,
            confidence: unit(confidence),
            estimated_cost: if action == Action::Wait { 0.0 } else { self.unit_cost },
            style_alignment: raw.style_alignment.filter(|s| !s.trim().is_empty()),
        })
    }
}
