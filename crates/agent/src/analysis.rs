//! Analysis stage: critiques an edited image and scores the iteration.

use crate::parse::{parse_reply, unit};
use designloop_core::agent::RunConfig;
use designloop_core::analysis::IterationAnalysis;
use designloop_core::decision::Decision;
use designloop_core::image::ImageRef;
use designloop_core::message::Message;
use designloop_core::provider::{Provider, ProviderRequest};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// System instruction for critique requests.
pub const ANALYSIS_SYSTEM: &str = "You are a strict interior design critic. \
You receive a room image produced by one edit and the decision that caused it. \
Judge the technical quality of the result and how well it matches the design goal and style. \
Reply with JSON only: {\"qualityScore\": number 0-100, \"styleScore\": number 0-100, \
\"success\": boolean, \"strengths\": [string], \"weaknesses\": [string], \"styleNotes\": string, \
\"lessonLearned\": string (one reusable style rule), \"betterApproach\": string (optional)}.";

/// How far below the running style average a "successful" edit may land
/// before it is treated as a failure.
pub const STYLE_REGRESSION_MARGIN: f64 = 0.1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    quality_score: f64,
    #[serde(default)]
    style_score: f64,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    style_notes: String,
    #[serde(default)]
    lesson_learned: String,
    #[serde(default)]
    better_approach: Option<String>,
}

/// Asks the reasoning service to critique an iteration's result.
///
/// Never fails: any call or parse failure becomes a zero-quality failed analysis.
pub struct AnalysisStage {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl AnalysisStage {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
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

    fn build_context(decision: &Decision, config: &RunConfig) -> String {
        let keywords = if config.style_keywords.is_empty() {
            "(none)".to_string()
        } else {
            config.style_keywords.join(", ")
        };
        format!(
            "Design goal: {}\nStyle keywords: {}\n\nChange applied: {}\nEditor instruction: {}",
            config.design_goal,
            keywords,
            decision.summary(),
            decision.prompt
        )
    }

    /// Critique `image` as the result of `decision`.
    ///
    /// The returned analysis carries `image` as its `image_ref` and a
    /// provisional `learning_weight` equal to the quality score.
    pub async fn analyze(
        &self,
        decision: &Decision,
        image: Option<&ImageRef>,
        config: &RunConfig,
    ) -> IterationAnalysis {
        let mut user = Message::user(Self::build_context(decision, config));
        if let Some(image) = image {
            user = user.with_image(image.clone());
        }
        let mut request = ProviderRequest::json(&self.model, ANALYSIS_SYSTEM, user);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let raw = match self.provider.complete(request).await {
            Ok(response) => match parse_reply::<RawAnalysis>(&response.message.content) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(iteration = decision.iteration, error = %e, "Unusable critique reply");
                    return Self::unavailable(decision, image, e.to_string());
                }
            },
            Err(e) => {
                warn!(iteration = decision.iteration, error = %e, "Critique request failed");
                return Self::unavailable(decision, image, e.to_string());
            }
        };

        let quality_score = unit(raw.quality_score / 100.0);
        let style_score = unit(raw.style_score / 100.0);
        debug!(
            iteration = decision.iteration,
            quality = quality_score,
            style = style_score,
            success = raw.success,
            "Critique parsed"
        );

        IterationAnalysis {
            iteration: decision.iteration,
            timestamp: chrono::Utc::now(),
            decision: decision.clone(),
            quality_score,
            style_score,
            success: raw.success,
            strengths: raw.strengths,
            weaknesses: raw.weaknesses,
            style_notes: raw.style_notes,
            lesson_learned: raw.lesson_learned.trim().to_string(),
            better_approach: raw.better_approach.filter(|s| !s.trim().is_empty()),
            image_ref: image.cloned(),
            learning_weight: quality_score,
        }
    }

    fn unavailable(decision: &Decision, image: Option<&ImageRef>, error: String) -> IterationAnalysis {
        let mut analysis = IterationAnalysis::failed(
            decision.clone(),
            format!("analysis unavailable: {error}"),
            String::new(),
        );
        analysis.image_ref = image.cloned();
        analysis
    }
}

/// Penalize a "successful" edit whose style fell behind the run so far.
///
/// If `success` and `style_score < prior_avg_style - STYLE_REGRESSION_MARGIN`,
/// the iteration is recorded as a failure and its learning weight is halved.
/// Otherwise the learning weight is the quality score. Returns whether the
/// penalty applied.
pub fn apply_style_policy(analysis: &mut IterationAnalysis, prior_avg_style: f64) -> bool {
    analysis.learning_weight = analysis.quality_score;

    if !(analysis.success && analysis.style_score < prior_avg_style - STYLE_REGRESSION_MARGIN) {
        return false;
    }

    analysis.success = false;
    analysis.learning_weight = analysis.quality_score * 0.5;

    let note = format!(
        "Quality acceptable but style regressed (style {:.2} vs running average {:.2})",
        analysis.style_score, prior_avg_style
    );
    analysis.weaknesses.push(note.clone());
    if analysis.style_notes.is_empty() {
        analysis.style_notes = note;
    } else {
        analysis.style_notes = format!("{} {}", analysis.style_notes, note);
    }

    info!(
        iteration = analysis.iteration,
        style = analysis.style_score,
        average = prior_avg_style,
        "Style regression, success revoked"
    );
    true
}
