//! Provider trait: the abstraction over the reasoning service.
//!
//! A Provider knows how to send a short message list (optionally with images)
//! to a vision-capable LLM and get a complete response back. Decision,
//! critique, consolidation, perception and spatial checks are all built on
//! top of this one call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o", "anthropic/claude-sonnet-4")
    pub model: String,

    /// The request messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Ask the service to answer with a single JSON object
    #[serde(default)]
    pub json_response: bool,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// Build a JSON-mode request from a system instruction and a user message.
    pub fn json(model: impl Into<String>, system: impl Into<String>, user: Message) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::system(system), user],
            temperature: default_temperature(),
            max_tokens: None,
            json_response: true,
        }
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every reasoning backend implements this trait. The stages call
/// `complete()` without knowing which backend is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Extract the first JSON value embedded in a model reply.
///
/// Models frequently wrap JSON in markdown fences or add a sentence of
/// preamble; this strips both and returns the outermost object or array.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    let start = unfenced.find(['{', '['])?;
    let close = if unfenced[start..].starts_with('{') { '}' } else { ']' };
    let end = unfenced.rfind(close)?;
    (end > start).then(|| &unfenced[start..=end])
}
