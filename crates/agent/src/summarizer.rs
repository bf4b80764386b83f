//! Consolidation summarizer backed by the reasoning service.

use crate::parse::parse_reply;
use async_trait::async_trait;
use designloop_core::error::MemoryError;
use designloop_core::message::Message;
use designloop_core::pattern::{PatternKind, Summarizer};
use designloop_core::provider::{Provider, ProviderRequest};
use serde::Deserialize;
use std::sync::Arc;

/// System instruction for consolidation requests.
pub const CONSOLIDATION_SYSTEM: &str = "You maintain a small rulebook for an interior design agent. \
Merge the raw rules you are given into at most five short, general, non-overlapping rules. \
Keep negative rules (\"Avoid ...\") when they are still informative. \
Reply with JSON only: {\"rules\": [string]}.";

#[derive(Deserialize)]
#[serde(untagged)]
enum RulesReply {
    Wrapped { rules: Vec<String> },
    Bare(Vec<String>),
}

pub struct LlmSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, kind: PatternKind, rules: &[String]) -> Result<Vec<String>, MemoryError> {
        let listing = rules
            .iter()
            .map(|r| format!("- {r}"))
            .collect::<Vec<_>>()
            .join("\n");
        let user = Message::user(format!("Rule kind: {kind}\nRaw rules:\n{listing}"));
        let mut request = ProviderRequest::json(&self.model, CONSOLIDATION_SYSTEM, user);
        request.temperature = 0.2;

        let response = self.provider.complete(request).await?;
        let reply: RulesReply = parse_reply(&response.message.content)
            .map_err(|e| MemoryError::SummarizationFailed(e.to_string()))?;

        let rules = match reply {
            RulesReply::Wrapped { rules } | RulesReply::Bare(rules) => rules,
        };
        if rules.iter().all(|r| r.trim().is_empty()) {
            return Err(MemoryError::EmptySummary);
        }
        Ok(rules)
    }
}
