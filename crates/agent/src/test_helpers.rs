//! Shared test helpers for the agent crate.

use async_trait::async_trait;
use designloop_core::decision::{Action, Decision};
use designloop_core::error::{PerceptionError, ProviderError, ValidationError};
use designloop_core::execution::{SpatialConstraints, SpatialValidator, SpatialVerdict};
use designloop_core::image::ImageRef;
use designloop_core::message::Message;
use designloop_core::perception::{DetectedObject, Perceiver};
use designloop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock provider that returns scripted replies in sequence.
///
/// Every request is recorded. Once the script runs out, calls fail with an
/// API error, which the stages turn into their safe defaults.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
    failing: bool,
}

impl ScriptedProvider {
    pub fn new<S: Into<String>>(replies: Vec<S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// A provider whose every call fails with a network error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::empty()
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if self.failing {
            return Err(ProviderError::Network("connection refused".into()));
        }
        match self.replies.lock().unwrap().pop_front() {
            Some(text) => Ok(make_text_response(&text)),
            None => Err(ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            }),
        }
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A decision reply in the shape the decision stage expects.
pub fn decision_reply(action: &str, target: &str) -> String {
    serde_json::json!({
        "action": action,
        "target": target,
        "reason": "test",
        "prompt": format!("{action} the {target}"),
        "confidence": 0.9,
    })
    .to_string()
}

/// A plain decision for iteration 1.
pub fn decision(action: Action, target: &str) -> Decision {
    Decision {
        iteration: 1,
        action,
        target: target.into(),
        reason: "test".into(),
        prompt: format!("{action} the {target}"),
        confidence: 0.9,
        estimated_cost: 0.04,
        style_alignment: None,
    }
}

/// A perceiver that always sees the same objects.
pub struct FixedPerceiver {
    objects: Vec<DetectedObject>,
    call_count: Mutex<usize>,
}

impl FixedPerceiver {
    pub fn new(names: &[&str]) -> Self {
        Self {
            objects: names.iter().map(|n| DetectedObject::new(*n, "furniture")).collect(),
            call_count: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Perceiver for FixedPerceiver {
    async fn detect_objects(&self, _image: &ImageRef) -> Result<Vec<DetectedObject>, PerceptionError> {
        *self.call_count.lock().unwrap() += 1;
        Ok(self.objects.clone())
    }
}

/// A spatial validator with a fixed verdict.
pub struct FixedValidator {
    verdict: SpatialVerdict,
    call_count: Mutex<usize>,
}

impl FixedValidator {
    pub fn accepting() -> Self {
        Self {
            verdict: SpatialVerdict::ok(),
            call_count: Mutex::new(0),
        }
    }

    pub fn rejecting(warning: &str) -> Self {
        Self {
            verdict: SpatialVerdict::rejected(warning),
            call_count: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl SpatialValidator for FixedValidator {
    async fn validate(
        &self,
        _decision: &Decision,
        _constraints: &SpatialConstraints,
    ) -> Result<SpatialVerdict, ValidationError> {
        *self.call_count.lock().unwrap() += 1;
        Ok(self.verdict.clone())
    }
}
