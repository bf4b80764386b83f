//! HTTP image editing client.
//!
//! POSTs `{image, prompt, action, target}` as JSON and expects
//! `{"image": "<url or data URL>"}` back. A missing or null `image` is a
//! failed edit, reported as `Ok(None)`.

use async_trait::async_trait;
use designloop_core::decision::Decision;
use designloop_core::error::ExecutionError;
use designloop_core::execution::ImageEditor;
use designloop_core::image::ImageRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub struct HttpImageEditor {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpImageEditor {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            url: url.into(),
            api_key: None,
            client,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct EditRequest<'a> {
    image: &'a str,
    prompt: &'a str,
    action: &'a str,
    target: &'a str,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    #[serde(default)]
    image: Option<String>,
}

fn parse_edit(response: EditResponse) -> Option<ImageRef> {
    response
        .image
        .filter(|uri| !uri.trim().is_empty())
        .map(ImageRef::from_uri)
}

#[async_trait]
impl ImageEditor for HttpImageEditor {
    async fn execute(
        &self,
        image: &ImageRef,
        decision: &Decision,
    ) -> Result<Option<ImageRef>, ExecutionError> {
        let body = EditRequest {
            image: image.as_uri(),
            prompt: &decision.prompt,
            action: decision.action.as_str(),
            target: &decision.target,
        };

        debug!(action = %decision.action, target = %decision.target, "Sending edit request");

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExecutionError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Image editor returned error");
            return Err(ExecutionError::RequestFailed {
                status_code: status,
                message: error_body,
            });
        }

        let parsed: EditResponse = response
            .json()
            .await
            .map_err(|e| ExecutionError::InvalidImage(e.to_string()))?;

        Ok(parse_edit(parsed))
    }
}
