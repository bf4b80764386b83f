//! Typed parsing of reasoning-service replies.

use designloop_core::provider::extract_json;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("reply contained no JSON")]
    NoJson,

    #[error("reply JSON did not match the expected shape: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("reply had an invalid value: {0}")]
    Invalid(String),
}

/// Parse the JSON embedded in a model reply into `T`.
pub fn parse_reply<T: DeserializeOwned>(content: &str) -> Result<T, ParseError> {
    let json = extract_json(content).ok_or(ParseError::NoJson)?;
    Ok(serde_json::from_str(json)?)
}

/// Clamp to `[0, 1]`, mapping NaN to 0.
pub(crate) fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
