//! Error types for the designloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error variant.

use thiserror::Error;

/// The top-level error type for all designloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Reasoning service errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Perception errors ---
    #[error("Perception error: {0}")]
    Perception(#[from] PerceptionError),

    // --- Image editing errors ---
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    // --- Spatial validator errors ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Pattern memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum PerceptionError {
    #[error("Object detection failed: {0}")]
    DetectionFailed(String),

    #[error("Unreadable detection response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("Image editor not configured: {0}")]
    NotConfigured(String),

    #[error("Image edit request failed: {message} (status: {status_code})")]
    RequestFailed { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid image payload: {0}")]
    InvalidImage(String),
}

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Spatial validator unavailable: {0}")]
    Unavailable(String),

    #[error("Unreadable validator response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("Summarizer returned no rules")]
    EmptySummary,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
