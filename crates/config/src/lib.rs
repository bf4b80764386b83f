//! Configuration loading, validation, and management for designloop.
//!
//! Loads configuration from `~/.designloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use designloop_core::agent::RunConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.designloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the reasoning service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Vision-capable model used for every reasoning call
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reasoning response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Run defaults
    #[serde(default)]
    pub run: RunDefaults,

    /// Pattern memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Image editing settings
    #[serde(default)]
    pub execution: ExecutionConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.4
}
fn default_max_tokens() -> u32 {
    1024
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("run", &self.run)
            .field("memory", &self.memory)
            .field("execution", &self.execution)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefaults {
    #[serde(default)]
    pub test_mode: bool,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,

    /// Spending ceiling per run, USD
    #[serde(default = "default_max_cost")]
    pub max_cost: f64,

    #[serde(default)]
    pub style_keywords: Vec<String>,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_iteration_delay_ms() -> u64 {
    2000
}
fn default_max_cost() -> f64 {
    1.0
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            test_mode: false,
            max_iterations: default_max_iterations(),
            iteration_delay_ms: default_iteration_delay_ms(),
            max_cost: default_max_cost(),
            style_keywords: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Max patterns per collection
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Weight kept by the old score on repeat observations
    #[serde(default = "default_decay")]
    pub decay: f64,

    /// Consolidate every N iterations
    #[serde(default = "default_summarize_interval")]
    pub summarize_interval: u32,

    /// Score given to consolidated rules
    #[serde(default = "default_consolidated_score")]
    pub consolidated_score: f64,

    /// Only patterns scoring above this reach the decision prompt
    #[serde(default = "default_recall_min_score")]
    pub recall_min_score: f64,

    /// Patterns per collection in the decision prompt
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
}

fn default_capacity() -> usize {
    15
}
fn default_decay() -> f64 {
    0.7
}
fn default_summarize_interval() -> u32 {
    5
}
fn default_consolidated_score() -> f64 {
    0.95
}
fn default_recall_min_score() -> f64 {
    0.4
}
fn default_recall_limit() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            decay: default_decay(),
            summarize_interval: default_summarize_interval(),
            consolidated_score: default_consolidated_score(),
            recall_min_score: default_recall_min_score(),
            recall_limit: default_recall_limit(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Cost reserved per edit, USD
    #[serde(default = "default_unit_cost")]
    pub unit_cost: f64,

    /// Stand-in latency for simulated edits in test mode
    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,

    /// HTTP image editing endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_api_key: Option<String>,
}

fn default_unit_cost() -> f64 {
    0.04
}
fn default_simulated_delay_ms() -> u64 {
    1000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            unit_cost: default_unit_cost(),
            simulated_delay_ms: default_simulated_delay_ms(),
            editor_url: None,
            editor_api_key: None,
        }
    }
}

impl std::fmt::Debug for ExecutionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionConfig")
            .field("unit_cost", &self.unit_cost)
            .field("simulated_delay_ms", &self.simulated_delay_ms)
            .field("editor_url", &self.editor_url)
            .field("editor_api_key", &redact(&self.editor_api_key))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.designloop/config.toml).
    ///
    /// Environment variables override the file:
    /// - `DESIGNLOOP_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `DESIGNLOOP_API_URL`, `DESIGNLOOP_MODEL`, `DESIGNLOOP_EDITOR_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("DESIGNLOOP_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = var("DESIGNLOOP_API_URL") {
            self.api_url = url;
        }
        if let Some(model) = var("DESIGNLOOP_MODEL") {
            self.model = model;
        }
        if let Some(url) = var("DESIGNLOOP_EDITOR_URL") {
            self.execution.editor_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".designloop")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..1.0).contains(&self.memory.decay) {
            return Err(ConfigError::ValidationError(
                "memory.decay must be in [0.0, 1.0)".into(),
            ));
        }

        if self.memory.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "memory.capacity must be > 0".into(),
            ));
        }

        if self.memory.summarize_interval == 0 {
            return Err(ConfigError::ValidationError(
                "memory.summarize_interval must be > 0".into(),
            ));
        }

        if self.run.max_cost < 0.0 || self.execution.unit_cost < 0.0 {
            return Err(ConfigError::ValidationError(
                "costs must not be negative".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the immutable parameters for one run toward `design_goal`.
    pub fn run_config(&self, design_goal: impl Into<String>) -> RunConfig {
        RunConfig {
            test_mode: self.run.test_mode,
            max_iterations: self.run.max_iterations,
            iteration_delay_ms: self.run.iteration_delay_ms,
            max_cost: self.run.max_cost,
            design_goal: design_goal.into(),
            style_keywords: self.run.style_keywords.clone(),
        }
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            run: RunDefaults::default(),
            memory: MemoryConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
