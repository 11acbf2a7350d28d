//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Completion provider configuration
    pub llm: LlmConfig,

    /// Credit ledger configuration
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Chat service configuration
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Provider API key
    pub api_key: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Snapshot path for the credit ledger. In-memory only when unset.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// System prompt prepended to every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { storage_path: None }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            log_level: default_log_level(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_system_prompt() -> String {
    "You are a software architecture assistant for a project management dashboard. \
     Help the user design, scope and break down their projects. Be concise and concrete."
        .into()
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    // Keep strings as strings: api keys and model names
                    // must never be coerced into numbers.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
