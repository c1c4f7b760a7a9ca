//! Configuration module

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Gemini API key (required)
    pub gemini_api_key: String,

    /// Generation model name
    pub ai_model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Supabase project URL (required)
    pub supabase_url: String,

    /// Supabase service key (required)
    pub supabase_key: String,

    /// Discord-compatible alert webhook; alerting is disabled when unset
    pub discord_webhook_url: Option<String>,

    /// Verdict cache bound
    pub verdict_cache_capacity: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Model and store credentials are mandatory: a service without them
    /// cannot classify or persist anything, so startup fails with a clear
    /// diagnostic instead of limping along.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(4000),

            gemini_api_key: require("GEMINI_API_KEY")?,

            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "gemini-2.5-pro".to_string()),

            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-004".to_string()),

            supabase_url: require("SUPABASE_URL")?,

            supabase_key: require("SUPABASE_KEY")?,

            discord_webhook_url: env::var("DISCORD_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            verdict_cache_capacity: env::var("VERDICT_CACHE_CAPACITY")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(1000),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}
