use crate::llm::GenerationConfig;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the chapter generation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Transcript acquisition settings
    pub transcript: TranscriptConfig,

    /// Generation backend settings
    pub generation: GenerationConfig,

    /// Credit accounting settings
    pub credits: CreditConfig,

    /// Job lifecycle settings
    pub jobs: JobConfig,

    /// Identity resolution settings
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to bind the API server on
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Language codes scanned in order when picking a caption track
    pub preferred_languages: Vec<String>,

    /// Target language for machine translation of foreign tracks
    pub translation_language: String,

    /// Wall-clock budget for the whole acquisition chain (seconds)
    pub acquire_budget_seconds: u64,

    /// Per-request timeout for caption endpoints (seconds)
    pub request_timeout_seconds: u64,

    /// Optional egress proxy for caption requests
    pub proxy_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditConfig {
    /// Credits granted on first contact with an account
    pub signup_bonus: i64,

    /// Credits charged per successful generation
    pub generation_cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// How long the synchronous route waits before returning a job id (seconds)
    pub sync_wait_seconds: u64,

    /// Terminal job records older than this are evicted (seconds)
    pub retention_seconds: u64,

    /// Interval between eviction sweeps (seconds)
    pub eviction_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Pre-shared bearer tokens mapped to account ids
    pub tokens: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { port: 8080 },
            transcript: TranscriptConfig {
                preferred_languages: vec!["en".to_string()],
                translation_language: "en".to_string(),
                acquire_budget_seconds: 30,
                request_timeout_seconds: 10,
                proxy_url: None,
            },
            generation: GenerationConfig::default(),
            credits: CreditConfig {
                signup_bonus: 3,
                generation_cost: 1,
            },
            jobs: JobConfig {
                sync_wait_seconds: 25,
                retention_seconds: 3600,
                eviction_interval_seconds: 300,
            },
            auth: AuthConfig {
                tokens: HashMap::new(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "chapterizer.toml",
            "config/chapterizer.toml",
            "/etc/chapterizer/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config.apply_env_overrides();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variable overrides for deploy-time settings
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CHAPTERIZER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(api_key) = std::env::var("CHAPTERIZER_API_KEY") {
            self.generation.api_key = Some(api_key);
        }
        if let Ok(proxy) = std::env::var("CHAPTERIZER_PROXY_URL") {
            self.transcript.proxy_url = Some(proxy);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.transcript.preferred_languages.is_empty() {
            return Err(anyhow!("preferred_languages must not be empty"));
        }
        if self.transcript.acquire_budget_seconds == 0 {
            return Err(anyhow!("acquire_budget_seconds must be greater than 0"));
        }
        if self.generation.model_variants.is_empty() {
            return Err(anyhow!("model_variants must not be empty"));
        }
        if self.generation.api_key.is_none() {
            return Err(anyhow!(
                "generation API key required (set CHAPTERIZER_API_KEY or generation.api_key)"
            ));
        }
        if self.credits.generation_cost <= 0 {
            return Err(anyhow!("generation_cost must be positive"));
        }
        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Chapterizer configuration:\n\
             - Port: {}\n\
             - Preferred languages: {:?}\n\
             - Acquisition budget: {}s\n\
             - Generation provider: {:?} ({} variant(s))\n\
             - Signup bonus: {} credit(s), cost per generation: {}",
            self.server.port,
            self.transcript.preferred_languages,
            self.transcript.acquire_budget_seconds,
            self.generation.provider,
            self.generation.model_variants.len(),
            self.credits.signup_bonus,
            self.credits.generation_cost,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_shape() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.credits.generation_cost, 1);
        assert!(!config.generation.model_variants.is_empty());
    }

    #[test]
    fn test_validation_requires_api_key() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generation.api_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut config = Config::default();
        config
            .auth
            .tokens
            .insert("tok".to_string(), "acct".to_string());

        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.auth.tokens.get("tok").map(String::as_str), Some("acct"));
    }
}
