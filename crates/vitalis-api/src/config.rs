use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use vitalis_context::ContextLimits;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub llm: LlmConfig,
    pub backend: BackendSection,
    pub rate_limit: RateLimitConfig,
    pub chat: ChatConfig,
    pub context: ContextConfig,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub gateway_api_key: String,
    #[serde(default)]
    pub backend_url: String,
    #[serde(default)]
    pub backend_service_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub origins: Vec<String>,
    pub allowed_headers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub digest_model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    pub max_history_tokens: usize,
    /// Replaces the built-in coach rules when set
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub max_messages: usize,
    pub max_message_chars: usize,
}

/// How many recent rows of each kind go into a user's context
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    pub check_ins: usize,
    pub insights: usize,
    pub forecasts: usize,
}

impl ContextConfig {
    pub fn limits(&self) -> ContextLimits {
        ContextLimits {
            check_ins: self.check_ins,
            insights: self.insights,
            forecasts: self.forecasts,
            ..ContextLimits::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. `VITALIS_<SECTION>__<KEY>` environment variables
    ///
    /// Secrets are read from `GATEWAY_API_KEY`, `BACKEND_URL` and
    /// `BACKEND_SERVICE_KEY`; a missing one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let config = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("VITALIS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Config = config.try_deserialize()?;

        cfg.gateway_api_key = required_env("GATEWAY_API_KEY")?;
        cfg.backend_url = required_env("BACKEND_URL")?;
        cfg.backend_service_key = required_env("BACKEND_SERVICE_KEY")?;

        Ok(cfg)
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Message(format!(
            "{} environment variable is required",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();

        assert_eq!(config.rate_limit.max_requests, 30);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert!(config.cors.origins.contains(&"*".to_string()));
        assert!(config.gateway_api_key.is_empty());
        assert!(config.llm.system_prompt.is_none());
    }

    #[test]
    fn test_context_section_maps_to_limits() {
        let mut config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();
        assert_eq!(config.context.limits().check_ins, 7);
        assert_eq!(config.context.limits().insights, 5);
        assert_eq!(config.context.limits().forecasts, 3);

        config.context.check_ins = 3;
        let limits = config.context.limits();
        assert_eq!(limits.check_ins, 3);
        assert_eq!(limits.metric_days, 7);
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let err = required_env("VITALIS_TEST_SURELY_UNSET_SECRET").unwrap_err();
        assert!(err.to_string().contains("VITALIS_TEST_SURELY_UNSET_SECRET"));
    }
}
