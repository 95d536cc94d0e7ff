use anyhow::{Result, anyhow};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::llm_providers::LLMProviderType;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Documents must be strictly shorter than this many characters
pub const DEFAULT_MAX_DOCUMENT_CHARS: usize = 50_000;
/// One year
pub const MAX_RETENTION_HOURS: i64 = 24 * 365;

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" | "testing" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub environment: Environment,
    pub body_limit_bytes: usize,
    pub max_document_chars: usize,
    /// Key the API rate limiter on the first `X-Forwarded-For` hop instead of the peer address
    pub trust_proxy: bool,
}

/// Large Language Model service configuration
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: LLMProviderType,
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub fallback_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub cleanup_interval_secs: u64,
    pub save_max_requests: u32,
    pub save_window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Saved-analysis persistence configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    pub retention_hours: i64,
    pub purge_interval_secs: u64,
}

/// Logging system configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            host: "0.0.0.0".to_string(),
            environment: Environment::Development,
            body_limit_bytes: 10 * 1024 * 1024,
            max_document_chars: DEFAULT_MAX_DOCUMENT_CHARS,
            trust_proxy: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            provider: LLMProviderType::Gemini,
            model: None,
            timeout_secs: 60,
            fallback_enabled: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 15 * 60,
            cleanup_interval_secs: 60,
            save_max_requests: 5,
            save_window_secs: 60 * 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: "sqlite:legalitea.db".to_string(),
            retention_hours: 24,
            purge_interval_secs: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,legalitea=debug".to_string(),
            file_enabled: true,
            console_enabled: true,
            log_directory: "logs".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        let config = Config {
            server: ServerConfig::from_env()?,
            llm: LLMConfig::from_env()?,
            retry: RetryConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            logging: LoggingConfig::from_env(),
        };

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    pub fn log_configuration_summary(&self) {
        log_system_event!(config, "Configuration loaded successfully");
        info!(
            environment = self.server.environment.as_str(),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            llm_provider = ?self.llm.provider,
            llm_model = ?self.llm.model,
            llm_api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            fallback_enabled = self.llm.fallback_enabled,
            storage_backend = ?self.storage.backend,
            database_url_masked = %mask_sensitive_data(&self.storage.database_url),
            rate_limit = %format!("{}/{}s", self.rate_limit.max_requests, self.rate_limit.window_secs),
            trust_proxy = self.server.trust_proxy,
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.server.max_document_chars == 0 {
            return Err(anyhow!("MAX_DOCUMENT_CHARS must be greater than 0"));
        }

        if self.server.body_limit_bytes < 1024 {
            return Err(anyhow!("BODY_LIMIT_BYTES must be at least 1024"));
        }

        if self.retry.max_attempts == 0 {
            return Err(anyhow!("RETRY_MAX_ATTEMPTS must be at least 1"));
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(anyhow!("Rate limit max requests and window must be greater than 0"));
        }

        if self.rate_limit.save_max_requests == 0 || self.rate_limit.save_window_secs == 0 {
            return Err(anyhow!("Save rate limit max requests and window must be greater than 0"));
        }

        if !(1..=MAX_RETENTION_HOURS).contains(&self.storage.retention_hours) {
            return Err(anyhow!("SAVE_RETENTION_HOURS must be between 1 and {}", MAX_RETENTION_HOURS));
        }

        if self.storage.backend == StorageBackend::Sqlite && !self.storage.database_url.starts_with("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:' when STORAGE_BACKEND=sqlite"));
        }

        if !self.llm.is_api_key_configured() {
            warn!("LLM API key appears to be placeholder or empty - responses will use fallback data");
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }

    /// Whether error responses may carry details and source chains
    pub fn expose_error_details(&self) -> bool {
        self.server.environment != Environment::Production
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let defaults = ServerConfig::default();

        let port_str = env::var("PORT").unwrap_or_else(|_| defaults.port.to_string());
        let port = port_str
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = env::var("HOST").unwrap_or(defaults.host);

        let environment = env::var("APP_ENV")
            .map(|value| Environment::parse(&value))
            .unwrap_or(defaults.environment);

        Ok(ServerConfig {
            port,
            host,
            environment,
            body_limit_bytes: parse_env("BODY_LIMIT_BYTES", defaults.body_limit_bytes)?,
            max_document_chars: parse_env("MAX_DOCUMENT_CHARS", defaults.max_document_chars)?,
            trust_proxy: parse_env("TRUST_PROXY", defaults.trust_proxy)?,
        })
    }
}

impl LLMConfig {
    fn from_env() -> Result<Self> {
        let defaults = LLMConfig::default();

        let api_key = env::var("LLM_API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .unwrap_or_default();

        let provider = env::var("LLM_PROVIDER")
            .map(|value| LLMProviderType::parse(&value))
            .unwrap_or(defaults.provider);

        Ok(LLMConfig {
            api_key,
            base_url: env::var("LLM_BASE_URL").ok(),
            provider,
            model: env::var("LLM_MODEL").ok(),
            timeout_secs: parse_env("LLM_TIMEOUT_SECS", defaults.timeout_secs)?,
            fallback_enabled: parse_env("AI_FALLBACK_ENABLED", defaults.fallback_enabled)?,
        })
    }

    pub fn is_api_key_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && self.api_key != "your-api-key"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    fn from_env() -> Result<Self> {
        let defaults = RetryConfig::default();
        Ok(RetryConfig {
            max_attempts: parse_env("RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            initial_delay_ms: parse_env("RETRY_INITIAL_DELAY_MS", defaults.initial_delay_ms)?,
            max_delay_ms: parse_env("RETRY_MAX_DELAY_MS", defaults.max_delay_ms)?,
        })
    }
}

impl RateLimitConfig {
    fn from_env() -> Result<Self> {
        let defaults = RateLimitConfig::default();
        Ok(RateLimitConfig {
            max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests)?,
            window_secs: parse_env("RATE_LIMIT_WINDOW_SECS", defaults.window_secs)?,
            cleanup_interval_secs: parse_env("RATE_LIMIT_CLEANUP_SECS", defaults.cleanup_interval_secs)?,
            save_max_requests: parse_env("SAVE_RATE_LIMIT_MAX", defaults.save_max_requests)?,
            save_window_secs: parse_env("SAVE_RATE_LIMIT_WINDOW_SECS", defaults.save_window_secs)?,
        })
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self> {
        let defaults = StorageConfig::default();

        let backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => match value.to_lowercase().as_str() {
                "memory" | "mock" => StorageBackend::Memory,
                "sqlite" | "database" | "db" => StorageBackend::Sqlite,
                other => return Err(anyhow!("Invalid STORAGE_BACKEND value: '{}'. Use 'memory' or 'sqlite'", other)),
            },
            Err(_) => defaults.backend,
        };

        Ok(StorageConfig {
            backend,
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            retention_hours: parse_env("SAVE_RETENTION_HOURS", defaults.retention_hours)?,
            purge_interval_secs: parse_env("SAVE_PURGE_INTERVAL_SECS", defaults.purge_interval_secs)?,
        })
    }
}

impl LoggingConfig {
    fn from_env() -> Self {
        let defaults = LoggingConfig::default();

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .ok()
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(defaults.file_enabled);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .ok()
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(defaults.console_enabled);

        LoggingConfig {
            level: env::var("RUST_LOG").unwrap_or(defaults.level),
            file_enabled,
            console_enabled,
            log_directory: env::var("LOG_DIRECTORY").unwrap_or(defaults.log_directory),
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive data in configuration for safe logging
pub fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
