use legalitea::LLMProviderType;
use legalitea::config::{Config, Environment, StorageBackend};
use std::env;
use std::sync::Mutex;

// Environment variables are process-wide; serialize the tests that touch them
static ENV_LOCK: Mutex<()> = Mutex::new(());

const MANAGED_VARS: &[&str] = &[
    "PORT",
    "APP_ENV",
    "MAX_DOCUMENT_CHARS",
    "LLM_PROVIDER",
    "LLM_API_KEY",
    "GEMINI_API_KEY",
    "LLM_MODEL",
    "AI_FALLBACK_ENABLED",
    "RETRY_MAX_ATTEMPTS",
    "RATE_LIMIT_MAX_REQUESTS",
    "STORAGE_BACKEND",
    "DATABASE_URL",
    "SAVE_RETENTION_HOURS",
    "TRUST_PROXY",
];

fn with_env<F: FnOnce()>(vars: &[(&str, &str)], test: F) {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    // SAFETY: all environment mutation in this test binary happens under ENV_LOCK
    unsafe {
        for key in MANAGED_VARS {
            env::remove_var(key);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    test();

    unsafe {
        for key in MANAGED_VARS {
            env::remove_var(key);
        }
    }
}

#[test]
fn test_defaults_without_environment() {
    with_env(&[], || {
        let config = Config::from_env().unwrap();

        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.server.max_document_chars, 50_000);
        assert_eq!(config.llm.provider, LLMProviderType::Gemini);
        assert!(config.llm.fallback_enabled);
        assert!(!config.llm.is_api_key_configured());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.retention_hours, 24);
        assert!(!config.server.trust_proxy);
        assert!(config.validate().is_ok());
    });
}

#[test]
fn test_environment_overrides() {
    with_env(
        &[
            ("PORT", "8080"),
            ("APP_ENV", "production"),
            ("LLM_PROVIDER", "openai"),
            ("LLM_MODEL", "gpt-4o"),
            ("AI_FALLBACK_ENABLED", "false"),
            ("RATE_LIMIT_MAX_REQUESTS", "20"),
            ("STORAGE_BACKEND", "sqlite"),
            ("DATABASE_URL", "sqlite:/var/lib/legalitea/saved.db"),
            ("SAVE_RETENTION_HOURS", "48"),
            ("TRUST_PROXY", "true"),
        ],
        || {
            let config = Config::from_env().unwrap();

            assert_eq!(config.server.port, 8080);
            assert!(!config.expose_error_details());
            assert_eq!(config.llm.provider, LLMProviderType::OpenAI);
            assert_eq!(config.llm.model.as_deref(), Some("gpt-4o"));
            assert!(!config.llm.fallback_enabled);
            assert_eq!(config.rate_limit.max_requests, 20);
            assert_eq!(config.storage.backend, StorageBackend::Sqlite);
            assert_eq!(config.storage.retention_hours, 48);
            assert!(config.server.trust_proxy);
            assert!(config.validate().is_ok());
        },
    );
}

#[test]
fn test_gemini_api_key_alias() {
    with_env(&[("GEMINI_API_KEY", "AIzaSyExampleKey1234")], || {
        let config = Config::from_env().unwrap();
        assert_eq!(config.llm.api_key, "AIzaSyExampleKey1234");
        assert!(config.llm.is_api_key_configured());
    });

    with_env(&[("GEMINI_API_KEY", "gemini-key"), ("LLM_API_KEY", "primary-key")], || {
        let config = Config::from_env().unwrap();
        assert_eq!(config.llm.api_key, "primary-key");
    });
}

#[test]
fn test_invalid_values_are_rejected() {
    with_env(&[("PORT", "not-a-port")], || {
        assert!(Config::from_env().is_err());
    });

    with_env(&[("STORAGE_BACKEND", "postgres")], || {
        assert!(Config::from_env().is_err());
    });

    with_env(&[("RETRY_MAX_ATTEMPTS", "0")], || {
        let config = Config::from_env().unwrap();
        assert!(config.validate().is_err());
    });

    with_env(&[("SAVE_RETENTION_HOURS", "9223372036854775807")], || {
        let config = Config::from_env().unwrap();
        assert!(config.validate().is_err());
    });

    with_env(&[("MAX_DOCUMENT_CHARS", "lots")], || {
        assert!(Config::from_env().is_err());
    });
}
