pub mod ai_service;
pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod fallback;
pub mod llm_providers;
pub mod logging;
pub mod models;
pub mod rate_limiter;
pub mod retry;
pub mod storage;
pub mod validation;

pub use ai_service::{AiError, AiService};
pub use api::{AppState, create_router};
pub use config::Config;
pub use database::Database;
pub use errors::*;
pub use llm_providers::{JsonResponseParser, LLMProvider, LLMProviderFactory, LLMProviderType};
pub use models::*;
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use retry::{RetryPolicy, Retryable, retry_with_backoff};
pub use storage::AnalysisStore;
