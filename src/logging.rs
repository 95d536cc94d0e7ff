// Macros file - tracing macros are imported within the macro definitions

//! Standardized logging macros for consistent field names and message patterns across the service
//!
//! These macros ensure:
//! - Consistent field naming conventions
//! - Appropriate logging levels for different scenarios
//! - Structured logging with context

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, client = $client:expr) => {
        tracing::debug!(
            operation = $operation,
            client = %$client,
            "API operation started"
        );
    };
    ($operation:expr, analysis_id = $id:expr) => {
        tracing::debug!(
            operation = $operation,
            analysis_id = %$id,
            "API operation started"
        );
    };
    ($operation:expr, chars = $chars:expr) => {
        tracing::debug!(
            operation = $operation,
            character_count = $chars,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(
            operation = $operation,
            "API operation started"
        );
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, analysis_id = $id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            analysis_id = %$id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, source = $source:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            source = ?$source,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            "API operation completed: {}", $msg
        );
    };
}

/// Log API operation errors with consistent structure
#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, analysis_id = $id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            analysis_id = %$id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

/// Log API warnings with context
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, client = $client:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            client = %$client,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, error = $error:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            error = %$error,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            "API operation warning: {}", $msg
        );
    };
}

// ============================================================================
// Service Layer Logging Macros
// ============================================================================

/// Log service operation start with context
#[macro_export]
macro_rules! log_service_start {
    ($service:expr, $operation:expr, chars = $chars:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            character_count = $chars,
            "Service operation started"
        );
    };
    ($service:expr, $operation:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            "Service operation started"
        );
    };
}

/// Log service operation success
#[macro_export]
macro_rules! log_service_success {
    ($service:expr, $operation:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            duration_ms = $duration,
            "Service operation completed successfully"
        );
    };
    ($service:expr, $operation:expr, $msg:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            "Service operation completed: {}", $msg
        );
    };
}

/// Log service operation errors
#[macro_export]
macro_rules! log_service_error {
    ($service:expr, $operation:expr, error = $error:expr) => {
        tracing::error!(
            service = $service,
            operation = $operation,
            error = %$error,
            "Service operation failed"
        );
    };
}

/// Log service warnings
#[macro_export]
macro_rules! log_service_warn {
    ($service:expr, $operation:expr, $msg:expr) => {
        tracing::warn!(
            service = $service,
            operation = $operation,
            "Service warning: {}",
            $msg
        );
    };
}

// ============================================================================
// Storage Operation Logging Macros
// ============================================================================

/// Log storage operation performance and results
#[macro_export]
macro_rules! log_db_operation {
    (debug, $operation:expr, analysis_id = $id:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "storage",
            operation = $operation,
            analysis_id = %$id,
            duration_ms = $duration,
            "Storage operation completed"
        );
    };
    (debug, $operation:expr, count = $count:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "storage",
            operation = $operation,
            result_count = $count,
            duration_ms = $duration,
            "Storage operation completed"
        );
    };
    (info, $operation:expr, $msg:expr) => {
        tracing::info!(
            component = "storage",
            operation = $operation,
            "Storage operation: {}", $msg
        );
    };
    (error, $operation:expr, error = $error:expr) => {
        tracing::error!(
            component = "storage",
            operation = $operation,
            error = %$error,
            "Storage operation failed"
        );
    };
}

// ============================================================================
// AI Service Logging Macros
// ============================================================================

/// Log LLM operations with provider context
#[macro_export]
macro_rules! log_llm_operation {
    (start, $operation:expr, provider = $provider:expr, prompt_chars = $chars:expr) => {
        tracing::info!(
            component = "ai_service",
            operation = $operation,
            provider = %$provider,
            prompt_chars = $chars,
            "LLM operation started"
        );
    };
    (success, $operation:expr, provider = $provider:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = "ai_service",
            operation = $operation,
            provider = %$provider,
            duration_ms = $duration,
            "LLM operation completed successfully"
        );
    };
    (error, $operation:expr, provider = $provider:expr, error = $error:expr, attempt = $attempt:expr) => {
        tracing::error!(
            component = "ai_service",
            operation = $operation,
            provider = %$provider,
            error = %$error,
            attempt = $attempt,
            "LLM operation failed"
        );
    };
    (warn, $operation:expr, $msg:expr) => {
        tracing::warn!(
            component = "ai_service",
            operation = $operation,
            "LLM operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Performance Logging Macros
// ============================================================================

/// Log performance metrics with consistent structure
#[macro_export]
macro_rules! log_performance {
    ($operation:expr, duration_ms = $duration:expr, attempts = $attempts:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            attempts = $attempts,
            "Performance metrics"
        );
    };
    ($operation:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            "Performance metrics"
        );
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}

/// Install the global subscriber: env filter plus optional console and daily-rolling file output.
///
/// The returned guard must be held for the lifetime of the process or buffered
/// file output is lost.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
    });

    let (file_layer, guard) = if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create log directory {}: {}", config.log_directory, e);
        });

        let file_appender = tracing_appender::rolling::daily(&config.log_directory, "legalitea.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

        // No ANSI colors for files
        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking_file);

        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    log_system_event!(
        startup,
        component = "logging",
        format!(
            "logging initialized (console: {}, file: {})",
            config.console_enabled, config.file_enabled
        )
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    #[test]
    fn test_logging_macros_compile() {
        let analysis_id = Uuid::new_v4();
        let error = anyhow::anyhow!("test error");

        // Test that all macro variants compile successfully
        log_api_start!("analyze", client = "127.0.0.1");
        log_api_start!("get_saved", analysis_id = analysis_id);
        log_api_start!("analyze", chars = 1200);
        log_api_start!("health");

        log_api_success!("save", analysis_id = analysis_id, "analysis saved");
        log_api_success!("analyze", source = crate::models::ResultSource::Ai, "analysis produced");
        log_api_success!("health", "health reported");

        log_api_error!("save", analysis_id = analysis_id, error = error, "storage failed");
        log_api_error!("save", error = error, "storage failed");

        log_api_warn!("analyze", client = "10.0.0.1", "rate limited");
        log_api_warn!("analyze", error = error, "using fallback");
        log_api_warn!("analyze", "operation warning");

        log_service_start!("ai_service", "analyze_document", chars = 4000);
        log_service_start!("ai_service", "explain_term");
        log_service_success!("ai_service", "analyze_document", duration_ms = 1500);
        log_service_success!("rate_limiter", "cleanup", "expired windows removed");
        log_service_error!("storage", "save", error = error);
        log_service_warn!("ai_service", "analyze_document", "provider not configured");

        log_db_operation!(debug, "insert_analysis", analysis_id = analysis_id, duration_ms = 3);
        log_db_operation!(debug, "purge_expired", count = 2, duration_ms = 4);
        log_db_operation!(info, "migration", "schema ready");
        log_db_operation!(error, "insert_analysis", error = error);

        log_llm_operation!(start, "analyze_document", provider = "Gemini", prompt_chars = 5000);
        log_llm_operation!(success, "analyze_document", provider = "Gemini", duration_ms = 1500);
        log_llm_operation!(error, "analyze_document", provider = "Gemini", error = error, attempt = 2);
        log_llm_operation!(warn, "analyze_document", "response missing keys");

        log_system_event!(startup, component = "server", "server starting");
        log_system_event!(shutdown, component = "server", "server stopped");
        log_system_event!(config, "configuration loaded successfully");

        log_performance!("analyze", duration_ms = 2500, attempts = 1);
        log_performance!("save", duration_ms = 50);

        log_validation!(success, "analyze_request", "request validated");
        log_validation!(failure, "analyze_request", error = error);
    }
}
