use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Too many requests: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("AI service error: {0}")]
    AiServiceError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] anyhow::Error),
}

/// JSON body of every error response: `{error, details?, stack?}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub expose_details: bool,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
            expose_details: false,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    /// Allow `details` on server errors and the `stack` chain; off in production
    pub fn exposing_details(mut self, expose: bool) -> Self {
        self.expose_details = expose;
        self
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::AiServiceError(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail_message(&self) -> String {
        match self {
            ApiError::ValidationError(msg)
            | ApiError::NotFound(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::AiServiceError(msg) => msg.clone(),
            ApiError::RateLimited { retry_after_secs } => {
                format!("Rate limit exceeded. Try again in {} seconds.", retry_after_secs)
            }
            ApiError::StorageError(err) => err.to_string(),
        }
    }

    /// Source chain of the error, outermost first
    fn stack(&self) -> Vec<String> {
        match self {
            ApiError::StorageError(err) => err.chain().map(|cause| cause.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }

    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(self, context: ErrorContext) -> Response {
        let status = self.status_code();

        let headline = match &self {
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Validation error"
                );
                "Validation failed".to_string()
            }
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                format!("{} not found", context.resource_type)
            }
            ApiError::PayloadTooLarge(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "Payload too large"
                );
                "Payload too large".to_string()
            }
            ApiError::RateLimited { .. } => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "Rate limit exceeded"
                );
                "Too many requests".to_string()
            }
            ApiError::AiServiceError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "AI service error"
                );
                "AI service temporarily unavailable. Please try again.".to_string()
            }
            ApiError::StorageError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Storage error"
                );
                "Storage operation failed. Please try again.".to_string()
            }
        };

        let is_server_error = status.is_server_error();
        let body = ErrorBody {
            error: headline,
            // Client errors always explain themselves; server errors only outside production
            details: (!is_server_error || context.expose_details).then(|| self.detail_message()),
            stack: (is_server_error && context.expose_details).then(|| self.stack()),
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

/// Conversion without request context never exposes server-side details
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.to_response_with_context(ErrorContext::new("unknown", "resource"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> ErrorBody {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("save", "analysis")
            .with_id("123")
            .exposing_details(true);

        assert_eq!(context.operation, "save");
        assert_eq!(context.resource_type, "analysis");
        assert_eq!(context.resource_id, Some("123".to_string()));
        assert!(context.expose_details);
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(ApiError::ValidationError("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::PayloadTooLarge("x".into()).status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            ApiError::RateLimited { retry_after_secs: 3 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::AiServiceError("x".into()).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::StorageError(anyhow::anyhow!("disk")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_errors_keep_details_without_stack() {
        let response = ApiError::ValidationError("text is required".into())
            .to_response_with_context(ErrorContext::new("analyze", "document"));

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert_eq!(body.error, "Validation failed");
        assert_eq!(body.details.as_deref(), Some("text is required"));
        assert!(body.stack.is_none());
    }

    #[tokio::test]
    async fn test_server_errors_masked_unless_exposed() {
        let masked = ApiError::StorageError(anyhow::anyhow!("disk full").context("insert failed"))
            .to_response_with_context(ErrorContext::new("save", "analysis"));
        let body = body_of(masked).await;
        assert_eq!(body.error, "Storage operation failed. Please try again.");
        assert!(body.details.is_none());
        assert!(body.stack.is_none());

        let exposed = ApiError::StorageError(anyhow::anyhow!("disk full").context("insert failed"))
            .to_response_with_context(ErrorContext::new("save", "analysis").exposing_details(true));
        let body = body_of(exposed).await;
        assert_eq!(body.details.as_deref(), Some("insert failed"));
        assert_eq!(body.stack, Some(vec!["insert failed".to_string(), "disk full".to_string()]));
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
