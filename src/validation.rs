use async_trait::async_trait;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

use crate::errors::ApiError;
use crate::models::{AnalyzeRequest, ExplainTermRequest, QuizRequest, ResponseSchema, SaveRequest, ScenariosRequest};

// Import logging macros
use crate::log_validation;

pub const MAX_TERM_CHARS: usize = 200;
pub const MAX_CONTEXT_CHARS: usize = 5_000;
pub const MAX_EMAIL_CHARS: usize = 254;
pub const MAX_DOCUMENT_NAME_CHARS: usize = 255;
pub const SCENARIO_COUNT_RANGE: (u8, u8) = (1, 5);
pub const QUIZ_QUESTION_RANGE: (u8, u8) = (1, 10);

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
        .expect("email regex is valid")
});

/// Per-deployment limits applied to request bodies
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    /// Document text must be strictly shorter than this
    pub max_document_chars: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_document_chars: crate::config::DEFAULT_MAX_DOCUMENT_CHARS,
        }
    }
}

/// Type and length checks run on a request body after it deserializes
pub trait Validate {
    fn validate(&self, limits: &RequestLimits) -> Result<(), ApiError>;
}

fn fail(component: &str, message: String) -> Result<(), ApiError> {
    log_validation!(failure, component, error = message);
    Err(ApiError::ValidationError(message))
}

pub fn validate_document_text(text: &str, limits: &RequestLimits) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return fail("document_text", "text is required and cannot be empty".to_string());
    }

    let char_count = text.chars().count();
    if char_count >= limits.max_document_chars {
        return fail(
            "document_text",
            format!(
                "text must be less than {} characters (received {})",
                limits.max_document_chars, char_count
            ),
        );
    }

    Ok(())
}

fn validate_range(component: &str, field: &str, value: Option<u8>, (min, max): (u8, u8)) -> Result<(), ApiError> {
    match value {
        Some(value) if value < min || value > max => {
            fail(component, format!("{} must be between {} and {}", field, min, max))
        }
        _ => Ok(()),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    email.chars().count() <= MAX_EMAIL_CHARS && EMAIL_REGEX.is_match(email)
}

impl Validate for AnalyzeRequest {
    fn validate(&self, limits: &RequestLimits) -> Result<(), ApiError> {
        validate_document_text(&self.text, limits)?;
        log_validation!(success, "analyze_request", "request validated");
        Ok(())
    }
}

impl Validate for ExplainTermRequest {
    fn validate(&self, _limits: &RequestLimits) -> Result<(), ApiError> {
        let term = self.term.trim();
        if term.is_empty() {
            return fail("explain_term_request", "term is required and cannot be empty".to_string());
        }
        if term.chars().count() > MAX_TERM_CHARS {
            return fail(
                "explain_term_request",
                format!("term must be at most {} characters", MAX_TERM_CHARS),
            );
        }
        if let Some(context) = &self.context {
            if context.chars().count() > MAX_CONTEXT_CHARS {
                return fail(
                    "explain_term_request",
                    format!("context must be at most {} characters", MAX_CONTEXT_CHARS),
                );
            }
        }
        log_validation!(success, "explain_term_request", "request validated");
        Ok(())
    }
}

impl Validate for ScenariosRequest {
    fn validate(&self, limits: &RequestLimits) -> Result<(), ApiError> {
        validate_document_text(&self.text, limits)?;
        validate_range("scenarios_request", "count", self.count, SCENARIO_COUNT_RANGE)?;
        log_validation!(success, "scenarios_request", "request validated");
        Ok(())
    }
}

impl Validate for QuizRequest {
    fn validate(&self, limits: &RequestLimits) -> Result<(), ApiError> {
        validate_document_text(&self.text, limits)?;
        validate_range("quiz_request", "questionCount", self.question_count, QUIZ_QUESTION_RANGE)?;
        log_validation!(success, "quiz_request", "request validated");
        Ok(())
    }
}

impl Validate for SaveRequest {
    fn validate(&self, _limits: &RequestLimits) -> Result<(), ApiError> {
        if !is_valid_email(self.email.trim()) {
            return fail("save_request", "a valid email address is required".to_string());
        }

        if !self.analysis.is_object() {
            return fail("save_request", "analysis must be a JSON object".to_string());
        }

        let missing = ResponseSchema::Analysis.missing_keys(&self.analysis);
        if !missing.is_empty() {
            return fail(
                "save_request",
                format!("analysis is missing required fields: {}", missing.join(", ")),
            );
        }

        if let Some(name) = &self.document_name {
            if name.chars().count() > MAX_DOCUMENT_NAME_CHARS {
                return fail(
                    "save_request",
                    format!("documentName must be at most {} characters", MAX_DOCUMENT_NAME_CHARS),
                );
            }
        }

        log_validation!(success, "save_request", "request validated");
        Ok(())
    }
}

/// JSON body extractor whose rejections use the service's error format.
///
/// Oversized bodies become 413; malformed JSON, wrong content type and type
/// mismatches become 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(rejection_to_error(rejection).into_response()),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("request body exceeds the configured size limit".to_string())
    } else {
        ApiError::ValidationError(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentType, Language, QuizDifficulty};
    use serde_json::json;

    fn analyze(text: &str) -> AnalyzeRequest {
        AnalyzeRequest {
            text: text.to_string(),
            document_type: DocumentType::Contract,
            language: Language::En,
        }
    }

    #[test]
    fn test_document_length_boundary() {
        let limits = RequestLimits::default();

        assert!(analyze(&"a".repeat(49_999)).validate(&limits).is_ok());
        assert!(matches!(
            analyze(&"a".repeat(50_000)).validate(&limits),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let limits = RequestLimits { max_document_chars: 10 };
        // 9 characters, 27 bytes
        assert!(analyze(&"条".repeat(9)).validate(&limits).is_ok());
        assert!(analyze(&"条".repeat(10)).validate(&limits).is_err());
    }

    #[test]
    fn test_blank_text_rejected() {
        assert!(analyze("   \n\t").validate(&RequestLimits::default()).is_err());
    }

    #[test]
    fn test_term_validation() {
        let limits = RequestLimits::default();
        let mut request = ExplainTermRequest {
            term: "consideration".to_string(),
            context: Some("in exchange for good and valuable consideration".to_string()),
            language: Language::En,
        };
        assert!(request.validate(&limits).is_ok());

        request.term = " ".to_string();
        assert!(request.validate(&limits).is_err());

        request.term = "x".repeat(MAX_TERM_CHARS + 1);
        assert!(request.validate(&limits).is_err());

        request.term = "lien".to_string();
        request.context = Some("c".repeat(MAX_CONTEXT_CHARS + 1));
        assert!(request.validate(&limits).is_err());
    }

    #[test]
    fn test_count_ranges() {
        let limits = RequestLimits::default();
        let mut scenarios = ScenariosRequest {
            text: "Tenant pays rent monthly.".to_string(),
            document_type: DocumentType::Lease,
            language: Language::En,
            count: Some(5),
        };
        assert!(scenarios.validate(&limits).is_ok());
        scenarios.count = Some(6);
        assert!(scenarios.validate(&limits).is_err());
        scenarios.count = Some(0);
        assert!(scenarios.validate(&limits).is_err());

        let mut quiz = QuizRequest {
            text: "Employee must give 30 days notice.".to_string(),
            language: Language::En,
            question_count: None,
            difficulty: QuizDifficulty::Easy,
        };
        assert!(quiz.validate(&limits).is_ok());
        quiz.question_count = Some(11);
        assert!(quiz.validate(&limits).is_err());
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co.uk"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("user@-bad.com"));
        assert!(!is_valid_email(&format!("{}@example.com", "a".repeat(250))));
    }

    #[test]
    fn test_save_request_requires_complete_analysis() {
        let limits = RequestLimits::default();
        let mut request = SaveRequest {
            email: "user@example.com".to_string(),
            analysis: json!({
                "summary": "s",
                "keyInformation": {},
                "riskAssessment": {},
                "actionPlan": {}
            }),
            document_name: Some("lease.pdf".to_string()),
        };
        assert!(request.validate(&limits).is_ok());

        request.analysis = json!({ "summary": "only" });
        let err = request.validate(&limits).unwrap_err();
        assert!(err.to_string().contains("keyInformation"));

        request.analysis = json!("not an object");
        assert!(request.validate(&limits).is_err());
    }
}
