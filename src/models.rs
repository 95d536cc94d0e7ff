use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Languages the analysis can be written in
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    De,
    Hi,
    Pt,
    Zh,
    Ja,
    Ar,
}

impl Language {
    /// English name used inside prompts ("Respond in Spanish")
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Es => "Spanish",
            Language::Fr => "French",
            Language::De => "German",
            Language::Hi => "Hindi",
            Language::Pt => "Portuguese",
            Language::Zh => "Chinese (Simplified)",
            Language::Ja => "Japanese",
            Language::Ar => "Arabic",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Contract,
    #[serde(alias = "rental", alias = "rental_agreement")]
    Lease,
    #[serde(alias = "employment_contract")]
    Employment,
    #[serde(alias = "non_disclosure_agreement")]
    Nda,
    #[serde(alias = "tos")]
    TermsOfService,
    PrivacyPolicy,
    Will,
    PowerOfAttorney,
    #[default]
    #[serde(other)]
    Other,
}

impl DocumentType {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Contract => "contract",
            DocumentType::Lease => "lease or rental agreement",
            DocumentType::Employment => "employment agreement",
            DocumentType::Nda => "non-disclosure agreement",
            DocumentType::TermsOfService => "terms of service",
            DocumentType::PrivacyPolicy => "privacy policy",
            DocumentType::Will => "will",
            DocumentType::PowerOfAttorney => "power of attorney",
            DocumentType::Other => "general legal document",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuizDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl QuizDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizDifficulty::Easy => "easy",
            QuizDifficulty::Medium => "medium",
            QuizDifficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub text: String,
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainTermRequest {
    pub term: String,
    pub context: Option<String>,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenariosRequest {
    pub text: String,
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(default)]
    pub language: Language,
    pub count: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    pub text: String,
    #[serde(default)]
    pub language: Language,
    pub question_count: Option<u8>,
    #[serde(default)]
    pub difficulty: QuizDifficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub email: String,
    pub analysis: Value,
    pub document_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

/// A persisted analysis; reads return nothing once `expires_at` has passed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnalysis {
    pub id: Uuid,
    pub email: String,
    pub document_name: Option<String>,
    pub analysis: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SavedAnalysis {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Where a response body came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Ai,
    Fallback,
}

/// Attached to every generated response under `metadata`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub source: ResultSource,
    pub provider: String,
    pub model: String,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_count: Option<usize>,
    pub processed_at: DateTime<Utc>,
}

impl ResponseMetadata {
    pub fn new(source: ResultSource, provider: &str, model: &str, language: Language) -> Self {
        Self {
            source,
            provider: provider.to_string(),
            model: model.to_string(),
            language,
            document_type: None,
            character_count: None,
            processed_at: Utc::now(),
        }
    }

    pub fn with_document(mut self, document_type: DocumentType, text: &str) -> Self {
        self.document_type = Some(document_type);
        self.character_count = Some(text.chars().count());
        self
    }
}

/// Top-level shape expected back from the model for each endpoint.
///
/// Only a shallow presence check is made: every required key must exist and
/// be non-null. Everything else the model returns is passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSchema {
    Analysis,
    TermExplanation,
    Scenarios,
    Quiz,
}

impl ResponseSchema {
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            ResponseSchema::Analysis => &["summary", "keyInformation", "riskAssessment", "actionPlan"],
            ResponseSchema::TermExplanation => &["term", "explanation", "example"],
            ResponseSchema::Scenarios => &["scenarios"],
            ResponseSchema::Quiz => &["questions"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseSchema::Analysis => "analysis",
            ResponseSchema::TermExplanation => "term_explanation",
            ResponseSchema::Scenarios => "scenarios",
            ResponseSchema::Quiz => "quiz",
        }
    }

    /// Returns the required keys that are absent or null. Non-objects miss everything.
    pub fn missing_keys(&self, value: &Value) -> Vec<&'static str> {
        let Some(object) = value.as_object() else {
            return self.required_keys().to_vec();
        };

        self.required_keys()
            .iter()
            .copied()
            .filter(|key| object.get(*key).is_none_or(Value::is_null))
            .collect()
    }

    pub fn is_satisfied_by(&self, value: &Value) -> bool {
        self.missing_keys(value).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analysis_schema_presence_check() {
        let complete = json!({
            "summary": "s",
            "keyInformation": {},
            "riskAssessment": [],
            "actionPlan": "later",
            "glossary": null
        });
        assert!(ResponseSchema::Analysis.is_satisfied_by(&complete));

        let partial = json!({ "summary": "s", "keyInformation": null, "actionPlan": [] });
        assert_eq!(
            ResponseSchema::Analysis.missing_keys(&partial),
            vec!["keyInformation", "riskAssessment"]
        );

        assert_eq!(ResponseSchema::Quiz.missing_keys(&json!([1, 2])), vec!["questions"]);
    }

    #[test]
    fn test_document_type_parsing() {
        let parsed: DocumentType = serde_json::from_value(json!("rental")).unwrap();
        assert_eq!(parsed, DocumentType::Lease);

        let parsed: DocumentType = serde_json::from_value(json!("terms_of_service")).unwrap();
        assert_eq!(parsed, DocumentType::TermsOfService);

        let parsed: DocumentType = serde_json::from_value(json!("mortgage deed")).unwrap();
        assert_eq!(parsed, DocumentType::Other);
    }

    #[test]
    fn test_analyze_request_defaults() {
        let request: AnalyzeRequest = serde_json::from_value(json!({ "text": "Hello" })).unwrap();
        assert_eq!(request.language, Language::En);
        assert_eq!(request.document_type, DocumentType::Other);

        let request: AnalyzeRequest = serde_json::from_value(json!({
            "text": "Hola",
            "documentType": "lease",
            "language": "es"
        }))
        .unwrap();
        assert_eq!(request.language.display_name(), "Spanish");
        assert_eq!(request.document_type.label(), "lease or rental agreement");
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let result = serde_json::from_value::<AnalyzeRequest>(json!({ "text": "x", "language": "klingon" }));
        assert!(result.is_err());
    }
}
