use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::config::LLMConfig;
use crate::llm_providers::{JsonResponseParser, LLMProvider, LLMProviderFactory, LLMProviderType};
use crate::models::{
    AnalyzeRequest, ExplainTermRequest, QuizRequest, ResponseMetadata, ResponseSchema, ScenariosRequest,
};
use crate::retry::Retryable;

// Import logging macros
use crate::{log_llm_operation, log_service_error, log_service_start, log_service_success, log_service_warn};

pub const DEFAULT_SCENARIO_COUNT: u8 = 3;
pub const DEFAULT_QUIZ_QUESTIONS: u8 = 5;

/// Why a single AI call did not produce a usable object
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI provider API key is not configured")]
    NotConfigured,

    #[error("AI provider request failed: {0}")]
    Provider(anyhow::Error),

    #[error("AI response was not valid JSON: {0}")]
    InvalidJson(String),

    #[error("AI {schema} response is missing required fields: {missing}")]
    MissingFields { schema: &'static str, missing: String },
}

impl Retryable for AiError {
    fn is_retryable(&self) -> bool {
        !matches!(self, AiError::NotConfigured)
    }
}

/// Builds prompts, calls the configured provider once, and returns the parsed object
#[derive(Debug, Clone)]
pub struct AiService {
    provider: LLMProvider,
    json_parser: JsonResponseParser,
    configured: bool,
}

impl AiService {
    pub fn new_with_provider(
        api_key: String,
        base_url: Option<String>,
        provider_type: LLMProviderType,
        model: Option<String>,
        timeout: Duration,
    ) -> Self {
        let configured = !api_key.trim().is_empty() && api_key != "your-api-key";
        let provider = LLMProviderFactory::create_provider(provider_type, api_key, base_url, model, timeout);

        Self {
            provider,
            json_parser: JsonResponseParser,
            configured,
        }
    }

    pub fn from_config(config: &LLMConfig) -> Self {
        Self::new_with_provider(
            config.api_key.clone(),
            config.base_url.clone(),
            config.provider,
            config.model.clone(),
            config.timeout(),
        )
    }

    /// Get the provider name for logging and health reporting
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Get the model name being used
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub async fn analyze_document(&self, request: &AnalyzeRequest) -> Result<Value, AiError> {
        log_service_start!("ai_service", "analyze_document", chars = request.text.chars().count());

        let prompt = format!(
            r#"Analyze the following {document_type} for a non-lawyer. Write every text value in {language}.

Document:
"""
{text}
"""

Respond with a single JSON object in this exact format:
{{
    "summary": {{
        "title": "Short descriptive title",
        "overview": "Plain-language summary in 3-5 sentences",
        "keyPoints": ["Most important point", "..."]
    }},
    "keyInformation": {{
        "parties": ["Who is involved and their role"],
        "dates": ["Important dates and deadlines"],
        "financialTerms": ["Amounts, fees, penalties"],
        "obligations": ["What each party must do"]
    }},
    "riskAssessment": {{
        "overallRisk": "low|medium|high",
        "score": 0-100,
        "risks": [
            {{
                "level": "low|medium|high",
                "title": "Risk title",
                "description": "Why this clause is risky",
                "clause": "Quoted or paraphrased clause",
                "recommendation": "What the reader should do"
            }}
        ]
    }},
    "actionPlan": {{
        "immediate": ["Steps to take now"],
        "beforeSigning": ["Steps before signing or agreeing"],
        "consultLawyer": "When professional advice is needed"
    }},
    "glossary": [{{ "term": "Legal term", "definition": "Plain explanation" }}],
    "advancedInsights": {{
        "unusualClauses": ["Clauses that differ from typical documents of this type"],
        "missingProtections": ["Protections a reader would normally expect"],
        "negotiationPoints": ["Terms worth negotiating"]
    }}
}}

Guidelines:
- Use simple language a teenager could follow
- Flag anything one-sided, unusual or time-sensitive
- Do not invent facts that are not in the document
- Return JSON only, without markdown"#,
            document_type = request.document_type.label(),
            language = request.language.display_name(),
            text = request.text,
        );

        let system_message = "You are a legal assistant who explains legal documents in plain language. You are not giving legal advice. Always respond with valid JSON in the requested format.";
        self.request_structured("analyze_document", ResponseSchema::Analysis, system_message, &prompt)
            .await
    }

    pub async fn explain_term(&self, request: &ExplainTermRequest) -> Result<Value, AiError> {
        log_service_start!("ai_service", "explain_term");

        let context_section = match request.context.as_deref().map(str::trim) {
            Some(context) if !context.is_empty() => format!("\nThe term appears in this context:\n\"\"\"\n{}\n\"\"\"\n", context),
            _ => String::new(),
        };

        let prompt = format!(
            r#"Explain the legal term "{term}" in {language} for someone with no legal background.
{context_section}
Respond with a JSON object in this exact format:
{{
    "term": "{term}",
    "explanation": "Plain-language explanation in 2-4 sentences",
    "example": "A short real-world example",
    "relatedTerms": ["Related term", "..."]
}}"#,
            term = request.term.trim(),
            language = request.language.display_name(),
            context_section = context_section,
        );

        let system_message = "You are a patient legal educator. Always respond with valid JSON in the requested format.";
        self.request_structured("explain_term", ResponseSchema::TermExplanation, system_message, &prompt)
            .await
    }

    pub async fn generate_scenarios(&self, request: &ScenariosRequest) -> Result<Value, AiError> {
        log_service_start!("ai_service", "generate_scenarios", chars = request.text.chars().count());
        let count = request.count.unwrap_or(DEFAULT_SCENARIO_COUNT);

        let prompt = format!(
            r#"Based on the following {document_type}, describe {count} realistic "what if" scenarios the reader could face. Write every text value in {language}.

Document:
"""
{text}
"""

Respond with a JSON object in this exact format:
{{
    "scenarios": [
        {{
            "title": "What if ...",
            "situation": "Description of the situation",
            "outcome": "What the document says happens",
            "likelihood": "low|medium|high",
            "recommendation": "What the reader should do"
        }}
    ]
}}"#,
            document_type = request.document_type.label(),
            count = count,
            language = request.language.display_name(),
            text = request.text,
        );

        let system_message = "You are a legal assistant who helps people understand the practical consequences of documents. Always respond with valid JSON in the requested format.";
        self.request_structured("generate_scenarios", ResponseSchema::Scenarios, system_message, &prompt)
            .await
    }

    pub async fn generate_quiz(&self, request: &QuizRequest) -> Result<Value, AiError> {
        log_service_start!("ai_service", "generate_quiz", chars = request.text.chars().count());
        let question_count = request.question_count.unwrap_or(DEFAULT_QUIZ_QUESTIONS);

        let prompt = format!(
            r#"Create {count} {difficulty} multiple-choice questions that check whether the reader understood the following document. Write every text value in {language}.

Document:
"""
{text}
"""

Respond with a JSON object in this exact format:
{{
    "questions": [
        {{
            "question": "Question text",
            "options": ["Option 1", "Option 2", "Option 3", "Option 4"],
            "correctAnswer": 0,
            "explanation": "Why the answer is correct"
        }}
    ]
}}

Guidelines:
- correctAnswer is the zero-based index of the correct option
- Provide option texts without letter prefixes
- Focus on obligations, deadlines, costs and risks"#,
            count = question_count,
            difficulty = request.difficulty.as_str(),
            language = request.language.display_name(),
            text = request.text,
        );

        let system_message = "You are a legal educator writing comprehension quizzes. Always respond with valid JSON in the requested format.";
        self.request_structured("generate_quiz", ResponseSchema::Quiz, system_message, &prompt)
            .await
    }

    /// One provider call: request, strip formatting, parse, and check required keys
    async fn request_structured(
        &self,
        operation: &str,
        schema: ResponseSchema,
        system_message: &str,
        prompt: &str,
    ) -> Result<Value, AiError> {
        if !self.configured {
            log_service_warn!("ai_service", operation, "provider API key not configured");
            return Err(AiError::NotConfigured);
        }

        let start = Instant::now();
        log_llm_operation!(start, operation, provider = self.provider_name(), prompt_chars = prompt.len());

        let response_text = self
            .provider
            .make_request(Some(system_message), prompt)
            .await
            .map_err(|e| {
                log_service_error!("ai_service", operation, error = e);
                AiError::Provider(e)
            })?;

        debug!(
            operation,
            response_length = response_text.len(),
            "Raw LLM response received"
        );

        let value = self.json_parser.parse_json_value(&response_text).map_err(|e| {
            error!(
                operation,
                error = %e,
                json_content = %JsonResponseParser::extract_json_from_response(&response_text),
                "Failed to parse LLM JSON response"
            );
            AiError::InvalidJson(e.to_string())
        })?;

        let missing = schema.missing_keys(&value);
        if !missing.is_empty() {
            log_llm_operation!(warn, operation, format!("response missing {:?}", missing));
            return Err(AiError::MissingFields {
                schema: schema.name(),
                missing: missing.join(", "),
            });
        }

        log_llm_operation!(
            success,
            operation,
            provider = self.provider_name(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        log_service_success!("ai_service", operation, format!("{} response validated", schema.name()));

        Ok(value)
    }
}

/// Attach response metadata under `metadata`; non-object values are left untouched
pub fn with_metadata(mut value: Value, metadata: &ResponseMetadata) -> Value {
    if let (Some(object), Ok(metadata)) = (value.as_object_mut(), serde_json::to_value(metadata)) {
        object.insert("metadata".to_string(), metadata);
    }
    value
}
