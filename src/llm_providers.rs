use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

/// Common message structure for chat-style LLM requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: String,
    pub content: String,
}

/// Enum-based LLM provider implementation
#[derive(Debug, Clone)]
pub enum LLMProvider {
    OpenAI(OpenAIProvider),
    Gemini(GeminiProvider),
}

impl LLMProvider {
    /// Make a request to the LLM provider with optional system message
    pub async fn make_request(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        match self {
            LLMProvider::OpenAI(provider) => provider.make_request(system_message, prompt).await,
            LLMProvider::Gemini(provider) => provider.make_request(system_message, prompt).await,
        }
    }

    /// Get the provider name for logging
    pub fn provider_name(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI(provider) => provider.provider_name(),
            LLMProvider::Gemini(provider) => provider.provider_name(),
        }
    }

    /// Get the model name being used
    pub fn model_name(&self) -> &str {
        match self {
            LLMProvider::OpenAI(provider) => provider.model_name(),
            LLMProvider::Gemini(provider) => provider.model_name(),
        }
    }
}

/// reqwest errors echo the request URL, which must never reach logs or response bodies
fn transport_error(err: reqwest::Error) -> anyhow::Error {
    anyhow::Error::new(err.without_url())
}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// OpenAI-compatible chat completions provider
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<LLMMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIChoice {
    message: LLMMessage,
}

impl OpenAIProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }

    pub async fn make_request(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            messages.push(LLMMessage {
                role: "system".to_string(),
                content: sys_msg.to_string(),
            });
        }

        messages.push(LLMMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.3,
        };

        info!(
            provider = self.provider_name(),
            model = %self.model,
            base_url = %self.base_url,
            prompt_length = prompt.len(),
            "Making LLM request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                provider = self.provider_name(),
                status = %status,
                error = %error_text,
                "LLM API request failed"
            );
            return Err(anyhow!("OpenAI API request failed with status {}: {}", status, error_text));
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(transport_error)?;

        let response_content = openai_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI response"))?;

        info!(
            provider = self.provider_name(),
            response_length = response_content.len(),
            "Successfully received LLM response"
        );

        Ok(response_content)
    }

    pub fn provider_name(&self) -> &'static str {
        "OpenAI"
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

/// Google Gemini `generateContent` provider
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: i32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: model.unwrap_or_else(|| "gemini-1.5-flash".to_string()),
        }
    }

    pub async fn make_request(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: system_message.map(|sys_msg| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: sys_msg.to_string(),
                }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: 0.3,
                top_k: 40,
                top_p: 0.9,
                max_output_tokens: 8192,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        info!(
            provider = self.provider_name(),
            model = %self.model,
            base_url = %self.base_url,
            prompt_length = prompt.len(),
            "Making LLM request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&request_body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                provider = self.provider_name(),
                status = %status,
                error = %error_text,
                "LLM API request failed"
            );
            return Err(anyhow!("Gemini API request failed with status {}: {}", status, error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(transport_error)?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No candidates in Gemini response"))?;

        if candidate.content.parts.is_empty() {
            return Err(anyhow!("No parts in Gemini response"));
        }

        let response_content: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        info!(
            provider = self.provider_name(),
            response_length = response_content.len(),
            "Successfully received LLM response"
        );

        Ok(response_content)
    }

    pub fn provider_name(&self) -> &'static str {
        "Gemini"
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

/// Pulls the JSON payload out of model output that may be wrapped in markdown or prose
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResponseParser;

impl JsonResponseParser {
    /// Extract JSON from LLM responses that might be wrapped in markdown or other formatting
    pub fn extract_json_from_response(content: &str) -> String {
        // ```json fenced block
        if let Some(start) = content.find("```json") {
            let json_start = start + "```json".len();
            if let Some(end) = content[json_start..].find("```") {
                return content[json_start..json_start + end].trim().to_string();
            }
        }

        // Plain fenced block, only if it looks like JSON
        if let Some(start) = content.find("```") {
            let block_start = start + 3;
            if let Some(end) = content[block_start..].find("```") {
                let potential_json = content[block_start..block_start + end].trim();
                if potential_json.starts_with('{') || potential_json.starts_with('[') {
                    return potential_json.to_string();
                }
            }
        }

        // Outermost span, opened by whichever of `{` or `[` comes first
        if let Some(start) = content.find(['{', '[']) {
            let close = if content[start..].starts_with('{') { '}' } else { ']' };
            if let Some(end) = content.rfind(close) {
                if end > start {
                    return content[start..=end].to_string();
                }
            }
        }

        content.trim().to_string()
    }

    /// Parse JSON response into a specific type with error handling
    pub fn parse_json_response<T>(&self, content: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let json_content = Self::extract_json_from_response(content);
        debug!(extracted_length = json_content.len(), "Extracted JSON from LLM response");
        serde_json::from_str::<T>(&json_content).map_err(|e| anyhow!("Failed to parse JSON response: {}", e))
    }

    pub fn parse_json_value(&self, content: &str) -> Result<Value> {
        self.parse_json_response::<Value>(content)
    }
}

/// Factory for creating LLM providers based on provider type
pub struct LLMProviderFactory;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProviderType {
    OpenAI,
    Gemini,
}

impl LLMProviderType {
    /// Unknown names fall back to Gemini
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "openai" | "chatgpt" | "gpt" => LLMProviderType::OpenAI,
            "gemini" | "google" => LLMProviderType::Gemini,
            _ => {
                info!("Unknown LLM provider '{}', defaulting to Gemini", value);
                LLMProviderType::Gemini
            }
        }
    }
}

impl LLMProviderFactory {
    /// Create a new LLM provider instance based on provider type
    pub fn create_provider(
        provider_type: LLMProviderType,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
        timeout: Duration,
    ) -> LLMProvider {
        match provider_type {
            LLMProviderType::OpenAI => LLMProvider::OpenAI(OpenAIProvider::new(api_key, base_url, model, timeout)),
            LLMProviderType::Gemini => LLMProvider::Gemini(GeminiProvider::new(api_key, base_url, model, timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_json_fenced_block() {
        let content = "Here is the analysis:\n```json\n{\"summary\": \"ok\"}\n```\nLet me know!";
        assert_eq!(JsonResponseParser::extract_json_from_response(content), "{\"summary\": \"ok\"}");
    }

    #[test]
    fn test_extracts_plain_fenced_block_only_when_json_like() {
        let content = "```\n[1, 2, 3]\n```";
        assert_eq!(JsonResponseParser::extract_json_from_response(content), "[1, 2, 3]");

        let prose = "```\nnot json\n``` but {\"a\": 1} is";
        assert_eq!(JsonResponseParser::extract_json_from_response(prose), "{\"a\": 1}");
    }

    #[test]
    fn test_extracts_bare_object_with_surrounding_prose() {
        let content = "Sure! {\"term\": \"lien\", \"nested\": {\"x\": 1}} Hope that helps.";
        let parsed = JsonResponseParser.parse_json_value(content).unwrap();
        assert_eq!(parsed["term"], "lien");
        assert_eq!(parsed["nested"]["x"], 1);
    }

    #[test]
    fn test_extracts_top_level_array() {
        let content = "Scenarios follow: [{\"title\": \"Late rent\"}, {\"title\": \"Early exit\"}] done.";
        let parsed = JsonResponseParser.parse_json_value(content).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        assert_eq!(parsed[1]["title"], "Early exit");
    }

    #[test]
    fn test_unparseable_content_is_an_error() {
        assert!(JsonResponseParser.parse_json_value("I cannot help with that.").is_err());
        assert!(JsonResponseParser.parse_json_value("```json\n{\"summary\": \n```").is_err());
    }

    #[test]
    fn test_provider_type_parsing() {
        let test_cases = vec![
            ("openai", LLMProviderType::OpenAI),
            ("ChatGPT", LLMProviderType::OpenAI),
            ("gpt", LLMProviderType::OpenAI),
            ("gemini", LLMProviderType::Gemini),
            ("GOOGLE", LLMProviderType::Gemini),
            ("claude", LLMProviderType::Gemini),
            ("", LLMProviderType::Gemini),
        ];

        for (input, expected) in test_cases {
            assert_eq!(LLMProviderType::parse(input), expected, "Input '{}' should map to {:?}", input, expected);
        }
    }

    #[test]
    fn test_factory_defaults() {
        let timeout = Duration::from_secs(5);

        let gemini = LLMProviderFactory::create_provider(LLMProviderType::Gemini, "key".to_string(), None, None, timeout);
        assert_eq!(gemini.provider_name(), "Gemini");
        assert_eq!(gemini.model_name(), "gemini-1.5-flash");

        let openai = LLMProviderFactory::create_provider(
            LLMProviderType::OpenAI,
            "key".to_string(),
            None,
            Some("gpt-4o".to_string()),
            timeout,
        );
        assert_eq!(openai.provider_name(), "OpenAI");
        assert_eq!(openai.model_name(), "gpt-4o");
    }
}
