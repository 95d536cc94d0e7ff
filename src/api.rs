use axum::{
    Router,
    extract::{ConnectInfo, DefaultBodyLimit, Path, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::{Value, json};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{
    ai_service::{AiError, AiService, DEFAULT_QUIZ_QUESTIONS, DEFAULT_SCENARIO_COUNT, with_metadata},
    config::{Config, mask_sensitive_data},
    errors::{ApiError, ErrorContext},
    fallback,
    models::*,
    rate_limiter::{RateLimitDecision, RateLimiter},
    retry::{RetryPolicy, retry_with_backoff},
    storage::AnalysisStore,
    validation::{ApiJson, RequestLimits, Validate},
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn, log_performance};

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ai_service: AiService,
    pub store: AnalysisStore,
    /// API-wide limiter keyed by client address
    pub rate_limiter: RateLimiter,
    /// Save limiter keyed by email
    pub save_limiter: RateLimiter,
    pub retry_policy: RetryPolicy,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, ai_service: AiService, store: AnalysisStore) -> Self {
        let rate_limit = &config.rate_limit;
        let rate_limiter = RateLimiter::new(rate_limit.max_requests, Duration::from_secs(rate_limit.window_secs));
        let save_limiter = RateLimiter::new(
            rate_limit.save_max_requests,
            Duration::from_secs(rate_limit.save_window_secs),
        );
        let retry_policy = RetryPolicy::from(&config.retry);

        Self {
            config: Arc::new(config),
            ai_service,
            store,
            rate_limiter,
            save_limiter,
            retry_policy,
            started_at: Instant::now(),
        }
    }

    fn limits(&self) -> RequestLimits {
        RequestLimits {
            max_document_chars: self.config.server.max_document_chars,
        }
    }

    fn error_context(&self, operation: &str, resource_type: &str) -> ErrorContext {
        ErrorContext::new(operation, resource_type).exposing_details(self.config.expose_error_details())
    }

    fn metadata(&self, source: ResultSource, language: Language) -> ResponseMetadata {
        ResponseMetadata::new(
            source,
            self.ai_service.provider_name(),
            self.ai_service.model_name(),
            language,
        )
    }

    fn validate<T: Validate>(&self, request: &T, operation: &str, resource_type: &str) -> Result<(), Response> {
        request
            .validate(&self.limits())
            .map_err(|e| e.to_response_with_context(self.error_context(operation, resource_type)))
    }
}

/// Run an AI call under the retry policy, falling back to static content when it keeps failing.
///
/// With fallback disabled the final error becomes a 503.
async fn generate_with_fallback<F, Fut>(
    state: &AppState,
    operation: &'static str,
    resource_type: &str,
    fallback: impl FnOnce() -> Value,
    call: F,
) -> Result<(Value, ResultSource), Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, AiError>>,
{
    let start = Instant::now();

    match retry_with_backoff(&state.retry_policy, operation, call).await {
        Ok(value) => {
            log_performance!(operation, duration_ms = start.elapsed().as_millis() as u64);
            Ok((value, ResultSource::Ai))
        }
        Err(e) if state.config.llm.fallback_enabled => {
            log_api_warn!(operation, error = e, "serving fallback response");
            Ok((fallback(), ResultSource::Fallback))
        }
        Err(e) => {
            log_api_error!(operation, error = e, "AI call failed and fallback is disabled");
            Err(ApiError::AiServiceError(e.to_string())
                .to_response_with_context(state.error_context(operation, resource_type)))
        }
    }
}

pub async fn analyze_document(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnalyzeRequest>,
) -> Result<Json<Value>, Response> {
    log_api_start!("analyze", chars = request.text.chars().count());
    state.validate(&request, "analyze", "document")?;

    let (analysis, source) = generate_with_fallback(
        &state,
        "analyze",
        "analysis",
        || fallback::analysis(request.document_type),
        || state.ai_service.analyze_document(&request),
    )
    .await?;

    let metadata = state
        .metadata(source, request.language)
        .with_document(request.document_type, &request.text);

    log_api_success!("analyze", source = source, "analysis produced");
    Ok(Json(with_metadata(analysis, &metadata)))
}

pub async fn explain_term(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ExplainTermRequest>,
) -> Result<Json<Value>, Response> {
    log_api_start!("explain_term");
    state.validate(&request, "explain_term", "term")?;

    let term = request.term.trim().to_string();
    let (explanation, source) = generate_with_fallback(
        &state,
        "explain_term",
        "term explanation",
        || fallback::term_explanation(&term),
        || state.ai_service.explain_term(&request),
    )
    .await?;

    log_api_success!("explain_term", source = source, "term explained");
    Ok(Json(with_metadata(explanation, &state.metadata(source, request.language))))
}

pub async fn generate_scenarios(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ScenariosRequest>,
) -> Result<Json<Value>, Response> {
    log_api_start!("generate_scenarios", chars = request.text.chars().count());
    state.validate(&request, "generate_scenarios", "document")?;

    let count = request.count.unwrap_or(DEFAULT_SCENARIO_COUNT) as usize;
    let (scenarios, source) = generate_with_fallback(
        &state,
        "generate_scenarios",
        "scenarios",
        || fallback::scenarios(count),
        || state.ai_service.generate_scenarios(&request),
    )
    .await?;

    let metadata = state
        .metadata(source, request.language)
        .with_document(request.document_type, &request.text);

    log_api_success!("generate_scenarios", source = source, "scenarios generated");
    Ok(Json(with_metadata(scenarios, &metadata)))
}

pub async fn generate_quiz(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<QuizRequest>,
) -> Result<Json<Value>, Response> {
    log_api_start!("generate_quiz", chars = request.text.chars().count());
    state.validate(&request, "generate_quiz", "document")?;

    let question_count = request.question_count.unwrap_or(DEFAULT_QUIZ_QUESTIONS) as usize;
    let (quiz, source) = generate_with_fallback(
        &state,
        "generate_quiz",
        "quiz",
        || fallback::quiz(question_count, request.difficulty),
        || state.ai_service.generate_quiz(&request),
    )
    .await?;

    log_api_success!("generate_quiz", source = source, "quiz generated");
    Ok(Json(with_metadata(quiz, &state.metadata(source, request.language))))
}

pub async fn save_analysis(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SaveRequest>,
) -> Result<Response, Response> {
    log_api_start!("save");
    state.validate(&request, "save", "analysis")?;

    let email = request.email.trim().to_lowercase();
    let decision = state.save_limiter.check(&email).await;
    if !decision.allowed {
        log_api_warn!("save", client = mask_sensitive_data(&email), "save rate limit exceeded");
        return Err(rate_limited_response(&decision));
    }

    let saved = state
        .store
        .save(&email, request.document_name, request.analysis)
        .await
        .map_err(|e| {
            log_api_error!("save", error = e, "failed to store analysis");
            ApiError::StorageError(e).to_response_with_context(state.error_context("save", "analysis"))
        })?;

    log_api_success!("save", analysis_id = saved.id, "analysis saved");

    let mut response = Json(SaveResponse {
        success: true,
        id: saved.id,
        expires_at: saved.expires_at,
        message: format!(
            "Analysis saved. It will be available for {} hours.",
            state.store.retention().num_hours()
        ),
    })
    .into_response();
    apply_rate_limit_headers(response.headers_mut(), &decision);
    Ok(response)
}

pub async fn get_saved_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SavedAnalysis>, Response> {
    log_api_start!("get_saved", analysis_id = id);

    let context = || state.error_context("get_saved", "Saved analysis").with_id(&id);

    let analysis_id = Uuid::parse_str(&id).map_err(|_| {
        ApiError::ValidationError(format!("'{}' is not a valid analysis id", id)).to_response_with_context(context())
    })?;

    match state.store.get(analysis_id).await {
        Ok(Some(saved)) => {
            log_api_success!("get_saved", analysis_id = analysis_id, "saved analysis retrieved");
            Ok(Json(saved))
        }
        Ok(None) => {
            log_api_warn!("get_saved", "saved analysis not found or expired");
            Err(ApiError::NotFound(format!("Saved analysis '{}' not found or has expired", analysis_id))
                .to_response_with_context(context()))
        }
        Err(e) => {
            log_api_error!("get_saved", analysis_id = analysis_id, error = e, "storage error retrieving analysis");
            Err(ApiError::StorageError(e).to_response_with_context(context()))
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
}

pub async fn health_detailed(State(state): State<AppState>) -> Json<Value> {
    log_api_start!("health_detailed");

    let (status, active_analyses) = match state.store.count_active().await {
        Ok(count) => ("ok", Some(count)),
        Err(e) => {
            log_api_warn!("health_detailed", error = e, "storage check failed");
            ("degraded", None)
        }
    };

    let tracked_clients = state.rate_limiter.tracked_identifiers().await;
    let tracked_save_emails = state.save_limiter.tracked_identifiers().await;

    Json(json!({
        "status": status,
        "timestamp": Utc::now(),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.server.environment.as_str(),
        "ai": {
            "provider": state.ai_service.provider_name(),
            "model": state.ai_service.model_name(),
            "configured": state.ai_service.is_configured(),
            "fallbackEnabled": state.config.llm.fallback_enabled,
        },
        "storage": {
            "backend": state.store.backend_name(),
            "activeAnalyses": active_analyses,
            "retentionHours": state.store.retention().num_hours(),
        },
        "rateLimiter": {
            "maxRequests": state.rate_limiter.max_requests(),
            "windowSecs": state.rate_limiter.window().as_secs(),
            "trackedClients": tracked_clients,
            "trackedSaveEmails": tracked_save_emails,
        },
    }))
}

/// Client identifier for rate limiting. The first `X-Forwarded-For` hop is only honoured
/// behind a trusted proxy; otherwise the peer address is used.
pub fn client_identifier(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());

        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
}

fn rate_limited_response(decision: &RateLimitDecision) -> Response {
    let mut response = ApiError::RateLimited {
        retry_after_secs: decision.retry_after_secs(),
    }
    .into_response();
    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}

/// API-wide fixed-window limit; every response carries the `X-RateLimit-*` headers
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_identifier(&request, state.config.server.trust_proxy);
    let decision = state.rate_limiter.check(&client).await;

    if !decision.allowed {
        log_api_warn!("rate_limit", client = client, "request rejected");
        return rate_limited_response(&decision);
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    let api_routes = Router::new()
        .route("/api/analyze", post(analyze_document))
        .route("/api/explain-term", post(explain_term))
        .route("/api/generate-scenarios", post(generate_scenarios))
        .route("/api/generate-quiz", post(generate_quiz))
        .route("/api/save", post(save_analysis))
        .route("/api/saved/:id", get(get_saved_analysis))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    // Health checks stay reachable for load balancers even when a client is throttled
    let health_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/health/detailed", get(health_detailed));

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_headers(headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/analyze");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_client_identifier_prefers_first_forwarded_hop_behind_proxy() {
        let request = request_with_headers(&[("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")]);
        assert_eq!(client_identifier(&request, true), "203.0.113.7");
    }

    #[test]
    fn test_client_identifier_ignores_forwarded_header_without_proxy() {
        let mut request = request_with_headers(&[("x-forwarded-for", "203.0.113.7")]);
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 4], 40000))));
        assert_eq!(client_identifier(&request, false), "198.51.100.4");
    }

    #[test]
    fn test_client_identifier_falls_back_to_peer_address() {
        let mut request = request_with_headers(&[("x-forwarded-for", "  ")]);
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 50123))));
        assert_eq!(client_identifier(&request, true), "192.168.1.20");

        assert_eq!(client_identifier(&request_with_headers(&[]), true), "unknown");
    }

    #[test]
    fn test_rate_limited_response_carries_headers() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 100,
            remaining: 0,
            reset_after: Duration::from_millis(12_400),
        };
        let response = rate_limited_response(&decision);

        assert_eq!(response.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "13");
        assert_eq!(response.headers()[X_RATELIMIT_LIMIT], "100");
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "0");
    }
}
