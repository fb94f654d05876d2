use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use tokio::task;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::ServiceError,
    manager::ModelManager,
    protocol::{
        ChatCompletionRequest, CompletionRequest, CompletionResponse, GenerationRequest,
        ModelList, OllamaGenerateRequest, OllamaResponse, ProtocolRequest,
        extract_ollama_chat_prompt,
    },
};

/// Request bodies beyond this size are rejected before parsing.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ModelManager>,
}

pub fn build_router(manager: Arc<ModelManager>) -> Router {
    let state = AppState { manager };

    Router::new()
        .route("/v1/completions", post(completions))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/api/generate", post(ollama_generate))
        .route("/api/chat", post(ollama_chat))
        .route("/v1/models", get(list_models))
        .route("/health", get(health))
        .with_state(state)
        .layer(map_response(flatten_method_not_allowed))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

/// Clients get 404 for a wrong method on a known path, same as for an
/// unknown path.
async fn flatten_method_not_allowed(response: Response) -> Response {
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        StatusCode::NOT_FOUND.into_response()
    } else {
        response
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList::single(state.manager.model_name()))
}

async fn completions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CompletionResponse>, ServiceError> {
    let envelope: CompletionRequest = parse_json(&body)?;
    let request = ProtocolRequest::Completion(envelope).into_generation();
    let prompt = request.prompt.clone();

    let text = run_generation(&state, request).await?;
    Ok(Json(CompletionResponse::build(
        state.manager.model_name(),
        &prompt,
        text,
    )))
}

/// Chat requests are flattened into a plain completion; the response keeps
/// the completion shape.
async fn chat_completions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CompletionResponse>, ServiceError> {
    let envelope: ChatCompletionRequest = parse_json(&body)?;
    let request = ProtocolRequest::ChatCompletion(envelope).into_generation();
    let prompt = request.prompt.clone();

    let text = run_generation(&state, request).await?;
    Ok(Json(CompletionResponse::build(
        state.manager.model_name(),
        &prompt,
        text,
    )))
}

async fn ollama_generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<OllamaResponse>, ServiceError> {
    let envelope: OllamaGenerateRequest = parse_json(&body)?;
    let request = ProtocolRequest::OllamaGenerate(envelope).into_generation();

    let text = run_generation(&state, request).await?;
    Ok(Json(OllamaResponse::build(
        state.manager.model_name(),
        text,
    )))
}

/// The one endpoint that accepts more than JSON: editor plugins post JSON,
/// form data, or plain text here, so the body is parsed leniently.
async fn ollama_chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<OllamaResponse>, ServiceError> {
    let prompt = extract_ollama_chat_prompt(&body);
    if prompt.is_empty() {
        return Err(ServiceError::BadRequest("no prompt provided".into()));
    }

    let request = ProtocolRequest::OllamaChat { prompt }.into_generation();
    let text = run_generation(&state, request).await?;
    Ok(Json(OllamaResponse::build(
        state.manager.model_name(),
        text.trim().to_string(),
    )))
}

/// Hand the blocking generation call to the blocking pool so the accept loop
/// stays responsive while a request is in flight.
async fn run_generation(
    state: &AppState,
    request: GenerationRequest,
) -> Result<String, ServiceError> {
    let manager = state.manager.clone();
    task::spawn_blocking(move || manager.generate(&request))
        .await
        .map_err(|err| ServiceError::Generation(format!("generation task failed: {err}")))?
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(body)
        .map_err(|err| ServiceError::BadRequest(format!("invalid JSON body: {err}")))
}
