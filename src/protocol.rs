//! Wire shapes for the four accepted request flavors and their responses.
//!
//! Every incoming envelope is normalized into one internal
//! [`GenerationRequest`] before it reaches the model, and formatted back out
//! through a protocol-specific response builder. Handlers never hand raw
//! envelopes to the generation path.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Hard ceiling on tokens per request, whatever the client asks for.
pub const MAX_TOKENS_CAP: usize = 32768;
pub const DEFAULT_MAX_TOKENS: usize = 512;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// The /api/chat endpoint serves editor plugins that expect long summaries;
/// it ignores client-side token settings and uses this fixed budget.
pub const OLLAMA_CHAT_MAX_TOKENS: usize = 3000;

/// Prompts longer than this many characters are cut down to their trailing
/// [`PROMPT_TRUNCATE_KEEP`] characters, keeping the most recent content.
pub const PROMPT_TRUNCATE_THRESHOLD: usize = 50000;
pub const PROMPT_TRUNCATE_KEEP: usize = 8000;

/// The single internal request shape every protocol envelope maps into.
///
/// Construction enforces the request invariants: `max_tokens` is clamped to
/// [`MAX_TOKENS_CAP`] and oversized prompts are truncated to their tail.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f64,
}

impl GenerationRequest {
    pub fn new(prompt: String, max_tokens: usize, temperature: f64) -> Self {
        Self {
            prompt: truncate_prompt(prompt),
            max_tokens: max_tokens.min(MAX_TOKENS_CAP),
            temperature,
        }
    }
}

fn truncate_prompt(prompt: String) -> String {
    let total = prompt.chars().count();
    if total <= PROMPT_TRUNCATE_THRESHOLD {
        return prompt;
    }
    tracing::info!(
        original_chars = total,
        kept_chars = PROMPT_TRUNCATE_KEEP,
        "truncating oversized prompt to its tail"
    );
    prompt.chars().skip(total - PROMPT_TRUNCATE_KEEP).collect()
}

// ── Incoming envelopes ──────────────────────────────────────────────────

/// OpenAI-style `POST /v1/completions` body.
///
/// A `model` field in the payload is accepted and ignored; responses always
/// echo the one loaded model.
#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

fn default_role() -> String {
    "user".to_string()
}

/// OpenAI-style `POST /v1/chat/completions` body.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Ollama-style `POST /api/generate` body.
#[derive(Debug, Deserialize)]
pub struct OllamaGenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// One of the four accepted request shapes, tagged by endpoint.
///
/// [`ProtocolRequest::into_generation`] is the only path from an envelope to
/// the model; defaults and clamping are applied there and nowhere else.
#[derive(Debug)]
pub enum ProtocolRequest {
    Completion(CompletionRequest),
    ChatCompletion(ChatCompletionRequest),
    OllamaGenerate(OllamaGenerateRequest),
    OllamaChat { prompt: String },
}

impl ProtocolRequest {
    pub fn into_generation(self) -> GenerationRequest {
        match self {
            ProtocolRequest::Completion(req) => GenerationRequest::new(
                req.prompt,
                req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                req.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            ),
            ProtocolRequest::ChatCompletion(req) => GenerationRequest::new(
                join_messages(&req.messages),
                req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                req.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            ),
            ProtocolRequest::OllamaGenerate(req) => GenerationRequest::new(
                req.prompt,
                req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                req.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            ),
            ProtocolRequest::OllamaChat { prompt } => {
                GenerationRequest::new(prompt, OLLAMA_CHAT_MAX_TOKENS, DEFAULT_TEMPERATURE)
            }
        }
    }
}

/// Flatten a chat transcript into `role: content` lines.
///
/// A lossy approximation of the chat template a chat-tuned model expects;
/// kept for compatibility with the completion-style generation path.
pub fn join_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt extraction for `/api/chat`, which editor plugins hit with a variety
/// of payloads: JSON with a messages array, JSON with a bare `prompt` field,
/// form-encoded fields, or plain text.
///
/// Returns an empty string when a structured body parses but carries no
/// prompt; the handler rejects that with 400.
pub fn extract_ollama_chat_prompt(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(content) = value
            .get("messages")
            .and_then(|m| m.get(0))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
        {
            return content.to_string();
        }
        if let Some(prompt) = value.get("prompt").and_then(|p| p.as_str()) {
            return prompt.to_string();
        }
        return String::new();
    }

    if let Ok(fields) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
        for key in ["prompt", "message", "input", "text"] {
            if let Some((_, value)) = fields
                .iter()
                .find(|(k, v)| k.as_str() == key && !v.is_empty())
            {
                return value.clone();
            }
        }
    }

    String::from_utf8_lossy(body).trim().to_string()
}

// ── Outgoing shapes ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CompletionChoice {
    pub text: String,
    pub index: usize,
    pub logprobs: Option<serde_json::Value>,
    pub finish_reason: String,
}

#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// OpenAI-style completion response, also returned by the chat endpoint
/// (chat requests are converted to completions internally).
#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn build(model: &str, prompt: &str, text: String) -> Self {
        let created = unix_timestamp();
        let prompt_tokens = estimate_tokens(prompt);
        let completion_tokens = estimate_tokens(&text);
        Self {
            id: format!("cmpl-{created}"),
            object: "text_completion".to_string(),
            created,
            model: model.to_string(),
            choices: vec![CompletionChoice {
                text,
                index: 0,
                logprobs: None,
                finish_reason: "length".to_string(),
            }],
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        }
    }
}

/// Ollama-style response shared by `/api/generate` and `/api/chat`.
#[derive(Debug, Serialize)]
pub struct OllamaResponse {
    pub model: String,
    pub created_at: String,
    pub response: String,
    pub done: bool,
}

impl OllamaResponse {
    pub fn build(model: &str, text: String) -> Self {
        Self {
            model: model.to_string(),
            created_at: unix_timestamp().to_string(),
            response: text,
            done: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

impl ModelList {
    pub fn single(model: &str) -> Self {
        Self {
            object: "list".to_string(),
            data: vec![ModelEntry {
                id: model.to_string(),
                object: "model".to_string(),
                created: unix_timestamp(),
                owned_by: "local".to_string(),
            }],
        }
    }
}

/// Word-split approximation, not true tokenization.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
