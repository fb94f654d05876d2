//! Library side of the prompt-helper binary: prompt templates, the HTTP
//! call to the gateway's completions endpoint, and response extraction.

use std::time::Duration;

use clap::ValueEnum;
use serde_json::{Value, json};
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client-side cap, tighter than the server's: editor buffers can be huge
/// and there is no point shipping more than the tail over the wire.
pub const CLIENT_PROMPT_LIMIT: usize = 8000;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Input(String),
    #[error("request timed out")]
    Timeout,
    #[error("could not connect to the gateway at {0}; is it running?")]
    Connection(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response format: {0}")]
    MalformedResponse(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// What the helper asks the model to do with the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Summarize,
    Reply,
    Custom,
}

pub fn summarize_prompt(content: &str) -> String {
    format!("Summarize this email in 2-3 sentences:\n\n{content}")
}

pub fn reply_prompt(content: &str) -> String {
    format!("Write a brief, professional reply to this email:\n\n{content}\n\nReply:")
}

pub fn custom_prompt(prefix: &str, content: &str) -> String {
    format!("{prefix}\n\n{content}")
}

/// Build the prompt and token budget for an action, validating input first.
///
/// Every input error is rejected here, before a [`GatewayClient`] exists, so
/// the helper binary never issues a request for empty input or a custom
/// action without its prefix. `max_tokens` defaults depend on the action:
/// replies get a little more room than summaries.
pub fn prepare_request(
    action: Action,
    custom_prefix: Option<&str>,
    max_tokens: Option<usize>,
    content: &str,
) -> Result<(String, usize), ClientError> {
    if content.trim().is_empty() {
        return Err(ClientError::Input("No input provided".to_string()));
    }

    let (prompt, default_tokens) = match action {
        Action::Summarize => (summarize_prompt(content), 150),
        Action::Reply => (reply_prompt(content), 200),
        Action::Custom => {
            let prefix = custom_prefix.ok_or_else(|| {
                ClientError::Input("--prompt required for custom action".to_string())
            })?;
            (custom_prompt(prefix, content), 150)
        }
    };

    Ok((prompt, max_tokens.unwrap_or(default_tokens)))
}

/// Thin client for the gateway's `/v1/completions` endpoint.
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// POST the prompt and return the first choice's text, trimmed.
    pub async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String, ClientError> {
        let prompt = truncate_tail(prompt, CLIENT_PROMPT_LIMIT);
        let payload = json!({
            "prompt": prompt,
            "max_tokens": max_tokens,
        });

        let url = format!("{}/v1/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| classify_send_error(err, &self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|err| ClientError::MalformedResponse(err.to_string()))?;
        extract_completion_text(&value)
            .ok_or_else(|| ClientError::MalformedResponse(value.to_string()))
    }
}

fn classify_send_error(err: reqwest::Error, base_url: &str) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else if err.is_connect() {
        ClientError::Connection(base_url.to_string())
    } else {
        ClientError::Transport(err)
    }
}

/// Pull `choices[0].text` out of a completion response.
pub fn extract_completion_text(value: &Value) -> Option<String> {
    value
        .get("choices")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(|s| s.trim().to_string())
}

fn truncate_tail(prompt: &str, keep: usize) -> String {
    let total = prompt.chars().count();
    if total <= keep {
        prompt.to_string()
    } else {
        prompt.chars().skip(total - keep).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_template_wraps_content() {
        assert_eq!(
            summarize_prompt("body"),
            "Summarize this email in 2-3 sentences:\n\nbody"
        );
    }

    #[test]
    fn reply_template_ends_with_reply_marker() {
        let prompt = reply_prompt("body");
        assert!(prompt.starts_with("Write a brief, professional reply"));
        assert!(prompt.ends_with("\n\nReply:"));
    }

    #[test]
    fn custom_template_prefixes_content() {
        assert_eq!(custom_prompt("Translate:", "text"), "Translate:\n\ntext");
    }

    #[test]
    fn extracts_and_trims_first_choice() {
        let value = serde_json::json!({
            "choices": [{"text": "  answer \n"}, {"text": "ignored"}]
        });
        assert_eq!(extract_completion_text(&value).unwrap(), "answer");
    }

    #[test]
    fn missing_choices_yields_none() {
        let value = serde_json::json!({"object": "text_completion"});
        assert!(extract_completion_text(&value).is_none());
    }

    #[test]
    fn empty_input_rejected_before_any_request_exists() {
        for content in ["", "   \n\t "] {
            let err = prepare_request(Action::Summarize, None, None, content).unwrap_err();
            assert_eq!(err.to_string(), "No input provided");
        }
    }

    #[test]
    fn custom_action_requires_a_prefix() {
        let err = prepare_request(Action::Custom, None, None, "body").unwrap_err();
        assert_eq!(err.to_string(), "--prompt required for custom action");

        let (prompt, _) = prepare_request(Action::Custom, Some("Translate:"), None, "body").unwrap();
        assert_eq!(prompt, "Translate:\n\nbody");
    }

    #[test]
    fn token_defaults_depend_on_action() {
        let (_, tokens) = prepare_request(Action::Summarize, None, None, "body").unwrap();
        assert_eq!(tokens, 150);

        let (_, tokens) = prepare_request(Action::Reply, None, None, "body").unwrap();
        assert_eq!(tokens, 200);

        let (_, tokens) = prepare_request(Action::Reply, None, Some(42), "body").unwrap();
        assert_eq!(tokens, 42);
    }

    #[test]
    fn connection_error_message_names_the_gateway() {
        let err = ClientError::Connection("http://localhost:8080".to_string());
        let message = err.to_string();
        assert!(message.contains("could not connect"));
        assert!(message.contains("http://localhost:8080"));
    }

    #[test]
    fn truncate_tail_keeps_most_recent_characters() {
        let text = format!("{}{}", "a".repeat(100), "b".repeat(50));
        assert_eq!(truncate_tail(&text, 50), "b".repeat(50));
        assert_eq!(truncate_tail("short", 50), "short");
    }
}
