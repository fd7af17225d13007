// api interaction module - handles chat-completions backend communication

use crate::credentials::ApiKey;
use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// one generation call, already resolved to a concrete model
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// anything that turns a prompt into raw message text
///
/// the composer only sees this trait, so tests and alternative backends
/// plug in without a network
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

// chat-completions request structures
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

// accepted response shapes, tried in order by `extract_content`
#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OutputText {
    output_text: String,
}

#[derive(Deserialize)]
struct ContentBlocks {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct SingleMessage {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

type Extractor = fn(&Value) -> Option<String>;

const EXTRACTORS: &[Extractor] = &[
    choice_message,
    choice_text,
    output_text,
    first_content_block,
    single_message,
];

fn choice_message(value: &Value) -> Option<String> {
    ChatCompletion::deserialize(value)
        .ok()?
        .choices
        .into_iter()
        .next()?
        .message?
        .content
}

fn choice_text(value: &Value) -> Option<String> {
    ChatCompletion::deserialize(value).ok()?.choices.into_iter().next()?.text
}

fn output_text(value: &Value) -> Option<String> {
    OutputText::deserialize(value).ok().map(|o| o.output_text)
}

fn first_content_block(value: &Value) -> Option<String> {
    ContentBlocks::deserialize(value).ok()?.content.into_iter().next()?.text
}

fn single_message(value: &Value) -> Option<String> {
    SingleMessage::deserialize(value).ok()?.message.content
}

/// message text from any supported response shape
pub fn extract_content(value: &Value) -> Option<String> {
    EXTRACTORS
        .iter()
        .filter_map(|extract| extract(value))
        .find(|text| !text.trim().is_empty())
}

/// `{"error": {"message": ...}}` payloads
pub fn extract_error(value: &Value) -> Option<String> {
    ErrorEnvelope::deserialize(value).ok().map(|e| e.error.message)
}

/// interpret a backend reply body
pub fn interpret_response(status: u16, body: &str) -> Result<String, GenerationError> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if !(200..300).contains(&status) {
        let message = parsed
            .as_ref()
            .and_then(extract_error)
            .unwrap_or_else(|| crate::utils::truncate_with_ellipsis(body.trim(), 200));
        return Err(GenerationError::Status { status, message });
    }

    let value = parsed.ok_or_else(|| GenerationError::Malformed("response is not json".to_string()))?;
    if let Some(message) = extract_error(&value) {
        return Err(GenerationError::Backend(message));
    }

    match extract_content(&value) {
        Some(text) => Ok(text),
        None if value.get("choices").is_some() => Err(GenerationError::Empty),
        None => Err(GenerationError::Malformed("no message content in response".to_string())),
    }
}

/// client for OpenAI-compatible `chat/completions` endpoints (OpenRouter by default)
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: ApiKey,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(endpoint: impl Into<String>, api_key: ApiKey, timeout_secs: u64) -> Result<Self, GenerationError> {
        let timeout = Duration::from_secs(timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            timeout,
        })
    }

    /// the client timeout and the outer timeout report the same way
    fn network_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout.as_secs())
        } else {
            GenerationError::Network(e)
        }
    }

    async fn send_with_retry(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &request.model,
            messages: [
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        // only connection failures are retried; the outer timeout still bounds the call
        let max_attempts = 2;
        let mut retry_delay = Duration::from_millis(500);

        for attempt in 1..=max_attempts {
            let sent = self
                .client
                .post(&self.endpoint)
                .bearer_auth(self.api_key.expose())
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) if e.is_connect() && attempt < max_attempts => {
                    warn!("backend connection failed (attempt {attempt}/{max_attempts}): {e}");
                    sleep(retry_delay).await;
                    retry_delay *= 2;
                    continue;
                }
                Err(e) => return Err(self.network_error(e)),
            };

            let status = response.status().as_u16();
            let text = response.text().await.map_err(|e| self.network_error(e))?;
            debug!("backend replied with status {status} ({} bytes)", text.len());
            return interpret_response(status, &text);
        }

        Err(GenerationError::Malformed("no attempt was made".to_string()))
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        debug!("requesting commit message from {} with {}", self.endpoint, request.model);
        tokio::time::timeout(self.timeout, self.send_with_retry(request))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout.as_secs()))?
    }
}
