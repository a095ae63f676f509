//! LLM client: the single point of entry for all Gemini API calls.
//!
//! No other module may call the vendor API directly. `DirectTransport`
//! wraps `GeminiClient`; nothing else holds one.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::chat::message::{ChatMessage, Role};

pub mod sse;

use sse::SseDecoder;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
/// Covers the whole exchange including a streamed body, so a hung stream
/// surfaces as an error instead of leaving a session loading forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    code: u16,
    message: String,
}

/// Stream of text fragments; ends when the vendor closes the response.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// Wraps the Gemini `generateContent` / `streamGenerateContent` endpoints.
/// Calls are single-shot: failures are reported, never retried.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, model, GEMINI_API_BASE.to_string())
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One-shot completion: the whole reply as a single string.
    pub async fn generate(
        &self,
        system: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self.post(&url, system, history, message).await?;

        let body: GenerateResponse = response.json().await?;
        if let Some(usage) = &body.usage_metadata {
            debug!(
                "Gemini call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        let text = body.text();
        if text.is_empty() {
            let reason = body
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .unwrap_or("none");
            warn!("Gemini returned no text (finish reason: {reason})");
            return Err(LlmError::EmptyContent);
        }
        Ok(text)
    }

    /// Streaming completion. Resolves once response headers arrive; the
    /// returned stream then yields each non-empty text fragment in order.
    pub async fn stream(
        &self,
        system: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<FragmentStream, LlmError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        let response = self.post(&url, system, history, message).await?;
        Ok(fragments(Box::pin(response.bytes_stream())))
    }

    async fn post(
        &self,
        url: &str,
        system: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<reqwest::Response, LlmError> {
        let body = build_request(system, history, message);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}: {}", status, body);
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

fn build_request<'a>(
    system: &'a str,
    history: &'a [ChatMessage],
    message: &'a str,
) -> GenerateRequest<'a> {
    // The conversation must open with a user turn; the widget's greeting
    // (and anything else before the first question) is display-only.
    let mut contents: Vec<Content<'a>> = history
        .iter()
        .skip_while(|m| m.role == Role::Assistant)
        .map(|m| Content {
            role: Some(m.role.as_str()),
            parts: vec![Part { text: &m.text }],
        })
        .collect();

    contents.push(Content {
        role: Some(Role::User.as_str()),
        parts: vec![Part { text: message }],
    });

    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part { text: system }],
        },
        contents,
    }
}

/// Decodes one SSE `data` payload into its text fragment.
fn parse_event(data: &str) -> Result<String, LlmError> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    if value.get("error").is_some() {
        let err: GeminiError = serde_json::from_value(value)?;
        return Err(LlmError::Api {
            status: err.error.code,
            message: err.error.message,
        });
    }
    let chunk: GenerateResponse = serde_json::from_value(value)?;
    Ok(chunk.text())
}

struct FragmentState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

/// Turns a raw SSE byte stream into text fragments. The first error ends the stream.
fn fragments<S, B>(body: S) -> FragmentStream
where
    S: futures::Stream<Item = Result<B, reqwest::Error>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = FragmentState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            let events = match state.body.next().await {
                Some(Ok(chunk)) => state.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(LlmError::Http(e)), state));
                }
                None => {
                    state.finished = true;
                    state.decoder.finish()
                }
            };

            for event in events {
                match parse_event(&event) {
                    Ok(text) if text.is_empty() => {}
                    other => state.pending.push_back(other),
                }
            }
        }
    })
    .boxed()
}
