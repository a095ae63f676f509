//! Transport strategies behind the chat widget.
//!
//! Both strategies answer the same `ChatRequest`; they differ only in how the
//! reply arrives. `DirectTransport` streams fragments from the vendor,
//! `ProxyTransport` posts to an upstream endpoint and yields its single reply
//! as one fragment.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::chat::message::ChatMessage;
use crate::llm_client::{GeminiClient, LlmError};

/// Header carrying the site-issued anti-forgery token.
pub const TOKEN_HEADER: &str = "x-csrf-token";
const PROXY_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Proxy request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Proxy returned status {0}")]
    Status(u16),

    #[error("Backend returned an empty reply")]
    EmptyReply,
}

/// Wire body of the proxy contract: `{ message, history: [{role, text}] }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Wire reply of the proxy contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub text: String,
}

pub type ReplyStream = BoxStream<'static, Result<String, TransportError>>;

/// Carried in `AppState` as `Arc<dyn ChatTransport>`, chosen at startup.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Opens the request. Errors here mean nothing was received at all;
    /// errors inside the stream mean the reply broke off.
    async fn send(&self, request: ChatRequest) -> Result<ReplyStream, TransportError>;

    /// The whole reply at once, for callers that cannot stream.
    async fn reply(&self, request: ChatRequest) -> Result<String, TransportError> {
        collect_reply(self.send(request).await?).await
    }

    fn name(&self) -> &'static str;
}

/// Drains a reply into one string. Used where the caller cannot stream.
pub async fn collect_reply(mut stream: ReplyStream) -> Result<String, TransportError> {
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment?);
    }
    if text.is_empty() {
        return Err(TransportError::EmptyReply);
    }
    Ok(text)
}

// ────────────────────────────────────────────────────────────────────────────
// Direct: stream from the vendor, conversation seeded with the CV briefing
// ────────────────────────────────────────────────────────────────────────────

pub struct DirectTransport {
    client: GeminiClient,
    briefing: String,
}

impl DirectTransport {
    pub fn new(client: GeminiClient, briefing: impl Into<String>) -> Self {
        Self {
            client,
            briefing: briefing.into(),
        }
    }
}

#[async_trait]
impl ChatTransport for DirectTransport {
    async fn send(&self, request: ChatRequest) -> Result<ReplyStream, TransportError> {
        let fragments = self
            .client
            .stream(&self.briefing, &request.history, &request.message)
            .await?;
        Ok(fragments.map(|r| r.map_err(TransportError::from)).boxed())
    }

    async fn reply(&self, request: ChatRequest) -> Result<String, TransportError> {
        let text = self
            .client
            .generate(&self.briefing, &request.history, &request.message)
            .await?;
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Proxy: relay to an upstream endpoint, reply delivered atomically
// ────────────────────────────────────────────────────────────────────────────

pub struct ProxyTransport {
    client: Client,
    url: String,
    token: String,
}

impl ProxyTransport {
    pub fn new(url: String, token: String) -> Result<Self, TransportError> {
        Ok(Self {
            client: Client::builder().timeout(PROXY_TIMEOUT).build()?,
            url,
            token,
        })
    }
}

#[async_trait]
impl ChatTransport for ProxyTransport {
    async fn send(&self, request: ChatRequest) -> Result<ReplyStream, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header(TOKEN_HEADER, &self.token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Chat proxy returned {status}");
            return Err(TransportError::Status(status.as_u16()));
        }

        let reply: ChatReply = response.json().await?;
        Ok(stream::once(async move { Ok::<_, TransportError>(reply.text) }).boxed())
    }

    fn name(&self) -> &'static str {
        "proxy"
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport with scripted replies.

    use std::collections::VecDeque;

    use tokio::sync::{mpsc, Mutex};
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;

    pub enum Reply {
        Fragments(Vec<&'static str>),
        /// Fails before any fragment is received.
        Fail,
        /// Yields the fragments, then breaks off.
        FailAfter(Vec<&'static str>),
        /// Fragments are fed by the test through the paired sender.
        Channel(mpsc::Receiver<Result<String, TransportError>>),
    }

    pub struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub async fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, request: ChatRequest) -> Result<ReplyStream, TransportError> {
            self.requests.lock().await.push(request);
            let reply = self.replies.lock().await.pop_front().unwrap_or(Reply::Fail);
            match reply {
                Reply::Fragments(parts) => Ok(stream::iter(
                    parts
                        .into_iter()
                        .map(|p| Ok::<_, TransportError>(p.to_string())),
                )
                .boxed()),
                Reply::Fail => Err(TransportError::Status(503)),
                Reply::FailAfter(parts) => Ok(stream::iter(
                    parts
                        .into_iter()
                        .map(|p| Ok::<_, TransportError>(p.to_string()))
                        .chain(std::iter::once(Err(TransportError::Status(502)))),
                )
                .boxed()),
                Reply::Channel(rx) => Ok(ReceiverStream::new(rx).boxed()),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }
}
