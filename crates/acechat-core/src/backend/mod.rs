//! The remote chat service, seen from the client.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use serde::Deserialize;
use std::pin::Pin;

use crate::error::Result;
use crate::settings::Settings;

pub use http::HttpBackend;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// How a `/chat` reply body must be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Chunked text, consumed incrementally.
    Stream,
    /// One JSON document: `{"response": …}` or `{"error": …}`.
    Json,
}

impl ResponseKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().starts_with("application/json") => {
                ResponseKind::Json
            }
            _ => ResponseKind::Stream,
        }
    }
}

/// A `/chat` response whose headers have arrived; the body is still unread.
pub struct ChatResponse {
    pub status: u16,
    pub kind: ResponseKind,
    pub body: ByteStream,
}

/// Body of a non-streaming `/chat` reply.
#[derive(Deserialize, Debug, Default)]
pub struct JsonReply {
    pub response: Option<String>,
    pub error: Option<String>,
}

impl JsonReply {
    /// The reply text, or the error the server reported.
    pub fn into_result(self) -> std::result::Result<String, String> {
        match (self.error, self.response) {
            (Some(error), _) => Err(error),
            (None, Some(response)) => Ok(response),
            (None, None) => Err("Invalid response from AI".to_string()),
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// POST `/chat`. Resolves once response headers are in.
    async fn chat(&self, message: &str) -> Result<ChatResponse>;

    /// POST `/new_chat`: drop the server-side conversation.
    async fn new_chat(&self) -> Result<()>;

    /// POST `/settings`.
    async fn save_settings(&self, settings: &Settings) -> Result<()>;

    /// GET `/listen`: server-side speech capture. A server-reported failure
    /// comes back as [`crate::Error::Rejected`].
    async fn listen(&self) -> Result<String>;
}
