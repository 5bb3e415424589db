use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatBackend, ChatResponse, ResponseKind};
use crate::error::{Error, Result};
use crate::settings::Settings;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct StatusReply {
    status: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ListenReply {
    text: Option<String>,
    error: Option<String>,
}

/// Talks to the chat server over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    request_timeout: Option<Duration>,
}

impl HttpBackend {
    /// `request_timeout` bounds the short request/response calls. The chat
    /// stream itself only gets a connect timeout so long replies are not cut.
    pub fn new(base_url: &str, request_timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_timeout(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// Read a `{"status": "success"}` style reply.
    async fn expect_success(response: Response) -> Result<()> {
        let status = response.status();
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<StatusReply>(&bytes) {
            Ok(reply) if reply.status.as_deref() == Some("success") => Ok(()),
            Ok(reply) => Err(Error::Rejected(reply.error.unwrap_or_else(|| {
                format!("unexpected reply status: {}", reply.status.unwrap_or_default())
            }))),
            Err(_) if !status.is_success() => Err(Error::Status(status.as_u16())),
            Err(e) => Err(Error::Json(e)),
        }
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn chat(&self, message: &str) -> Result<ChatResponse> {
        let url = self.url("/chat");
        debug!(%url, chars = message.chars().count(), "sending chat message");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        let status = response.status().as_u16();
        let kind = ResponseKind::from_content_type(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        debug!(status, ?kind, "chat response headers received");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from))
            .boxed();

        Ok(ChatResponse { status, kind, body })
    }

    async fn new_chat(&self) -> Result<()> {
        let url = self.url("/new_chat");
        let response = self
            .with_timeout(self.client.post(&url).header(header::CONTENT_TYPE, "application/json"))
            .send()
            .await?;
        Self::expect_success(response).await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let url = self.url("/settings");
        let response = self
            .with_timeout(self.client.post(&url).json(settings))
            .send()
            .await?;
        Self::expect_success(response).await
    }

    async fn listen(&self) -> Result<String> {
        let url = self.url("/listen");
        let response = self.with_timeout(self.client.get(&url)).send().await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let reply: ListenReply = match serde_json::from_slice(&bytes) {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => return Err(Error::Status(status.as_u16())),
            Err(e) => return Err(Error::Json(e)),
        };

        match (reply.text, reply.error) {
            (Some(text), _) if !text.is_empty() => Ok(text),
            (_, Some(error)) => Err(Error::Rejected(error)),
            (_, None) => {
                warn!("listen reply carried neither text nor error");
                Err(Error::Rejected("No speech recognized".to_string()))
            }
        }
    }
}
