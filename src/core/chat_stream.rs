use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::api::{ChatRequest, LoginRequest};
use crate::core::decoder::Utf8StreamDecoder;
use crate::core::message::Message;
use crate::utils::url::{construct_api_url, server_origin};

/// Failure before any body bytes were read.
#[derive(Debug)]
pub enum StreamInitError {
    Send(reqwest::Error),
    Status(StatusCode),
    MissingBody(StatusCode),
}

impl fmt::Display for StreamInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamInitError::Send(err) => write!(f, "chat request failed: {err}"),
            StreamInitError::Status(status) => write!(f, "API Error: {status}"),
            StreamInitError::MissingBody(status) => {
                write!(f, "No response body (status {status})")
            }
        }
    }
}

impl Error for StreamInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StreamInitError::Send(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum StreamError {
    Init(StreamInitError),
    /// The body broke off after streaming had started.
    Read(reqwest::Error),
}

impl StreamError {
    pub fn is_init(&self) -> bool {
        matches!(self, StreamError::Init(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StreamError::Init(StreamInitError::Status(status))
            | StreamError::Init(StreamInitError::MissingBody(status)) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Init(err) => err.fmt(f),
            StreamError::Read(err) => write!(f, "stream interrupted: {err}"),
        }
    }
}

impl Error for StreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StreamError::Init(err) => Some(err),
            StreamError::Read(err) => Some(err),
        }
    }
}

impl From<StreamInitError> for StreamError {
    fn from(err: StreamInitError) -> Self {
        StreamError::Init(err)
    }
}

#[derive(Debug)]
pub enum AuthError {
    Request(reqwest::Error),
    Status(StatusCode),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Request(err) => write!(f, "Login failed: {err}"),
            AuthError::Status(status) => write!(f, "Login failed ({status})"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AuthError::Request(err) => Some(err),
            AuthError::Status(_) => None,
        }
    }
}

/// Receives decoded text in arrival order.
pub type ChunkSink<'a> = dyn FnMut(&str) + Send + 'a;

/// The remote conversational backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the backend's success payload untouched.
    async fn login(&self, email: &str, password: &str) -> Result<Value, AuthError>;

    /// Stream a reply to `history`, calling `on_chunk` for every decoded
    /// piece of text before the next read. On failure one diagnostic chunk is
    /// delivered through `on_chunk` and the error is also returned.
    async fn stream_response(
        &self,
        history: &[Message],
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<(), StreamError>;
}

#[derive(Clone)]
pub struct HttpChatClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Text appended to the in-progress reply when streaming fails.
    pub fn connection_error_notice(&self) -> String {
        connection_error_notice(&self.base_url)
    }

    async fn stream_request(
        &self,
        request: ChatRequest,
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<(), StreamError> {
        let chat_url = construct_api_url(&self.base_url, "chat");
        debug!(url = %chat_url, messages = request.messages.len(), "sending chat request");

        let response = self
            .client
            .post(chat_url)
            .json(&request)
            .send()
            .await
            .map_err(StreamInitError::Send)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamInitError::Status(status).into());
        }
        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Err(StreamInitError::MissingBody(status).into());
        }

        let mut decoder = Utf8StreamDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(StreamError::Read)?;
            let text = decoder.decode(&bytes);
            if !text.is_empty() {
                on_chunk(text.as_str());
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            on_chunk(tail.as_str());
        }
        debug!("chat stream finished");
        Ok(())
    }
}

pub fn connection_error_notice(base_url: &str) -> String {
    format!(
        "\n[Connection Error: Ensure backend is running at {}]",
        server_origin(base_url)
    )
}

#[async_trait]
impl ChatBackend for HttpChatClient {
    async fn login(&self, email: &str, password: &str) -> Result<Value, AuthError> {
        let login_url = construct_api_url(&self.base_url, "login");
        let response = self
            .client
            .post(login_url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|err| {
                debug!(error = %err, "login request failed");
                AuthError::Request(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "login rejected");
            return Err(AuthError::Status(status));
        }

        let body = response.bytes().await.map_err(AuthError::Request)?;
        Ok(serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn stream_response(
        &self,
        history: &[Message],
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<(), StreamError> {
        let request = ChatRequest::from_history(history);
        let result = self.stream_request(request, on_chunk).await;
        if let Err(err) = &result {
            debug!(error = %err, "chat stream failed");
            on_chunk(self.connection_error_notice().as_str());
        }
        result
    }
}
