use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::core::chat_stream::{
    connection_error_notice, AuthError, ChatBackend, ChunkSink, HttpChatClient, StreamError,
    StreamInitError,
};
use crate::core::message::Message;

pub const TEST_BASE_URL: &str = "http://localhost:8000/api";

/// Canned reply for one accepted connection.
pub enum MockResponse {
    Fixed {
        status: u16,
        content_type: &'static str,
        body: Vec<u8>,
    },
    /// Chunked transfer encoding, one HTTP chunk per entry, flushed with a
    /// short pause in between.
    Streamed { status: u16, chunks: Vec<Vec<u8>> },
    /// Like `Streamed` but the connection closes before the terminating
    /// chunk, so the client sees a broken body.
    Truncated { status: u16, chunks: Vec<Vec<u8>> },
}

impl MockResponse {
    pub fn status(status: u16) -> Self {
        MockResponse::Fixed {
            status,
            content_type: "text/plain",
            body: Vec::new(),
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        MockResponse::Fixed {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn streamed(status: u16, chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        MockResponse::Streamed {
            status,
            chunks: chunks.into_iter().collect(),
        }
    }

    pub fn truncated(status: u16, chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        MockResponse::Truncated {
            status,
            chunks: chunks.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json_body(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

pub struct MockServer {
    /// Base URL including the `/api` prefix.
    pub base_url: String,
    handle: JoinHandle<Result<Vec<CapturedRequest>, String>>,
}

impl MockServer {
    /// Wait until every scripted response was served.
    pub async fn finish(self) -> Vec<CapturedRequest> {
        self.handle
            .await
            .expect("mock server task should join")
            .expect("mock server should succeed")
    }
}

/// Serve `responses` in order, one per connection, on a local port.
pub async fn spawn_mock_server(responses: Vec<MockResponse>) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");

    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().await.map_err(|err| err.to_string())?;
            captured.push(read_http_request(&mut stream).await?);
            write_response(&mut stream, response)
                .await
                .map_err(|err| err.to_string())?;
        }
        Ok(captured)
    });

    MockServer {
        base_url: format!("http://{addr}/api"),
        handle,
    }
}

pub fn test_http_client(base_url: &str) -> HttpChatClient {
    let client = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("test client should build");
    HttpChatClient::with_client(client, base_url)
}

fn status_line(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown");
    format!("HTTP/1.1 {status} {reason}\r\n")
}

async fn write_response(stream: &mut TcpStream, response: MockResponse) -> std::io::Result<()> {
    match response {
        MockResponse::Fixed {
            status,
            content_type,
            body,
        } => {
            let head = format!(
                "{}content-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                status_line(status),
                body.len()
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(&body).await?;
        }
        MockResponse::Streamed { status, chunks } => {
            write_chunked(stream, status, &chunks).await?;
            stream.write_all(b"0\r\n\r\n").await?;
        }
        MockResponse::Truncated { status, chunks } => {
            write_chunked(stream, status, &chunks).await?;
        }
    }
    stream.flush().await?;
    stream.shutdown().await
}

async fn write_chunked(
    stream: &mut TcpStream,
    status: u16,
    chunks: &[Vec<u8>],
) -> std::io::Result<()> {
    let head = format!(
        "{}content-type: text/plain; charset=utf-8\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
        status_line(status)
    );
    stream.write_all(head.as_bytes()).await?;
    stream.flush().await?;
    for chunk in chunks {
        stream
            .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
            .await?;
        stream.write_all(chunk).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text = std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

type ChunkHook = Arc<dyn Fn(usize) + Send + Sync>;

/// In-process backend that replays canned chunks.
pub struct ScriptedBackend {
    chunks: Vec<String>,
    fail_with: Option<StatusCode>,
    login_status: Option<StatusCode>,
    login_payload: Value,
    before_chunk: Option<ChunkHook>,
    histories: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn replying(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|chunk| chunk.to_string()).collect(),
            fail_with: None,
            login_status: None,
            login_payload: Value::Null,
            before_chunk: None,
            histories: Mutex::new(Vec::new()),
        }
    }

    /// Deliver the chunks, then fail as if the server returned `status`.
    pub fn failing_after(mut self, status: StatusCode) -> Self {
        self.fail_with = Some(status);
        self
    }

    pub fn rejecting_login(mut self, status: StatusCode) -> Self {
        self.login_status = Some(status);
        self
    }

    pub fn with_login_payload(mut self, payload: Value) -> Self {
        self.login_payload = payload;
        self
    }

    /// Run `hook(index)` right before chunk `index` is delivered.
    pub fn before_chunk(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.before_chunk = Some(Arc::new(hook));
        self
    }

    /// Every history passed to `stream_response`, unfiltered.
    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.histories.lock().expect("history lock").clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn login(&self, _email: &str, _password: &str) -> Result<Value, AuthError> {
        match self.login_status {
            Some(status) => Err(AuthError::Status(status)),
            None => Ok(self.login_payload.clone()),
        }
    }

    async fn stream_response(
        &self,
        history: &[Message],
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<(), StreamError> {
        self.histories
            .lock()
            .expect("history lock")
            .push(history.to_vec());

        for (index, chunk) in self.chunks.iter().enumerate() {
            if let Some(hook) = &self.before_chunk {
                hook(index);
            }
            tokio::task::yield_now().await;
            on_chunk(chunk.as_str());
        }

        match self.fail_with {
            Some(status) => {
                on_chunk(connection_error_notice(TEST_BASE_URL).as_str());
                Err(StreamInitError::Status(status).into())
            }
            None => Ok(()),
        }
    }
}
