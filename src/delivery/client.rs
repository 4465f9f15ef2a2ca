//! Killboard transport - the HTTP seam of the delivery queue
//!
//! The queue only sees [`Transport`]; production uses [`ReqwestTransport`],
//! tests use scripted stubs.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// A fully resolved request, headers included.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub api_key: String,
    pub client_version: String,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// No response at all: DNS, refused, reset, timeout.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking-free HTTP transport on top of `reqwest`.
///
/// No request timeout is set; the only bounded wait in the delivery path
/// is the rate-limit cooldown.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            HttpMethod::Get => self.http.get(&request.url),
            HttpMethod::Post => self.http.post(&request.url),
        };

        let mut builder = builder
            .header(AUTHORIZATION, format!("Bearer {}", request.api_key))
            .header("X-Client-Version", &request.client_version)
            .header(ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(classify_reqwest_error)?;
        let status = resp.status().as_u16();
        // The status decides what happens to the command; a lost body must not hide it.
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(status, error = %e, "Failed to read response body");
                String::new()
            }
        };
        Ok(HttpResponse { status, body })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_connect() || e.is_timeout() {
        TransportError::Connection(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
        assert!(!HttpResponse::new(429, "").is_success());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connection_error() {
        let transport = ReqwestTransport::new().expect("client");
        let result = transport
            .send(HttpRequest {
                method: HttpMethod::Get,
                url: "http://127.0.0.1:9/api/user".to_string(),
                api_key: "k".to_string(),
                client_version: "test".to_string(),
                body: None,
            })
            .await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }

    #[tokio::test]
    async fn truncated_body_keeps_the_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 429 Too Many Requests\r\nContent-Length: 100\r\n\r\nshort")
                .await
                .unwrap();
        });

        let transport = ReqwestTransport::new().expect("client");
        let response = transport
            .send(HttpRequest {
                method: HttpMethod::Get,
                url: format!("http://{addr}/api/user"),
                api_key: "k".to_string(),
                client_version: "test".to_string(),
                body: None,
            })
            .await
            .expect("status line was received");
        assert_eq!(response.status, 429);
        assert!(response.body.is_empty());
    }
}
