//! Transport boundary to the dependency.
//!
//! # Responsibilities
//! - Issue one request/response exchange per attempt
//! - Classify the result as success, REMOTE_ERROR or CONNECTION_ERROR
//!
//! # Design Decisions
//! - Deadlines are enforced by the caller (`timeouts.rs`), not the transport
//! - Any non-2xx answer is a remote failure; the payload is opaque bytes

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::CallError;

/// Opaque request sent to the dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Path relative to the dependency's base URL; empty means the base URL itself.
    pub path: String,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            payload: Vec::new(),
        }
    }
}

/// Successful answer from the dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One logical exchange with the dependency.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, CallError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, CallError>> + Send {
        (**self).send(request)
    }
}

/// HTTP transport backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    connect_timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(base_url, Duration::from_secs(2))
    }

    pub fn with_connect_timeout(base_url: Url, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            base_url,
            connect_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &Request) -> Result<Url, CallError> {
        if request.path.is_empty() {
            return Ok(self.base_url.clone());
        }
        self.base_url
            .join(&request.path)
            .map_err(|e| CallError::Connection { reason: format!("invalid request path: {}", e) })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, CallError>> + Send {
        let url = self.url_for(request);
        let connect_timeout = self.connect_timeout;
        let builder = url.map(|url| {
            if request.payload.is_empty() {
                self.client.get(url)
            } else {
                self.client.post(url).body(request.payload.clone())
            }
        });

        async move {
            let response = builder?.send().await.map_err(|e| classify(e, connect_timeout))?;
            let status = response.status();
            if !status.is_success() {
                return Err(CallError::Remote { status: status.as_u16() });
            }
            let body = response.bytes().await.map_err(|e| classify(e, connect_timeout))?;
            Ok(Response {
                status: status.as_u16(),
                body: body.to_vec(),
            })
        }
    }
}

fn classify(e: reqwest::Error, connect_timeout: Duration) -> CallError {
    if e.is_connect() {
        // includes connect timeouts: the dependency was never reached
        CallError::Connection { reason: e.to_string() }
    } else if e.is_timeout() {
        CallError::Timeout { after: connect_timeout }
    } else {
        CallError::Connection { reason: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_empty_path_is_base() {
        let t = HttpTransport::new(Url::parse("http://backend:8000/work").unwrap()).unwrap();
        assert_eq!(t.url_for(&Request::default()).unwrap().as_str(), "http://backend:8000/work");
        assert_eq!(
            t.url_for(&Request::get("/health")).unwrap().as_str(),
            "http://backend:8000/health"
        );
    }

    #[tokio::test]
    async fn test_unreachable_dependency_is_connection_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let t = HttpTransport::new(Url::parse("http://127.0.0.1:9/work").unwrap()).unwrap();
        let err = t.send(&Request::default()).await.unwrap_err();
        assert!(matches!(err, CallError::Connection { .. }));
    }
}
