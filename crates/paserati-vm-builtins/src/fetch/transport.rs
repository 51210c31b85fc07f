//! The wire transport behind `fetch`.
//!
//! Transport is a trait so tests can substitute a mock and observe exactly
//! which requests reach the network. The production implementation is a
//! pooled `reqwest` client with automatic redirects disabled: redirect
//! policy (follow/error/manual, 20-hop cap) is driven by the fetch worker,
//! which needs to see every hop.

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// A request as it goes on the wire.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

/// A single hop's response.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub url: String,
}

impl WireResponse {
    /// The `Location` header of a redirect hop, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("location"))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

pub type TransportFuture = Pin<Box<dyn Future<Output = Result<WireResponse, String>> + Send>>;

/// One HTTP exchange, no redirect following.
pub trait Transport: Send + Sync {
    fn execute(&self, request: WireRequest) -> TransportFuture;
}

/// Production transport over a shared `reqwest` client.
pub struct HttpTransport {
    client: OnceLock<Client>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> &Client {
        self.client.get_or_init(|| {
            Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .pool_max_idle_per_host(32)
                .pool_idle_timeout(Duration::from_secs(90))
                .connect_timeout(Duration::from_secs(30))
                .timeout(Duration::from_secs(300))
                .build()
                .expect("HTTP client construction only fails on TLS misconfiguration")
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: WireRequest) -> TransportFuture {
        let client = self.client().clone();
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(request.method.as_bytes())
                .map_err(|_| format!("Invalid HTTP method: {}", request.method))?;

            let mut headers = HeaderMap::new();
            for (name, value) in &request.headers {
                if let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    headers.append(name, value);
                }
            }

            let mut builder = client.request(method, &request.url).headers(headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| e.to_string())?;
            let status = response.status();
            let url = response.url().to_string();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.bytes().await.map_err(|e| e.to_string())?.to_vec();

            Ok(WireResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                headers,
                body,
                url,
            })
        })
    }
}

/// Test transport: canned responses, recorded requests.
pub struct MockTransport {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<WireResponse, String>>>,
    requests: parking_lot::Mutex<Vec<WireRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            requests: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: WireResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    pub fn push_error(&self, error: impl Into<String>) {
        self.responses.lock().push_back(Err(error.into()));
    }

    /// Requests that actually reached the transport.
    pub fn recorded(&self) -> Vec<WireRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: WireRequest) -> TransportFuture {
        self.requests.lock().push(request);
        let next = self.responses.lock().pop_front();
        Box::pin(async move {
            next.unwrap_or_else(|| Err("mock transport exhausted".to_string()))
        })
    }
}

/// Simple 200 response helper for tests.
pub fn ok_response(url: &str, body: &[u8], content_type: &str) -> WireResponse {
    WireResponse {
        status: 200,
        status_text: "OK".to_string(),
        headers: vec![("content-type".to_string(), content_type.to_string())],
        body: body.to_vec(),
        url: url.to_string(),
    }
}
