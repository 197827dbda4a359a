use crate::error::DeliveryError;
use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An outgoing JSON POST
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    /// Extra headers; `Content-Type: application/json` is always sent
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl OutboundRequest {
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Trait for the network layer underneath the delivery channels
///
/// Resolves to the HTTP status code of the response. Judging whether the
/// status counts as success is left to the caller.
pub trait Transport: Send + Sync {
    fn post<'a>(
        &'a self,
        request: OutboundRequest,
    ) -> Pin<Box<dyn Future<Output = Result<u16, DeliveryError>> + Send + 'a>>;
}

/// reqwest-backed transport with a bounded per-request timeout
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Transport` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post<'a>(
        &'a self,
        request: OutboundRequest,
    ) -> Pin<Box<dyn Future<Output = Result<u16, DeliveryError>> + Send + 'a>> {
        Box::pin(async move {
            debug!("POST {}", request.url);
            let mut builder = self.client.post(&request.url).json(&request.body);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let response = builder.send().await?;
            Ok(response.status().as_u16())
        })
    }
}

/// Scripted response for a URL registered on `MockTransport`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockResponse {
    Status(u16),
    NetworkError,
    Timeout,
}

/// In-memory transport for tests
///
/// Records every request and answers 200 unless a response was scripted
/// for the request URL. Clones share the same recording.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    requests: Arc<Mutex<Vec<OutboundRequest>>>,
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response returned for requests to `url`
    pub fn respond_with(self, url: impl Into<String>, response: MockResponse) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(url.into(), response);
        }
        self
    }

    /// Delay every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All requests received so far, in arrival order
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Requests whose body carries the given `action` field
    pub fn requests_with_action(&self, action: &str) -> Vec<OutboundRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.body.get("action").and_then(Value::as_str) == Some(action))
            .collect()
    }
}

impl Transport for MockTransport {
    fn post<'a>(
        &'a self,
        request: OutboundRequest,
    ) -> Pin<Box<dyn Future<Output = Result<u16, DeliveryError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let scripted = self
                .responses
                .lock()
                .ok()
                .and_then(|responses| responses.get(&request.url).copied());

            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }

            match scripted.unwrap_or(MockResponse::Status(200)) {
                MockResponse::Status(status) => Ok(status),
                MockResponse::NetworkError => {
                    Err(DeliveryError::Transport("connection refused".to_string()))
                }
                MockResponse::Timeout => Err(DeliveryError::Timeout),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_transport_records_requests() {
        let transport = MockTransport::new();
        let request = OutboundRequest::new("https://hooks.example.com", json!({"action": "send_text"}))
            .with_header("DD-API-KEY", "k");

        let status = transport.post(request.clone()).await.unwrap();

        assert_eq!(status, 200);
        assert_eq!(transport.requests(), vec![request]);
        assert_eq!(transport.requests_with_action("send_text").len(), 1);
        assert_eq!(transport.requests()[0].header("dd-api-key"), Some("k"));
    }

    #[tokio::test]
    async fn test_mock_transport_scripted_responses() {
        let transport = MockTransport::new()
            .respond_with("https://a.example.com", MockResponse::Status(503))
            .respond_with("https://b.example.com", MockResponse::NetworkError)
            .respond_with("https://c.example.com", MockResponse::Timeout);

        let a = transport
            .post(OutboundRequest::new("https://a.example.com", json!({})))
            .await;
        let b = transport
            .post(OutboundRequest::new("https://b.example.com", json!({})))
            .await;
        let c = transport
            .post(OutboundRequest::new("https://c.example.com", json!({})))
            .await;

        assert_eq!(a.unwrap(), 503);
        assert!(matches!(b, Err(DeliveryError::Transport(_))));
        assert!(matches!(c, Err(DeliveryError::Timeout)));
        // Failed requests are still recorded
        assert_eq!(transport.request_count(), 3);
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }

    // Integration test against a real endpoint would require network access
    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn test_http_transport_unreachable_host() {
        let transport = HttpTransport::new(Duration::from_millis(500)).unwrap();
        let result = transport
            .post(OutboundRequest::new("http://127.0.0.1:9/notify", json!({})))
            .await;
        assert!(result.is_err());
    }
}
