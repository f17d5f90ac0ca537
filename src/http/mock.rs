use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{HttpClient, HttpError, HttpResponse, HttpResult};

/// In-memory HTTP client serving canned responses
///
/// Unknown URLs answer 404. Every request URL is recorded so tests can assert
/// on what was fetched.
pub struct MockHttpClient {
    responses: HashMap<String, (u16, Vec<u8>)>,
    simulate_failure: bool,
    requests: Mutex<Vec<String>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            simulate_failure: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serve `body` with status 200 for `url`
    pub fn with_body(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.with_response(url, 200, body)
    }

    /// Serve a response with an explicit status for `url`
    pub fn with_response(mut self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.into(), (status, body.into()));
        self
    }

    /// Fail every request with a network error
    pub fn with_failure(mut self) -> Self {
        self.simulate_failure = true;
        self
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str) -> HttpResult<HttpResponse> {
        self.get_with_headers(url, &[]).await
    }

    async fn get_with_headers(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
    ) -> HttpResult<HttpResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        if self.simulate_failure {
            return Err(HttpError::Network {
                message: "Simulated network failure".to_string(),
            });
        }

        let (status, body) = self
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| (404, Vec::new()));
        tracing::debug!("Mock HTTP client answering {} for {}", status, url);

        Ok(HttpResponse {
            status,
            body,
            headers: HashMap::new(),
        })
    }

    async fn test_connectivity(&self, _url: &str) -> HttpResult<()> {
        if self.simulate_failure {
            Err(HttpError::Network {
                message: "Mock failure enabled".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
