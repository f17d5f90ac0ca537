use async_trait::async_trait;
use std::sync::Arc;

use super::StorageAccess;
use crate::http::{HttpClient, network_error};
use crate::{NetworkError, Result, TilerError};

/// Remote file store reached over HTTP with a bearer credential
pub struct HttpStorage {
    base_url: String,
    token: String,
    client: Arc<dyn HttpClient>,
}

impl HttpStorage {
    /// Create a storage handle for `base_url`, authenticating with `token`
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of a file in the store
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl StorageAccess for HttpStorage {
    fn storage_type(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url_for(path);
        let authorization = format!("Bearer {}", self.token);

        let response = self
            .client
            .get_with_headers(&url, &[("Authorization", authorization.as_str())])
            .await
            .map_err(|e| network_error(&url, e))?;

        if !response.is_success() {
            return Err(TilerError::Network(NetworkError::HttpError {
                url,
                status: response.status,
            }));
        }

        tracing::debug!("Fetched {} bytes from {}", response.body.len(), url);
        Ok(response.body)
    }

    async fn test_availability(&self) -> Result<()> {
        self.client
            .test_connectivity(&self.base_url)
            .await
            .map_err(|e| network_error(&self.base_url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpError, HttpResponse, HttpResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records requests and answers with a fixed status
    struct RecordingClient {
        status: u16,
        seen: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    #[async_trait]
    impl HttpClient for RecordingClient {
        async fn get(&self, url: &str) -> HttpResult<HttpResponse> {
            self.get_with_headers(url, &[]).await
        }

        async fn get_with_headers(
            &self,
            url: &str,
            headers: &[(&str, &str)],
        ) -> HttpResult<HttpResponse> {
            self.seen.lock().unwrap().push((
                url.to_string(),
                headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
            Ok(HttpResponse {
                status: self.status,
                body: b"grid".to_vec(),
                headers: HashMap::new(),
            })
        }

        async fn test_connectivity(&self, _url: &str) -> HttpResult<()> {
            Err(HttpError::Timeout { seconds: 3 })
        }
    }

    fn client(status: u16) -> Arc<RecordingClient> {
        Arc::new(RecordingClient {
            status,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_token() {
        let recording = client(200);
        let storage = HttpStorage::new("https://drive.example.com/grids/", "s3cret", recording.clone());

        let body = storage.fetch("/global.parquet").await.unwrap();
        assert_eq!(body, b"grid".to_vec());

        let seen = recording.seen.lock().unwrap();
        assert_eq!(seen[0].0, "https://drive.example.com/grids/global.parquet");
        assert_eq!(
            seen[0].1,
            vec![("Authorization".to_string(), "Bearer s3cret".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_maps_http_status() {
        let storage = HttpStorage::new("https://drive.example.com", "t", client(403));
        match storage.fetch("global.parquet").await {
            Err(TilerError::Network(NetworkError::HttpError { status, .. })) => assert_eq!(status, 403),
            other => panic!("Expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_availability_maps_timeout() {
        let storage = HttpStorage::new("https://drive.example.com", "t", client(200));
        assert!(matches!(
            storage.test_availability().await,
            Err(TilerError::Network(NetworkError::Timeout { seconds: 3 }))
        ));
    }
}
