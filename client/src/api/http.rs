use super::{ResearchApi, Result};
use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::{Method, Url};
use sdk::errors::{ClientError, TransportError};
use sdk::types::{Ack, ChatRequest, ChatResponse, Snapshot, StartRequest, StartResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// reqwest-backed research backend client
pub struct HttpResearchApi {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpResearchApi {
    /// Create a client from the `[api]` configuration section
    pub fn new(config: &ApiConfig) -> std::result::Result<Self, ClientError> {
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|e| ClientError::Config(format!("Invalid base_url: {}", e)))?;

        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "Invalid base_url '{}': cannot carry a path",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Network("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B, T>(&self, method: Method, segments: &[&str], body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Network(format!("request timed out: {}", e))
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: error_message(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }
}

/// Prefer the backend's `{"error": "..."}` message over the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl ResearchApi for HttpResearchApi {
    async fn start(&self, request: &StartRequest) -> Result<StartResponse> {
        self.send(Method::POST, &["research", "start"], Some(request))
            .await
    }

    async fn status(&self, process_id: &str) -> Result<Snapshot> {
        self.send::<(), _>(Method::GET, &["research", "status", process_id], None)
            .await
    }

    async fn confirm(&self, process_id: &str) -> Result<Ack> {
        self.send::<(), _>(Method::POST, &["research", "confirm", process_id], None)
            .await
    }

    async fn cancel(&self, process_id: &str) -> Result<Ack> {
        self.send::<(), _>(Method::POST, &["research", "cancel", process_id], None)
            .await
    }

    async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.send(Method::POST, &["chat", "question"], Some(request))
            .await
    }
}
