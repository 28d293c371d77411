use futures::TryStreamExt as _;
use tracing::debug;

use crate::config::MonitorConfig;
use crate::errors::{MonitorError, SourceError};
use crate::model::{Coin, HealthStatus, RunRequest};
use crate::source::{EventByteStream, EventSource};

#[derive(serde::Deserialize)]
struct CoinsResponse {
    coins: Vec<Coin>,
}

/// HTTP client for the agent server.
///
/// Implements [`EventSource`] over `POST /api/run` and exposes the auxiliary
/// coin list and health endpoints.
#[derive(Clone)]
pub struct AgentClient {
    client: reqwest::Client,
    config: MonitorConfig,
}

impl AgentClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| MonitorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a client using `AGENT_MONITOR_*` environment variables.
    pub fn from_env() -> Result<Self, MonitorError> {
        Self::new(MonitorConfig::from_env()?)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Lists the coins the agent supports.
    pub async fn coins(&self) -> Result<Vec<Coin>, MonitorError> {
        let body: CoinsResponse = self.get_json("/api/coins").await?;
        Ok(body.coins)
    }

    /// Queries the agent's health endpoint.
    pub async fn health(&self) -> Result<HealthStatus, MonitorError> {
        self.get_json("/api/health").await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, MonitorError> {
        let url = self.config.endpoint(path);
        debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| SourceError::transport(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::status(status.as_u16(), body).into());
        }
        response
            .json::<T>()
            .await
            .map_err(|e| MonitorError::Decode(format!("unexpected response from {url}: {e}")))
    }
}

#[async_trait::async_trait]
impl EventSource for AgentClient {
    async fn open(&self, request: &RunRequest) -> Result<EventByteStream, SourceError> {
        let url = self.config.endpoint("/api/run");
        debug!(%url, coin = %request.coin_name, max_retries = request.max_retries, "opening run stream");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| SourceError::transport(format!("run request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SourceError::status(status.as_u16(), body));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| SourceError::stream(e.to_string()));
        Ok(Box::pin(stream))
    }
}
