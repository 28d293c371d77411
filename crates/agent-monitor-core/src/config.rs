use std::time::Duration;

use crate::errors::MonitorError;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Connection settings for the agent API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Base URL of the agent server.
    pub base_url: String,
    /// Timeout for establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
    /// Total timeout for the short JSON endpoints. The run stream has none.
    pub request_timeout: Duration,
    /// Retry budget used when the caller does not pick one.
    pub default_max_retries: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            default_max_retries: 3,
        }
    }
}

impl MonitorConfig {
    /// Builds a config from `AGENT_MONITOR_*` variables, falling back to defaults.
    ///
    /// - `AGENT_MONITOR_BASE_URL`
    /// - `AGENT_MONITOR_CONNECT_TIMEOUT_SECS`
    /// - `AGENT_MONITOR_REQUEST_TIMEOUT_SECS`
    /// - `AGENT_MONITOR_MAX_RETRIES`
    pub fn from_env() -> Result<Self, MonitorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MonitorError> {
        let mut config = Self::default();
        if let Some(url) = lookup("AGENT_MONITOR_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "AGENT_MONITOR_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "AGENT_MONITOR_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var::<u32>(&lookup, "AGENT_MONITOR_MAX_RETRIES")? {
            config.default_max_retries = retries;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(MonitorError::Config(format!(
                "base_url must start with http:// or https:// (got {url:?})"
            )));
        }
        if self.default_max_retries == 0 {
            return Err(MonitorError::Config(
                "AGENT_MONITOR_MAX_RETRIES must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, MonitorError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MonitorError::Config(format!("invalid value for {key}: {raw:?}"))),
        _ => Ok(None),
    }
}
