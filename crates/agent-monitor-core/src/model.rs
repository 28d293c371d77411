use crate::errors::MonitorError;

/// Parameters for one agent run, sent as the JSON body of the run request.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RunRequest {
    /// Asset the agent should decide on (for example `BTC`).
    pub coin_name: String,
    /// Maximum number of decide/evaluate attempts. At least 1.
    pub max_retries: u32,
}

impl RunRequest {
    /// Creates a validated run request.
    pub fn new(coin_name: impl Into<String>, max_retries: u32) -> Result<Self, MonitorError> {
        let coin_name = coin_name.into().trim().to_string();
        if coin_name.is_empty() {
            return Err(MonitorError::Validation(
                "coin_name must not be empty".into(),
            ));
        }
        if max_retries == 0 {
            return Err(MonitorError::Validation(
                "max_retries must be at least 1".into(),
            ));
        }
        Ok(Self {
            coin_name,
            max_retries,
        })
    }
}

/// An asset the agent knows how to trade.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Coin {
    pub symbol: String,
    pub name: String,
}

/// Response of the agent's health endpoint.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}
