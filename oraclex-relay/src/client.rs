/// HTTP client for the relay service
///
/// Provides the [`RelaySource`] seam used by the fetch coordinator and the
/// production implementation over `reqwest`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{
    config::RelayConfig,
    error::RelayError,
    model::{
        analysis::{analyses_from_value, analysis_from_value, AnalysisMap, AnalysisRecord},
        market::MarketState,
    },
};

pub const MARKET_STATE_PATH: &str = "get-market-state";
pub const LATEST_ANALYSIS_PATH: &str = "latest-analysis";
pub const ANALYSIS_PATH: &str = "analysis";

/// Upstream collaborator supplying market state and analysis.
#[async_trait]
pub trait RelaySource: Send + Sync {
    /// `GET /get-market-state`
    async fn market_state(&self) -> Result<MarketState, RelayError>;

    /// `GET /analysis/{symbol}`
    async fn analysis(&self, symbol: &str) -> Result<AnalysisRecord, RelayError>;

    /// `GET /latest-analysis`
    async fn latest_analyses(&self) -> Result<AnalysisMap, RelayError>;

    /// Human readable location, used in progress messages
    fn describe(&self) -> String;
}

/// `reqwest` backed relay client
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base: Url,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let base = base_url(&config.base_url)?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| RelayError::Request {
                endpoint: base.to_string(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            http,
            base,
            timeout: config.request_timeout,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a relay path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url, RelayError> {
        self.base.join(path).map_err(|error| RelayError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            reason: error.to_string(),
        })
    }

    async fn get_json(&self, url: Url) -> Result<Value, RelayError> {
        let endpoint = url.to_string();
        debug!(%endpoint, "relay GET");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| RelayError::from_reqwest(&endpoint, self.timeout, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|error| RelayError::from_reqwest(&endpoint, self.timeout, error))
    }
}

#[async_trait]
impl RelaySource for RelayClient {
    async fn market_state(&self) -> Result<MarketState, RelayError> {
        let url = self.endpoint(MARKET_STATE_PATH)?;
        let endpoint = url.to_string();
        let payload = self.get_json(url).await?;
        MarketState::from_value(&endpoint, payload)
    }

    async fn analysis(&self, symbol: &str) -> Result<AnalysisRecord, RelayError> {
        let url = self.endpoint(&format!("{ANALYSIS_PATH}/{}", symbol.trim()))?;
        let endpoint = url.to_string();
        let payload = self.get_json(url).await?;
        analysis_from_value(&endpoint, symbol, payload)
    }

    async fn latest_analyses(&self) -> Result<AnalysisMap, RelayError> {
        let url = self.endpoint(LATEST_ANALYSIS_PATH)?;
        let endpoint = url.to_string();
        let payload = self.get_json(url).await?;
        analyses_from_value(&endpoint, payload)
    }

    fn describe(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }
}

/// Parse the configured base URL, making sure relative joins append to its path
fn base_url(raw: &str) -> Result<Url, RelayError> {
    let mut url = Url::parse(raw.trim()).map_err(|error| RelayError::InvalidUrl {
        url: raw.to_string(),
        reason: error.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(RelayError::InvalidUrl {
            url: raw.to_string(),
            reason: "cannot be a base URL".to_string(),
        });
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
