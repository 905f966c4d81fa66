//! Market-data service client
//!
//! The four tools are read-only GET endpoints on a remote data service,
//! parameterized by ticker symbol. The service may answer HTTP 200 with an
//! error body while it is cold-starting; see [`is_soft_error`].

pub mod retry;

pub use retry::{RetryFailure, RetryPolicy};

use crate::error::FetchError;
use crate::models::ToolId;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Remote data operations the dispatcher depends on
#[async_trait]
pub trait MarketDataService: Send + Sync {
    /// Run one tool for one symbol
    async fn fetch(&self, tool: ToolId, symbol: &str) -> std::result::Result<Value, FetchError>;

    /// Touch the service so a cold instance starts booting
    async fn ping(&self) -> std::result::Result<Value, FetchError>;
}

/// HTTP client for the financial data service
#[derive(Clone)]
pub struct McpClient {
    client: Client,
    base_url: String,
}

impl McpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str) -> std::result::Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET market data");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Transport(format!(
                "Data service returned {} for {}: {}",
                status, path, body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| match FetchError::from(e) {
                FetchError::Transport(msg) => {
                    FetchError::Transport(format!("Invalid JSON response: {}", msg))
                }
                timeout => timeout,
            })
    }
}

#[async_trait]
impl MarketDataService for McpClient {
    async fn fetch(&self, tool: ToolId, symbol: &str) -> std::result::Result<Value, FetchError> {
        self.get_json(&tool.endpoint(symbol)).await
    }

    async fn ping(&self) -> std::result::Result<Value, FetchError> {
        self.get_json("/").await
    }
}

/// True when a success-transport payload nonetheless reports an error
pub fn is_soft_error(payload: &Value) -> bool {
    let Some(obj) = payload.as_object() else {
        return false;
    };

    let has_error_key = obj.get("error").is_some_and(|e| !e.is_null());
    let status_error = obj
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("error"));

    has_error_key || status_error
}

/// Human-readable message carried by a soft-error payload, if any
pub fn soft_error_message(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}
