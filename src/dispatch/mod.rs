//! Tool dispatcher
//!
//! Runs one tool for every requested symbol, one symbol at a time, each
//! behind the same retry policy. A failing symbol never stops the others.

use crate::error::FetchError;
use crate::models::{SymbolSet, ToolErrorKind, ToolId, ToolResult, ToolResults};
use crate::tools::{is_soft_error, soft_error_message, MarketDataService, RetryFailure, RetryPolicy};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct ToolDispatcher {
    service: Arc<dyn MarketDataService>,
    retry: RetryPolicy,
}

impl ToolDispatcher {
    pub fn new(service: Arc<dyn MarketDataService>, retry: RetryPolicy) -> Self {
        Self { service, retry }
    }

    pub fn service(&self) -> &Arc<dyn MarketDataService> {
        &self.service
    }

    /// Fetch `tool` for each symbol, in order
    pub async fn dispatch(&self, tool: ToolId, symbols: &SymbolSet) -> ToolResults {
        let mut results = ToolResults::with_capacity(symbols.len());

        for symbol in symbols {
            let start = Instant::now();
            let result = self.fetch_with_retry(tool, symbol).await;

            debug!(
                tool = %tool,
                symbol = %symbol,
                failed = result.is_error(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Tool call finished"
            );

            results.insert(symbol.clone(), result);
        }

        info!(
            tool = %tool,
            symbols = results.len(),
            failures = results.values().filter(|r| r.is_error()).count(),
            "Dispatch completed"
        );

        results
    }

    async fn fetch_with_retry(&self, tool: ToolId, symbol: &str) -> ToolResult {
        let operation_name = format!("{}({})", tool, symbol);

        let outcome = self
            .retry
            .execute(
                &operation_name,
                || self.service.fetch(tool, symbol),
                is_soft_error,
            )
            .await;

        match outcome {
            Ok(payload) => ToolResult::Success(payload),
            Err(RetryFailure::Error(FetchError::Timeout(_))) => {
                warn!(tool = %tool, symbol = %symbol, "Data service timed out on every attempt");
                ToolResult::failure(
                    ToolErrorKind::McpTimeout,
                    "Data service took too long to respond (possible cold start).",
                )
            }
            Err(RetryFailure::Error(FetchError::Transport(message))) => {
                warn!(tool = %tool, symbol = %symbol, error = %message, "Data service request failed");
                ToolResult::failure(ToolErrorKind::McpError, message)
            }
            Err(RetryFailure::Rejected(payload)) => {
                let message = soft_error_message(&payload);
                warn!(tool = %tool, symbol = %symbol, error = %message, "Data service kept returning an error payload");
                ToolResult::failure(
                    ToolErrorKind::McpRetryFailed,
                    format!(
                        "Data service returned an error after {} attempts: {}",
                        self.retry.max_attempts, message
                    ),
                )
            }
        }
    }
}

/// True when there is at least one result and every result is an error
pub fn all_failed(results: &ToolResults) -> bool {
    !results.is_empty() && results.values().all(ToolResult::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{symbols, ScriptedDataService};
    use serde_json::json;
    use std::time::Duration;

    fn dispatcher(service: Arc<ScriptedDataService>) -> ToolDispatcher {
        ToolDispatcher::new(service, RetryPolicy::new(2, Duration::from_secs(3)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_on_every_attempt() {
        let service = Arc::new(ScriptedDataService::new());
        service.always("AAPL", Err(FetchError::Timeout("deadline".into())));

        let started = tokio::time::Instant::now();
        let results = dispatcher(service.clone())
            .dispatch(ToolId::GetCurrentPrice, &symbols(&["AAPL"]))
            .await;

        match &results["AAPL"] {
            ToolResult::Failure(failure) => {
                assert_eq!(failure.error, ToolErrorKind::McpTimeout);
                assert!(!failure.message.is_empty());
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(service.calls_for("AAPL"), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_maps_to_mcp_error() {
        let service = Arc::new(ScriptedDataService::new());
        service.always("MSFT", Err(FetchError::Transport("connection refused".into())));

        let results = dispatcher(service.clone())
            .dispatch(ToolId::GetFundamentals, &symbols(&["MSFT"]))
            .await;

        assert_eq!(
            results["MSFT"],
            ToolResult::failure(ToolErrorKind::McpError, "connection refused")
        );
        assert_eq!(service.calls_for("MSFT"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_error_retried_then_succeeds() {
        let service = Arc::new(ScriptedDataService::new());
        service.script(
            "TSLA",
            vec![
                Ok(json!({"status": "error", "message": "warming up"})),
                Ok(json!({"status": "success", "symbol": "TSLA", "price": 250.0})),
            ],
        );

        let results = dispatcher(service.clone())
            .dispatch(ToolId::GetCurrentPrice, &symbols(&["TSLA"]))
            .await;

        assert!(!results["TSLA"].is_error());
        assert_eq!(service.calls_for("TSLA"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_soft_error() {
        let service = Arc::new(ScriptedDataService::new());
        service.always("NVDA", Ok(json!({"status": "error", "message": "Historical data unavailable"})));

        let results = dispatcher(service)
            .dispatch(ToolId::PredictVolatility, &symbols(&["NVDA"]))
            .await;

        match &results["NVDA"] {
            ToolResult::Failure(failure) => {
                assert_eq!(failure.error, ToolErrorKind::McpRetryFailed);
                assert!(failure.message.contains("Historical data unavailable"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_keeps_order_and_every_symbol() {
        let service = Arc::new(ScriptedDataService::new());
        service.always("AAPL", Ok(json!({"status": "success", "symbol": "AAPL"})));
        service.always("MSFT", Err(FetchError::Timeout("deadline".into())));
        service.always("GOOGL", Ok(json!({"status": "success", "symbol": "GOOGL"})));

        let results = dispatcher(service.clone())
            .dispatch(ToolId::GetFundamentals, &symbols(&["AAPL", "MSFT", "GOOGL"]))
            .await;

        let keys: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["AAPL", "MSFT", "GOOGL"]);
        assert!(results["MSFT"].is_error());
        assert!(!all_failed(&results));
        assert_eq!(service.calls_for("AAPL"), 1);
        assert_eq!(service.calls_for("GOOGL"), 1);
    }

    #[test]
    fn test_all_failed() {
        let mut results = ToolResults::new();
        assert!(!all_failed(&results));

        results.insert("AAPL".into(), ToolResult::failure(ToolErrorKind::McpError, "x"));
        results.insert("MSFT".into(), ToolResult::failure(ToolErrorKind::McpTimeout, "y"));
        assert!(all_failed(&results));

        results.insert("TSLA".into(), ToolResult::Success(json!({"price": 1.0})));
        assert!(!all_failed(&results));
    }
}
