//! In-process fakes for the two network collaborators

use crate::error::{AskError, FetchError};
use crate::llm::ChatModel;
use crate::models::{SymbolSet, ToolId, Turn};
use crate::tools::MarketDataService;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub fn symbols(list: &[&str]) -> SymbolSet {
    list.iter().map(|s| s.to_string()).collect()
}

/// Replies from a queue; falls back to a fixed answer once it runs dry
pub struct ScriptedModel {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: Mutex<Vec<(Vec<Turn>, Option<f32>)>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<std::result::Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<Turn>, Option<f32>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[Turn], temperature: Option<f32>) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), temperature));

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(AskError::LlmError(message)),
            None => Ok("scripted answer".to_string()),
        }
    }
}

#[derive(Default)]
struct SymbolScript {
    queue: VecDeque<std::result::Result<Value, FetchError>>,
    fallback: Option<std::result::Result<Value, FetchError>>,
    calls: u32,
}

/// Per-symbol scripted responses; unscripted symbols succeed
pub struct ScriptedDataService {
    scripts: Mutex<HashMap<String, SymbolScript>>,
    ping: Mutex<std::result::Result<Value, FetchError>>,
}

impl ScriptedDataService {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            ping: Mutex::new(Ok(json!({"status": "running"}))),
        }
    }

    /// Answer every call for `symbol` with `response`
    pub fn always(&self, symbol: &str, response: std::result::Result<Value, FetchError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .fallback = Some(response);
    }

    /// Answer successive calls for `symbol` in order
    pub fn script(&self, symbol: &str, responses: Vec<std::result::Result<Value, FetchError>>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .queue
            .extend(responses);
    }

    pub fn set_ping(&self, response: std::result::Result<Value, FetchError>) {
        *self.ping.lock().unwrap() = response;
    }

    pub fn calls_for(&self, symbol: &str) -> u32 {
        self.scripts
            .lock()
            .unwrap()
            .get(symbol)
            .map(|s| s.calls)
            .unwrap_or(0)
    }
}

#[async_trait]
impl MarketDataService for ScriptedDataService {
    async fn fetch(&self, tool: ToolId, symbol: &str) -> std::result::Result<Value, FetchError> {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry(symbol.to_string()).or_default();
        script.calls += 1;

        if let Some(next) = script.queue.pop_front() {
            return next;
        }

        script.fallback.clone().unwrap_or_else(|| {
            Ok(json!({
                "status": "success",
                "symbol": symbol,
                "tool": tool.as_str(),
            }))
        })
    }

    async fn ping(&self) -> std::result::Result<Value, FetchError> {
        self.ping.lock().unwrap().clone()
    }
}
