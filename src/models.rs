//! Core data models for the ask router

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message. Memory only ever holds user and assistant turns;
/// system turns exist only in prompts handed to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

//
// ================= Tools =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    GetCurrentPrice,
    GetFundamentals,
    PredictPriceTrend,
    PredictVolatility,
}

impl ToolId {
    pub const ALL: [ToolId; 4] = [
        ToolId::GetCurrentPrice,
        ToolId::GetFundamentals,
        ToolId::PredictPriceTrend,
        ToolId::PredictVolatility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::GetCurrentPrice => "get_current_price",
            ToolId::GetFundamentals => "get_fundamentals",
            ToolId::PredictPriceTrend => "predict_price_trend",
            ToolId::PredictVolatility => "predict_volatility",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolId::GetCurrentPrice => "latest traded price of a stock",
            ToolId::GetFundamentals => {
                "market cap, revenue, margins, beta, debt/equity, free cash flow, P/E (use for comparisons)"
            }
            ToolId::PredictPriceTrend => "short vs long moving-average trend direction with confidence",
            ToolId::PredictVolatility => "volatility score and risk level from recent daily returns",
        }
    }

    /// Short name shown to end users
    pub fn label(&self) -> &'static str {
        match self {
            ToolId::GetCurrentPrice => "current price",
            ToolId::GetFundamentals => "fundamentals",
            ToolId::PredictPriceTrend => "price trend",
            ToolId::PredictVolatility => "volatility",
        }
    }

    /// Path on the market-data service for this tool and symbol
    pub fn endpoint(&self, symbol: &str) -> String {
        match self {
            ToolId::GetCurrentPrice => format!("/price/{}", symbol),
            ToolId::GetFundamentals => format!("/fundamentals/{}", symbol),
            ToolId::PredictPriceTrend => format!("/ml/trend/{}", symbol),
            ToolId::PredictVolatility => format!("/ml/volatility/{}", symbol),
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolId::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| format!("unknown tool: {}", s))
    }
}

//
// ================= Routing =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Chat,
    CallTool,
}

/// Per-request routing outcome. `Chat` never carries a tool and `CallTool`
/// always carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    Chat,
    CallTool(ToolId),
}

/// Insertion-ordered, duplicate-free ticker symbols for one request
pub type SymbolSet = IndexSet<String>;

//
// ================= Tool Results =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolErrorKind {
    McpTimeout,
    McpError,
    McpRetryFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolFailure {
    pub error: ToolErrorKind,
    pub message: String,
}

/// Serialized untagged: a success is the raw service payload, a failure is
/// `{"error": KIND, "message": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResult {
    Failure(ToolFailure),
    Success(serde_json::Value),
}

impl ToolResult {
    pub fn failure(error: ToolErrorKind, message: impl Into<String>) -> Self {
        ToolResult::Failure(ToolFailure {
            error,
            message: message.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Failure(_))
    }
}

/// Per-symbol results, in symbol order
pub type ToolResults = IndexMap<String, ToolResult>;

//
// ================= HTTP I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AskResponse {
    pub answer: String,
    pub used_tools: Vec<String>,
    pub symbols: Vec<String>,
}
