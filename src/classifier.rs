//! Intent Classifier
//!
//! Decides whether a question is answered conversationally or needs one of
//! the market-data tools. Two tiers:
//! - Keyword rules, evaluated in a fixed order, first match wins
//! - The language model, consulted only when no rule matches
//!
//! Rules always override the model.

use crate::error::AskError;
use crate::llm::ChatModel;
use crate::models::{Action, RoutingDecision, SymbolSet, ToolId, Turn};
use crate::symbols::SymbolExtractor;
use crate::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Trigger vocabularies. Changing any entry changes routing behavior.
pub const GREETING_TOKENS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "howdy",
    "greetings",
    "what's up",
    "sup",
];

pub const PRICE_PHRASES: &[&str] = &[
    "current price",
    "stock price",
    "share price",
    "price of",
    "trading at",
    "how much is",
    "what's the price",
];

pub const COMPARISON_PHRASES: &[&str] = &["vs", "compare", "comparison", "difference", "between"];

pub const RISK_PHRASES: &[&str] = &["risk", "risky", "volatile", "volatility", "safe", "danger"];

pub const TREND_PHRASES: &[&str] = &["trend", "direction", "moving", "forecast", "predict", "outlook"];

/// Sampling temperature for the routing call; low to keep the JSON stable
const ROUTING_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    /// Question starts with (or is) a greeting token
    Greeting(&'static [&'static str]),
    /// Question contains any phrase
    Phrases(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub name: &'static str,
    pub trigger: Trigger,
    pub min_symbols: usize,
    pub decision: RoutingDecision,
}

/// Ordered rule chain
pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        name: "greeting",
        trigger: Trigger::Greeting(GREETING_TOKENS),
        min_symbols: 0,
        decision: RoutingDecision::Chat,
    },
    IntentRule {
        name: "price",
        trigger: Trigger::Phrases(PRICE_PHRASES),
        min_symbols: 1,
        decision: RoutingDecision::CallTool(ToolId::GetCurrentPrice),
    },
    IntentRule {
        name: "comparison",
        trigger: Trigger::Phrases(COMPARISON_PHRASES),
        min_symbols: 2,
        decision: RoutingDecision::CallTool(ToolId::GetFundamentals),
    },
    IntentRule {
        name: "risk",
        trigger: Trigger::Phrases(RISK_PHRASES),
        min_symbols: 1,
        decision: RoutingDecision::CallTool(ToolId::PredictVolatility),
    },
    IntentRule {
        name: "trend",
        trigger: Trigger::Phrases(TREND_PHRASES),
        min_symbols: 1,
        decision: RoutingDecision::CallTool(ToolId::PredictPriceTrend),
    },
];

impl IntentRule {
    pub fn matches(&self, normalized_question: &str, symbol_count: usize) -> bool {
        if symbol_count < self.min_symbols {
            return false;
        }
        match self.trigger {
            Trigger::Greeting(tokens) => tokens
                .iter()
                .any(|token| starts_with_word(normalized_question, token)),
            Trigger::Phrases(phrases) => phrases
                .iter()
                .any(|phrase| normalized_question.contains(phrase)),
        }
    }
}

/// Trim, case-fold and straighten curly apostrophes
pub fn normalize(question: &str) -> String {
    question.trim().to_lowercase().replace('\u{2019}', "'")
}

/// `text` equals `token` or begins with it followed by a non-alphanumeric char
fn starts_with_word(text: &str, token: &str) -> bool {
    match text.strip_prefix(token) {
        Some(rest) => rest.chars().next().map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    }
}

/// First matching rule, if any
pub fn classify_by_rules(question: &str, symbol_count: usize) -> Option<&'static IntentRule> {
    let normalized = normalize(question);
    INTENT_RULES
        .iter()
        .find(|rule| rule.matches(&normalized, symbol_count))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionSource {
    Rule(&'static str),
    Model,
    /// Model output unusable or model unreachable
    Default,
}

/// Routing decision together with the symbols the request will use
#[derive(Debug, Clone)]
pub struct Classification {
    pub decision: RoutingDecision,
    pub symbols: SymbolSet,
    pub source: DecisionSource,
}

/// Two-tier interaction classifier
pub struct IntentClassifier {
    model: Arc<dyn ChatModel>,
    extractor: SymbolExtractor,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            extractor: SymbolExtractor::new(),
        }
    }

    /// Classify a question given the symbols already extracted from it
    pub async fn classify(&self, question: &str, symbols: SymbolSet) -> Classification {
        if let Some(rule) = classify_by_rules(question, symbols.len()) {
            info!(rule = rule.name, decision = ?rule.decision, "Routed by rule");
            return Classification {
                decision: rule.decision,
                symbols,
                source: DecisionSource::Rule(rule.name),
            };
        }

        let (decision, suggested, source) = match self.ask_model(question).await {
            Ok(routing) => (routing.decision, routing.symbols, DecisionSource::Model),
            Err(e) => {
                warn!(error = %e, "Model routing unavailable, defaulting to chat");
                (RoutingDecision::Chat, Vec::new(), DecisionSource::Default)
            }
        };

        let symbols = if symbols.is_empty() {
            self.extractor.filter_supported(suggested)
        } else {
            symbols
        };

        let decision = match decision {
            // Several companies in one question is a comparison
            RoutingDecision::Chat if symbols.len() >= 2 => {
                RoutingDecision::CallTool(ToolId::GetFundamentals)
            }
            RoutingDecision::CallTool(tool) if symbols.is_empty() => {
                info!(tool = %tool, "Model asked for a tool without any symbol, using chat");
                RoutingDecision::Chat
            }
            other => other,
        };

        info!(decision = ?decision, source = ?source, symbols = symbols.len(), "Routed by model fallback");

        Classification {
            decision,
            symbols,
            source,
        }
    }

    async fn ask_model(&self, question: &str) -> Result<ModelRouting> {
        let messages = [Turn::system(build_routing_prompt()), Turn::user(question)];
        let raw = self
            .model
            .complete(&messages, Some(ROUTING_TEMPERATURE))
            .await?;

        parse_routing_response(&raw).map_err(|e| {
            warn!(error = %e, "Unusable routing response from model");
            e
        })
    }
}

/// Parsed model routing output
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRouting {
    pub decision: RoutingDecision,
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRouting {
    action: Action,
    #[serde(default)]
    tool: Option<ToolId>,
    #[serde(default)]
    symbols: Option<Vec<String>>,
}

/// Parse the model's JSON routing reply (optionally fenced or wrapped in prose)
pub fn parse_routing_response(response: &str) -> Result<ModelRouting> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let raw: RawRouting = match serde_json::from_str(cleaned) {
        Ok(raw) => raw,
        Err(first_error) => {
            // Fallback: the outermost { ... } block
            let start = cleaned.find('{');
            let end = cleaned.rfind('}');
            match (start, end) {
                (Some(begin), Some(end)) if begin < end => serde_json::from_str(&cleaned[begin..=end])
                    .map_err(|e| AskError::IntentParseError(format!("{} | raw={}", e, response)))?,
                _ => {
                    return Err(AskError::IntentParseError(format!(
                        "{} | raw={}",
                        first_error, response
                    )))
                }
            }
        }
    };

    let decision = match (raw.action, raw.tool) {
        (Action::Chat, _) => RoutingDecision::Chat,
        (Action::CallTool, Some(tool)) => RoutingDecision::CallTool(tool),
        (Action::CallTool, None) => {
            return Err(AskError::IntentParseError(
                "call_tool without a tool".to_string(),
            ))
        }
    };

    Ok(ModelRouting {
        decision,
        symbols: raw.symbols.unwrap_or_default(),
    })
}

fn build_routing_prompt() -> String {
    let tools: Vec<String> = ToolId::ALL
        .iter()
        .map(|tool| format!("- {}: {}", tool, tool.description()))
        .collect();

    format!(
        r#"You are the controller of a financial analysis system.

Decide whether the user's question needs real-time market data.

STRICT RULES:
- If the question involves real companies AND comparison, financials, price, risk, trend, or performance, a tool is REQUIRED.
- Only choose "chat" for greetings or purely conceptual questions.

Available tools:
{}

Guidance:
- "compare", "vs", "difference" -> get_fundamentals
- "risk", "risky", "volatile" -> predict_volatility
- "trend", "direction" -> predict_price_trend
- "price" -> get_current_price

Return ONLY valid JSON, no explanation text:

{{
  "action": "call_tool" | "chat",
  "tool": "get_current_price" | "get_fundamentals" | "predict_price_trend" | "predict_volatility" | null,
  "symbols": ["AAPL", "MSFT"]
}}"#,
        tools.join("\n")
    )
}
