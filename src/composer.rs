//! Response composer
//!
//! Builds the message list for the final model call (persona, session
//! memory, current turn), extracts the reply and records the exchange.

use crate::llm::ChatModel;
use crate::memory::ConversationMemory;
use crate::models::{Role, ToolId, ToolResults, Turn};
use crate::symbols::company_name;
use crate::Result;
use std::sync::Arc;
use tracing::info;

pub const CHAT_SYSTEM_PROMPT: &str = "You are a knowledgeable financial assistant. \
Answer conversationally and conceptually. \
Do not invent specific financial numbers.";

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are a financial analyst. \
Base conclusions strictly on the provided tool data. \
If data is missing or errors occur, say so clearly. \
Do not rely on general knowledge.";

pub struct ResponseComposer {
    model: Arc<dyn ChatModel>,
    memory: Arc<ConversationMemory>,
}

impl ResponseComposer {
    pub fn new(model: Arc<dyn ChatModel>, memory: Arc<ConversationMemory>) -> Self {
        Self { model, memory }
    }

    /// Conversational answer, no market data involved
    pub async fn chat(&self, session_id: &str, question: &str) -> Result<String> {
        let history = self.memory.read(session_id).await;
        let messages = chat_messages(history, question);
        self.complete_and_remember(session_id, question, &messages).await
    }

    /// Analytical answer grounded on tool results
    pub async fn analyze(
        &self,
        session_id: &str,
        question: &str,
        tool: ToolId,
        results: &ToolResults,
    ) -> Result<String> {
        let history = self.memory.read(session_id).await;
        let messages = analysis_messages(history, question, tool, results)?;
        self.complete_and_remember(session_id, question, &messages).await
    }

    /// Templated answer for when every tool call failed; no model call
    pub async fn apologize(
        &self,
        session_id: &str,
        question: &str,
        tool: ToolId,
        results: &ToolResults,
    ) -> String {
        let answer = apology(tool, results);
        self.remember(session_id, question, &answer).await;
        answer
    }

    async fn complete_and_remember(
        &self,
        session_id: &str,
        question: &str,
        messages: &[Turn],
    ) -> Result<String> {
        let answer = self.model.complete(messages, None).await?;
        self.remember(session_id, question, &answer).await;
        Ok(answer)
    }

    async fn remember(&self, session_id: &str, question: &str, answer: &str) {
        self.memory.append(session_id, Role::User, question).await;
        self.memory.append(session_id, Role::Assistant, answer).await;
        info!(session_id = %session_id, "Conversation memory updated");
    }
}

/// Persona, memory, then the raw question
pub fn chat_messages(history: Vec<Turn>, question: &str) -> Vec<Turn> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Turn::system(CHAT_SYSTEM_PROMPT));
    messages.extend(history);
    messages.push(Turn::user(question));
    messages
}

/// Persona, memory, then a prompt embedding question, tool and results
pub fn analysis_messages(
    history: Vec<Turn>,
    question: &str,
    tool: ToolId,
    results: &ToolResults,
) -> Result<Vec<Turn>> {
    let serialized = serde_json::to_string_pretty(results)?;

    let prompt = format!(
        "User question:\n{}\n\nTool used:\n{}\n\nTool results:\n{}\n\nExplain clearly and concisely.",
        question, tool, serialized
    );

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Turn::system(ANALYSIS_SYSTEM_PROMPT));
    messages.extend(history);
    messages.push(Turn::user(prompt));
    Ok(messages)
}

/// User-facing message for a request whose every symbol failed
pub fn apology(tool: ToolId, results: &ToolResults) -> String {
    let companies: Vec<String> = results
        .keys()
        .map(|symbol| match company_name(symbol) {
            Some(name) => format!("{} ({})", name, symbol),
            None => symbol.clone(),
        })
        .collect();

    format!(
        "Sorry, I couldn't retrieve {} data for {} right now. \
The financial data service may still be starting up; please try again in a minute.",
        tool.label(),
        companies.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ToolErrorKind, ToolResult};
    use crate::testing::ScriptedModel;
    use serde_json::json;

    fn results() -> ToolResults {
        let mut results = ToolResults::new();
        results.insert(
            "AAPL".into(),
            ToolResult::Success(json!({"status": "success", "symbol": "AAPL", "price": 189.25})),
        );
        results.insert(
            "MSFT".into(),
            ToolResult::failure(ToolErrorKind::McpTimeout, "Data service took too long to respond"),
        );
        results
    }

    #[test]
    fn test_chat_messages_order() {
        let history = vec![Turn::user("hi"), Turn::assistant("Hello! How can I help?")];
        let messages = chat_messages(history, "what is a bond?");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], Turn::system(CHAT_SYSTEM_PROMPT));
        assert_eq!(messages[1], Turn::user("hi"));
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[3], Turn::user("what is a bond?"));
    }

    #[test]
    fn test_analysis_prompt_embeds_question_tool_and_results() {
        let messages =
            analysis_messages(vec![], "compare AAPL vs MSFT", ToolId::GetFundamentals, &results())
                .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, ANALYSIS_SYSTEM_PROMPT);

        let prompt = &messages[1].content;
        assert!(prompt.contains("compare AAPL vs MSFT"));
        assert!(prompt.contains("get_fundamentals"));
        assert!(prompt.contains("189.25"));
        assert!(prompt.contains("MCP_TIMEOUT"));
        // symbol order preserved
        assert!(prompt.find("AAPL\"").unwrap() < prompt.find("MSFT\"").unwrap());
    }

    #[test]
    fn test_apology_names_symbols() {
        let answer = apology(ToolId::GetFundamentals, &results());
        assert_eq!(
            answer,
            "Sorry, I couldn't retrieve fundamentals data for Apple (AAPL), Microsoft (MSFT) right now. \
The financial data service may still be starting up; please try again in a minute."
        );
    }

    #[tokio::test]
    async fn test_chat_records_both_turns() {
        let model = Arc::new(ScriptedModel::new(vec![Ok("A bond is a loan to an issuer.")]));
        let memory = Arc::new(ConversationMemory::default());
        let composer = ResponseComposer::new(model.clone(), memory.clone());

        memory.append("s", Role::User, "hi").await;
        memory.append("s", Role::Assistant, "hello").await;

        let answer = composer.chat("s", "what is a bond?").await.unwrap();
        assert_eq!(answer, "A bond is a loan to an issuer.");

        // model saw the prior turns between persona and question
        let (sent, temperature) = &model.calls()[0];
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[1], Turn::user("hi"));
        assert_eq!(*temperature, None);

        let stored = memory.read("s").await;
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[2], Turn::user("what is a bond?"));
        assert_eq!(stored[3], Turn::assistant("A bond is a loan to an issuer."));
    }

    #[tokio::test]
    async fn test_failed_completion_leaves_memory_untouched() {
        let model = Arc::new(ScriptedModel::new(vec![Err("503 Service Unavailable")]));
        let memory = Arc::new(ConversationMemory::default());
        let composer = ResponseComposer::new(model, memory.clone());

        assert!(composer.chat("s", "what is a bond?").await.is_err());
        assert!(memory.read("s").await.is_empty());
    }

    #[tokio::test]
    async fn test_apologize_records_without_model_call() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let memory = Arc::new(ConversationMemory::default());
        let composer = ResponseComposer::new(model.clone(), memory.clone());

        let answer = composer
            .apologize("s", "price of AAPL and MSFT", ToolId::GetCurrentPrice, &results())
            .await;

        assert_eq!(model.call_count(), 0);
        assert_eq!(
            memory.read("s").await,
            vec![Turn::user("price of AAPL and MSFT"), Turn::assistant(answer)]
        );
    }
}
