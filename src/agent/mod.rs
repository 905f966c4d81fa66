//! Request orchestrator
//!
//! QUESTION → EXTRACT SYMBOLS → CLASSIFY → (DISPATCH TOOL) → COMPOSE → REMEMBER
//!
//! `ask` never fails: data outages become structured tool errors or an
//! apology, and language-model failures become a fixed fallback answer.

use crate::classifier::IntentClassifier;
use crate::composer::ResponseComposer;
use crate::dispatch::{all_failed, ToolDispatcher};
use crate::llm::ChatModel;
use crate::memory::ConversationMemory;
use crate::models::{AskResponse, RoutingDecision, SymbolSet, ToolId};
use crate::symbols::SymbolExtractor;
use crate::tools::{MarketDataService, RetryPolicy};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Answer returned when the model could not produce one
pub const FALLBACK_ANSWER: &str =
    "Sorry, I couldn't generate an answer right now. Please try again in a moment.";

pub struct AskService {
    extractor: SymbolExtractor,
    classifier: IntentClassifier,
    dispatcher: ToolDispatcher,
    composer: ResponseComposer,
}

impl AskService {
    pub fn new(
        model: Arc<dyn ChatModel>,
        data_service: Arc<dyn MarketDataService>,
        memory: Arc<ConversationMemory>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            extractor: SymbolExtractor::new(),
            classifier: IntentClassifier::new(model.clone()),
            dispatcher: ToolDispatcher::new(data_service, retry),
            composer: ResponseComposer::new(model, memory),
        }
    }

    /// Answer one question within a session
    pub async fn ask(&self, question: &str, session_id: &str) -> AskResponse {
        let request_id = Uuid::new_v4();
        let span = info_span!("ask", %request_id, session_id = %session_id);

        self.handle(question, session_id).instrument(span).await
    }

    async fn handle(&self, question: &str, session_id: &str) -> AskResponse {
        let start = Instant::now();
        info!(question = %question, "Received question");

        let extracted = self.extractor.extract(question);
        let classification = self.classifier.classify(question, extracted).await;

        let response = match classification.decision {
            RoutingDecision::Chat => self.answer_chat(session_id, question).await,
            RoutingDecision::CallTool(tool) => {
                self.answer_with_tool(session_id, question, tool, classification.symbols)
                    .await
            }
        };

        info!(
            used_tools = ?response.used_tools,
            symbols = ?response.symbols,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Question answered"
        );

        response
    }

    async fn answer_chat(&self, session_id: &str, question: &str) -> AskResponse {
        let answer = match self.composer.chat(session_id, question).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, "Chat completion failed");
                FALLBACK_ANSWER.to_string()
            }
        };

        AskResponse {
            answer,
            used_tools: Vec::new(),
            symbols: Vec::new(),
        }
    }

    async fn answer_with_tool(
        &self,
        session_id: &str,
        question: &str,
        tool: ToolId,
        symbols: SymbolSet,
    ) -> AskResponse {
        let results = self.dispatcher.dispatch(tool, &symbols).await;

        let answer = if all_failed(&results) {
            warn!(tool = %tool, "Every tool call failed, skipping summarization");
            self.composer
                .apologize(session_id, question, tool, &results)
                .await
        } else {
            match self
                .composer
                .analyze(session_id, question, tool, &results)
                .await
            {
                Ok(answer) => answer,
                Err(e) => {
                    error!(error = %e, tool = %tool, "Summarization failed");
                    FALLBACK_ANSWER.to_string()
                }
            }
        };

        AskResponse {
            answer,
            used_tools: vec![tool.to_string()],
            symbols: symbols.into_iter().collect(),
        }
    }

    /// Ping the data service so a cold instance starts booting
    pub async fn warmup(&self) -> String {
        match self.dispatcher.service().ping().await {
            Ok(_) => {
                info!("Data service is warm");
                "warm".to_string()
            }
            Err(e) => {
                warn!(error = %e, "Data service warmup failed");
                format!("cold: {}", e)
            }
        }
    }
}
