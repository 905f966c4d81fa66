use financial_ask_router::{
    agent::AskService,
    api::start_server,
    config::AppConfig,
    llm::GroqClient,
    memory::ConversationMemory,
    tools::{McpClient, RetryPolicy},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    if config.llm.api_key.is_empty() {
        warn!("GROQ_API_KEY not set; answers will use the fallback message");
    }

    info!("Financial Ask Router - API Server");
    info!("Port: {}", config.port);
    info!("Data service: {}", config.mcp_base_url);

    // Create components
    let model = Arc::new(GroqClient::new(&config.llm)?);
    info!("Model: {}", model.model());
    let data_service = Arc::new(McpClient::new(&config.mcp_base_url, config.tools.timeout)?);
    let memory = Arc::new(ConversationMemory::new(&config.memory));
    let retry = RetryPolicy::new(config.tools.max_attempts, config.tools.backoff);

    let sweeper = memory.clone().spawn_sweeper(MEMORY_SWEEP_INTERVAL);

    let service = Arc::new(AskService::new(model, data_service, memory, retry));

    info!("Ask service initialized");

    start_server(service, config.port, &config.cors_origins).await?;

    sweeper.abort();
    Ok(())
}
