//! Environment-sourced configuration
//!
//! Loaded once at startup (after `.env`, if any) and handed to each component.

use crate::error::AskError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MCP_BASE_URL: &str = "https://financial-mcp.onrender.com";
pub const DEFAULT_LLM_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub mcp_base_url: String,
    pub llm: LlmConfig,
    pub tools: ToolConfig,
    pub memory: MemoryConfig,
    /// Allowed CORS origins; empty means permissive
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub max_sessions: usize,
    pub session_ttl: Duration,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 2,
            backoff: Duration::from_secs(3),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            session_ttl: Duration::from_secs(3600),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| lookup(*key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = parse_or(get(&["PORT", "API_PORT"]), "PORT", 8080u16)?;

        let mcp_base_url = get(&["MCP_BASE_URL"])
            .unwrap_or_else(|| DEFAULT_MCP_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let llm = LlmConfig {
            api_key: get(&["GROQ_API_KEY", "LLM_API_KEY"]).unwrap_or_default(),
            api_base: get(&["LLM_API_BASE"])
                .unwrap_or_else(|| DEFAULT_LLM_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: get(&["LLM_MODEL"]).unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout: Duration::from_secs(parse_or(
                get(&["LLM_TIMEOUT_SECS"]),
                "LLM_TIMEOUT_SECS",
                60u64,
            )?),
        };

        let tool_defaults = ToolConfig::default();
        let tools = ToolConfig {
            timeout: Duration::from_secs(parse_or(
                get(&["TOOL_TIMEOUT_SECS"]),
                "TOOL_TIMEOUT_SECS",
                tool_defaults.timeout.as_secs(),
            )?),
            max_attempts: parse_or(
                get(&["TOOL_MAX_ATTEMPTS"]),
                "TOOL_MAX_ATTEMPTS",
                tool_defaults.max_attempts,
            )?,
            backoff: Duration::from_secs(parse_or(
                get(&["TOOL_RETRY_BACKOFF_SECS"]),
                "TOOL_RETRY_BACKOFF_SECS",
                tool_defaults.backoff.as_secs(),
            )?),
        };

        if tools.max_attempts == 0 {
            return Err(AskError::ConfigError(
                "TOOL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let memory_defaults = MemoryConfig::default();
        let memory = MemoryConfig {
            max_sessions: parse_or(
                get(&["MEMORY_MAX_SESSIONS"]),
                "MEMORY_MAX_SESSIONS",
                memory_defaults.max_sessions,
            )?,
            session_ttl: Duration::from_secs(parse_or(
                get(&["MEMORY_SESSION_TTL_SECS"]),
                "MEMORY_SESSION_TTL_SECS",
                memory_defaults.session_ttl.as_secs(),
            )?),
        };

        let cors_origins = get(&["CORS_ORIGINS"])
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            mcp_base_url,
            llm,
            tools,
            memory,
            cors_origins,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| AskError::ConfigError(format!("{} is not valid: {:?}", key, raw))),
        None => Ok(default),
    }
}
