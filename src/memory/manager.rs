//! Session-keyed conversation memory
//!
//! Each `read`/`append` is atomic on its own, but a request's read followed
//! later by its appends is not: two concurrent requests on the same session
//! can interleave their turns (last writer decides what survives truncation).
//! Clients are expected to send one request per session at a time.

use crate::config::MemoryConfig;
use crate::memory::store::ConversationHistory;
use crate::models::{Role, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

pub struct ConversationMemory {
    sessions: RwLock<HashMap<String, ConversationHistory>>,
    max_sessions: usize,
    session_ttl: Duration,
}

impl ConversationMemory {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: config.max_sessions.max(1),
            session_ttl: config.session_ttl,
        }
    }

    /// Turns of a session, oldest first; empty for unknown or expired sessions
    pub async fn read(&self, session_id: &str) -> Vec<Turn> {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(history) if !self.is_expired(history, Instant::now()) => history.to_vec(),
            _ => Vec::new(),
        }
    }

    /// Append one turn, creating the session on first use
    pub async fn append(&self, session_id: &str, role: Role, content: impl Into<String>) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if let Some(history) = sessions.get(session_id) {
            if self.is_expired(history, now) {
                debug!(session_id = %session_id, "Session expired, starting fresh");
                sessions.remove(session_id);
            }
        }

        if !sessions.contains_key(session_id) && sessions.len() >= self.max_sessions {
            Self::evict_least_recent(&mut sessions);
        }

        sessions
            .entry(session_id.to_string())
            .or_default()
            .push(role, content.into());
    }

    /// Drop every session idle longer than the TTL; returns how many went
    pub async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, history| !self.is_expired(history, now));

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Periodically purge idle sessions for as long as the process runs
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.evict_expired().await;
            }
        })
    }

    fn is_expired(&self, history: &ConversationHistory, now: Instant) -> bool {
        now.saturating_duration_since(history.last_active()) > self.session_ttl
    }

    fn evict_least_recent(sessions: &mut HashMap<String, ConversationHistory>) {
        let oldest = sessions
            .iter()
            .min_by_key(|(_, history)| history.last_active())
            .map(|(id, _)| id.clone());

        if let Some(id) = oldest {
            debug!(session_id = %id, "Session limit reached, evicting least recently used");
            sessions.remove(&id);
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(&MemoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::MAX_MEMORY_TURNS;

    fn memory(max_sessions: usize, ttl_secs: u64) -> ConversationMemory {
        ConversationMemory::new(&MemoryConfig {
            max_sessions,
            session_ttl: Duration::from_secs(ttl_secs),
        })
    }

    #[tokio::test]
    async fn test_unknown_session_reads_empty() {
        let memory = ConversationMemory::default();
        assert!(memory.read("nobody").await.is_empty());
        assert_eq!(memory.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_append_truncates_per_session() {
        let memory = ConversationMemory::default();
        for i in 0..13 {
            memory.append("s1", Role::User, format!("q{}", i)).await;
        }
        memory.append("s2", Role::User, "other").await;

        let s1 = memory.read("s1").await;
        assert_eq!(s1.len(), MAX_MEMORY_TURNS);
        assert_eq!(s1.first().unwrap().content, "q3");
        assert_eq!(s1.last().unwrap().content, "q12");
        assert_eq!(memory.read("s2").await, vec![Turn::user("other")]);
    }

    #[tokio::test]
    async fn test_round_trip_user_then_assistant() {
        let memory = ConversationMemory::default();
        memory.append("s", Role::User, "price of AAPL?").await;
        memory.append("s", Role::Assistant, "AAPL trades at 190 USD.").await;

        assert_eq!(
            memory.read("s").await,
            vec![
                Turn::user("price of AAPL?"),
                Turn::assistant("AAPL trades at 190 USD.")
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_least_recent_session_evicted_at_limit() {
        let memory = memory(2, 3600);
        memory.append("a", Role::User, "1").await;
        tokio::time::advance(Duration::from_secs(1)).await;
        memory.append("b", Role::User, "2").await;
        tokio::time::advance(Duration::from_secs(1)).await;
        memory.append("a", Role::User, "3").await;
        tokio::time::advance(Duration::from_secs(1)).await;

        memory.append("c", Role::User, "4").await;

        assert_eq!(memory.session_count().await, 2);
        assert!(memory.read("b").await.is_empty());
        assert_eq!(memory.read("a").await.len(), 2);
        assert_eq!(memory.read("c").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_expire() {
        let memory = memory(10, 60);
        memory.append("old", Role::User, "hello").await;
        tokio::time::advance(Duration::from_secs(45)).await;
        memory.append("fresh", Role::User, "hi").await;
        tokio::time::advance(Duration::from_secs(30)).await;

        assert!(memory.read("old").await.is_empty());
        assert_eq!(memory.read("fresh").await.len(), 1);

        assert_eq!(memory.evict_expired().await, 1);
        assert_eq!(memory.session_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_restarts_on_append() {
        let memory = memory(10, 60);
        memory.append("s", Role::User, "first").await;
        tokio::time::advance(Duration::from_secs(120)).await;
        memory.append("s", Role::User, "second").await;

        assert_eq!(memory.read("s").await, vec![Turn::user("second")]);
    }
}
