//! Per-session conversation history and carried entity context.
//!
//! Sessions are created lazily on first write, hold a bounded exchange
//! window, and are evicted after an idle TTL. All access is keyed by the
//! caller-supplied session id; no locking is exposed to callers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::SessionConfig;
use crate::entities::Entities;
use crate::types::{Exchange, SessionHistory};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    last_active: Instant,
    pub history: VecDeque<Exchange>,
    pub context: Entities,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            last_active: Instant::now(),
            history: VecDeque::new(),
            context: Entities::default(),
        }
    }
}

pub struct SessionStore {
    sessions: DashMap<String, Session>,
    window: usize,
    idle_ttl: Duration,
    last_sweep: Mutex<Instant>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            window: config.history_window,
            idle_ttl: Duration::from_secs(config.idle_ttl_secs),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Current carried entities for a session. An unknown session id yields
    /// an empty context rather than an error.
    pub fn context(&self, session_id: &str) -> Entities {
        self.sessions
            .get(session_id)
            .map(|s| s.context.clone())
            .unwrap_or_default()
    }

    /// Append a completed exchange, merging its entities into the carried
    /// context (last-write-wins per kind). Creates the session if needed.
    pub fn record_exchange(&self, session_id: &str, exchange: Exchange) {
        self.maybe_sweep();

        let mut session = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id.to_string()));

        session.context.merge_from(&exchange.entities);
        // A single float id also satisfies later bulk references ("compare
        // them with ..."). The singleton tracks the latest id the user named,
        // so a fresh float_id refreshes it; an explicit float_ids list from
        // the same exchange wins instead via the merge above.
        if let (Some(id), None) = (exchange.entities.float_id, &exchange.entities.float_ids) {
            session.context.float_ids = Some(vec![id]);
        }

        session.history.push_back(exchange);
        while session.history.len() > self.window {
            session.history.pop_front();
        }
        session.last_active = Instant::now();
    }

    /// Most recent `last_n` exchanges, oldest first.
    pub fn history(&self, session_id: &str, last_n: usize) -> Vec<Exchange> {
        self.sessions
            .get(session_id)
            .map(|s| {
                s.history
                    .iter()
                    .rev()
                    .take(last_n)
                    .rev()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn snapshot(&self, session_id: &str) -> SessionHistory {
        self.sessions
            .get(session_id)
            .map(|s| SessionHistory {
                session_id: s.id.clone(),
                history: s.history.iter().cloned().collect(),
                context: s.context.clone(),
            })
            .unwrap_or_else(|| SessionHistory {
                session_id: session_id.to_string(),
                history: Vec::new(),
                context: Entities::default(),
            })
    }

    /// Remove a session entirely. Returns whether it existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions idle longer than the TTL. Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        let ttl = self.idle_ttl;
        self.sessions
            .retain(|_, session| session.last_active.elapsed() < ttl);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!(evicted, "evicted idle sessions");
        }
        evicted
    }

    // Opportunistic sweep, at most once per TTL interval.
    fn maybe_sweep(&self) {
        let mut last = self.last_sweep.lock();
        if last.elapsed() >= self.idle_ttl {
            *last = Instant::now();
            drop(last);
            self.evict_idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Parameter;
    use crate::types::{ProcessingSource, ResponseEnvelope};

    fn test_config() -> SessionConfig {
        SessionConfig {
            history_window: 3,
            idle_ttl_secs: 3600,
        }
    }

    fn exchange(query: &str, entities: Entities) -> Exchange {
        Exchange {
            timestamp: Utc::now(),
            query: query.to_string(),
            intent: "depth_profile".to_string(),
            entities,
            result: serde_json::json!({}),
            envelope: ResponseEnvelope {
                text: "ok".to_string(),
                visualization: None,
                data: serde_json::json!({}),
                suggestions: vec![],
                processing_source: ProcessingSource::RulesOnly,
                intent: "depth_profile".to_string(),
                confidence: 0.9,
                session_id: "s1".to_string(),
                timestamp: Utc::now(),
            },
        }
    }

    #[test]
    fn test_unknown_session_is_empty_context() {
        let store = SessionStore::new(&test_config());
        assert!(store.context("missing").is_empty());
        assert!(store.history("missing", 5).is_empty());
    }

    #[test]
    fn test_context_merges_last_write_wins() {
        let store = SessionStore::new(&test_config());
        store.record_exchange(
            "s1",
            exchange(
                "temp of 2902296",
                Entities {
                    float_id: Some(2902296),
                    parameter: Some(Parameter::Temperature),
                    ..Default::default()
                },
            ),
        );
        store.record_exchange(
            "s1",
            exchange(
                "what about salinity",
                Entities {
                    parameter: Some(Parameter::Salinity),
                    ..Default::default()
                },
            ),
        );
        let ctx = store.context("s1");
        assert_eq!(ctx.float_id, Some(2902296));
        assert_eq!(ctx.parameter, Some(Parameter::Salinity));
        assert_eq!(ctx.float_ids, Some(vec![2902296]));
    }

    #[test]
    fn test_float_ids_singleton_tracks_latest_float_id() {
        let store = SessionStore::new(&test_config());
        store.record_exchange(
            "s1",
            exchange(
                "trajectory of 11111",
                Entities {
                    float_id: Some(11111),
                    ..Default::default()
                },
            ),
        );
        store.record_exchange(
            "s1",
            exchange(
                "trajectory of 22222",
                Entities {
                    float_id: Some(22222),
                    ..Default::default()
                },
            ),
        );
        let ctx = store.context("s1");
        assert_eq!(ctx.float_id, Some(22222));
        assert_eq!(ctx.float_ids, Some(vec![22222]));
    }

    #[test]
    fn test_explicit_float_ids_beat_the_singleton() {
        let store = SessionStore::new(&test_config());
        store.record_exchange(
            "s1",
            exchange(
                "compare 11111 and 22222",
                Entities {
                    float_ids: Some(vec![11111, 22222]),
                    ..Default::default()
                },
            ),
        );
        assert_eq!(store.context("s1").float_ids, Some(vec![11111, 22222]));
    }

    #[test]
    fn test_history_window_trims_oldest() {
        let store = SessionStore::new(&test_config());
        for i in 0..5 {
            store.record_exchange("s1", exchange(&format!("query {}", i), Entities::default()));
        }
        let history = store.history("s1", 10);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].query, "query 2");
        assert_eq!(history[2].query, "query 4");
    }

    #[test]
    fn test_clear_session() {
        let store = SessionStore::new(&test_config());
        store.record_exchange("s1", exchange("hello", Entities::default()));
        assert!(store.clear("s1"));
        assert!(!store.clear("s1"));
        assert!(store.context("s1").is_empty());
    }

    #[test]
    fn test_idle_eviction() {
        let config = SessionConfig {
            history_window: 3,
            idle_ttl_secs: 0,
        };
        let store = SessionStore::new(&config);
        store.record_exchange("s1", exchange("hello", Entities::default()));
        assert_eq!(store.evict_idle(), 1);
        assert!(store.is_empty());
    }
}
