//! Per-session statistics.
//!
//! Each client session gets its own counters, owned by a registry that the
//! surrounding application holds. Nothing is process-global.
//!
//! Session ids come from clients, so the registry is bounded: idle sessions
//! expire after a TTL, and the least recently active one is evicted when a
//! new session would exceed the cap.

use answerdesk_core::answer::AnswerMethod;
use answerdesk_core::feedback::Rating;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

const DEFAULT_MAX_SESSIONS: usize = 10_000;
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub answers: u64,
    pub direct_lookup: u64,
    pub augmented: u64,
    pub generative_fallback: u64,
    pub likes: u64,
    pub dislikes: u64,
    pub started_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl SessionStats {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            answers: 0,
            direct_lookup: 0,
            augmented: 0,
            generative_fallback: 0,
            likes: 0,
            dislikes: 0,
            started_at: now,
            last_active: now,
        }
    }

    pub fn record_answer(&mut self, method: AnswerMethod) {
        self.answers += 1;
        match method {
            AnswerMethod::DirectLookup => self.direct_lookup += 1,
            AnswerMethod::Augmented => self.augmented += 1,
            AnswerMethod::GenerativeFallback => self.generative_fallback += 1,
        }
        self.last_active = Utc::now();
    }

    pub fn record_feedback(&mut self, rating: Rating) {
        match rating {
            Rating::Positive => self.likes += 1,
            Rating::Negative => self.dislikes += 1,
        }
        self.last_active = Utc::now();
    }
}

/// Sessions keyed by client-supplied id.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionStats>>,
    max_sessions: usize,
    ttl: TimeDelta,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_sessions: usize, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    pub async fn record_answer(&self, session_id: &str, method: AnswerMethod) {
        self.update(session_id, |stats| stats.record_answer(method))
            .await;
    }

    pub async fn record_feedback(&self, session_id: &str, rating: Rating) {
        self.update(session_id, |stats| stats.record_feedback(rating))
            .await;
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionStats> {
        let now = Utc::now();
        self.sessions
            .read()
            .await
            .get(session_id)
            .filter(|stats| self.is_live(stats, now))
            .cloned()
    }

    /// Sessions active within the TTL.
    pub async fn count(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|stats| self.is_live(stats, now))
            .count()
    }

    async fn update(&self, session_id: &str, apply: impl FnOnce(&mut SessionStats)) {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(session_id) {
            self.make_room(&mut sessions, Utc::now());
        }
        apply(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| SessionStats::new(session_id)),
        );
    }

    /// Drop expired sessions, then evict the least recently active until a
    /// new session fits under the cap.
    fn make_room(&self, sessions: &mut HashMap<String, SessionStats>, now: DateTime<Utc>) {
        let before = sessions.len();
        sessions.retain(|_, stats| self.is_live(stats, now));
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "Expired idle sessions");
        }

        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .values()
                .min_by_key(|stats| stats.last_active)
                .map(|stats| stats.session_id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(session_id = %oldest, "Evicted least recently active session");
        }
    }

    fn is_live(&self, stats: &SessionStats, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(stats.last_active) <= self.ttl
    }
}
