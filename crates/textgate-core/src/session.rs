//! Per-session conversation tracking.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use textgate_admission::Tier;
use tracing::debug;

/// Turns kept per session; older turns are dropped first.
const MAX_TURNS: usize = 20;

/// One completed exchange, as delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub reply: String,
}

/// State tracked for one conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub tier: Tier,
    pub requests: u64,
    pub turns: Vec<Turn>,
    pub created: Instant,
    pub last_seen: Instant,
}

/// Concurrent session map keyed by session id. A caller identity can hold
/// any number of sessions; the id is the conversation handle.
///
/// Sessions are created lazily on first contact at the store's default
/// tier; upgrades are applied with [`SessionStore::set_tier`]. There is no
/// persistence: a restart starts every caller fresh, which is acceptable
/// because the only durable consequence of a session is its tier.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    default_tier: Tier,
}

impl SessionStore {
    pub fn new(default_tier: Tier) -> Self {
        Self {
            sessions: DashMap::new(),
            default_tier,
        }
    }

    /// Bumps the request count and last-seen time, creating the session if
    /// this id is new. Returns a snapshot of the updated session.
    pub fn touch(&self, session_id: &str) -> Session {
        let now = Instant::now();
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                id: session_id.to_string(),
                tier: self.default_tier,
                requests: 0,
                turns: Vec::new(),
                created: now,
                last_seen: now,
            });
        entry.requests += 1;
        entry.last_seen = now;
        entry.clone()
    }

    /// Appends a delivered exchange to the session, dropping the oldest
    /// turn once `MAX_TURNS` is reached. Blocked requests record nothing.
    pub fn record_turn(&self, session_id: &str, user: &str, reply: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            if session.turns.len() == MAX_TURNS {
                session.turns.remove(0);
            }
            session.turns.push(Turn {
                user: user.to_string(),
                reply: reply.to_string(),
            });
        }
    }

    /// Conversation history for a session, oldest first.
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .get(session_id)
            .map(|s| s.turns.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    pub fn set_tier(&self, session_id: &str, tier: Tier) {
        let now = Instant::now();
        self.sessions
            .entry(session_id.to_string())
            .and_modify(|s| s.tier = tier)
            .or_insert_with(|| Session {
                id: session_id.to_string(),
                tier,
                requests: 0,
                turns: Vec::new(),
                created: now,
                last_seen: now,
            });
    }

    /// Drops sessions idle longer than `ttl`. Returns how many were removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let before = self.sessions.len();
        let cutoff = Instant::now();
        self.sessions
            .retain(|_, s| cutoff.duration_since(s.last_seen) <= ttl);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!(evicted, "dropped idle sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_creates_then_increments() {
        let store = SessionStore::new(Tier::Free);
        let first = store.touch("alice");
        assert_eq!(first.requests, 1);
        assert_eq!(first.tier, Tier::Free);
        let second = store.touch("alice");
        assert_eq!(second.requests, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_tier_upgrades_existing_and_new() {
        let store = SessionStore::new(Tier::Free);
        store.touch("alice");
        store.set_tier("alice", Tier::Pro);
        assert_eq!(store.get("alice").unwrap().tier, Tier::Pro);

        store.set_tier("bob", Tier::Enterprise);
        let bob = store.touch("bob");
        assert_eq!(bob.tier, Tier::Enterprise);
        assert_eq!(bob.requests, 1);
    }

    #[test]
    fn history_caps_at_max_turns() {
        let store = SessionStore::new(Tier::Free);
        store.touch("alice");
        for n in 0..=MAX_TURNS {
            store.record_turn("alice", &format!("q{n}"), &format!("a{n}"));
        }
        let history = store.history("alice");
        assert_eq!(history.len(), MAX_TURNS);
        // Turn 0 was dropped to make room.
        assert_eq!(history[0].user, "q1");
        assert_eq!(history.last().unwrap().user, format!("q{MAX_TURNS}"));
    }

    #[test]
    fn record_turn_without_session_is_a_no_op() {
        let store = SessionStore::new(Tier::Free);
        store.record_turn("ghost", "q", "a");
        assert!(store.history("ghost").is_empty());
    }

    #[test]
    fn evict_idle_removes_stale_sessions() {
        let store = SessionStore::new(Tier::Free);
        store.touch("alice");
        assert_eq!(store.evict_idle(Duration::from_secs(60)), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.evict_idle(Duration::ZERO), 1);
        assert!(store.is_empty());
    }
}
