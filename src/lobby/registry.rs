//! Session registry: the set of live sessions plus one waiting queue per mode
//!
//! A session is in its mode's queue iff its status is `Waiting`. The registry
//! is plain data; callers hold the matchmaker lock while using it.

use crate::config::ModeRule;
use crate::lobby::queue::WaitingQueue;
use crate::types::{PlayerSession, PresenceSnapshot, SessionId};
use std::collections::HashMap;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Waiting session as seen by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadySession {
    pub session_id: SessionId,
    pub waited: Duration,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, PlayerSession>,
    queues: HashMap<String, WaitingQueue>,
}

impl SessionRegistry {
    /// Create a registry with an empty queue for every mode
    pub fn new(modes: &[ModeRule]) -> Self {
        Self {
            sessions: HashMap::new(),
            queues: modes
                .iter()
                .map(|rule| (rule.key.clone(), WaitingQueue::new()))
                .collect(),
        }
    }

    /// Register a freshly created waiting session at its queue tail
    pub fn insert_waiting(&mut self, session: PlayerSession) {
        debug_assert!(session.is_waiting());
        self.queues
            .entry(session.mode.clone())
            .or_default()
            .push_back(session.session_id.clone());
        self.sessions.insert(session.session_id.clone(), session);
    }

    pub fn get(&self, session_id: &str) -> Option<&PlayerSession> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut PlayerSession> {
        self.sessions.get_mut(session_id)
    }

    /// Remove a session entirely, including its queue slot
    pub fn remove(&mut self, session_id: &str) -> Option<PlayerSession> {
        let session = self.sessions.remove(session_id)?;
        if let Some(queue) = self.queues.get_mut(&session.mode) {
            queue.remove(session_id);
        }
        Some(session)
    }

    /// Take a session out of its waiting queue; no-op if already gone
    pub fn dequeue(&mut self, session_id: &str) -> bool {
        let Some(mode) = self.sessions.get(session_id).map(|s| s.mode.clone()) else {
            return false;
        };
        self.queues
            .get_mut(&mode)
            .map(|queue| queue.remove(session_id))
            .unwrap_or(false)
    }

    /// Waiting sessions of a mode, oldest first
    ///
    /// Ids whose session vanished or left `Waiting` are dropped from the queue.
    pub fn ready_sessions(&mut self, mode: &str, now: Instant) -> Vec<ReadySession> {
        let Some(queue) = self.queues.get_mut(mode) else {
            return Vec::new();
        };

        let mut ready = Vec::with_capacity(queue.len());
        let mut stale = Vec::new();
        for id in queue.iter() {
            match self.sessions.get(id) {
                Some(session) if session.is_waiting() => ready.push(ReadySession {
                    session_id: id.clone(),
                    waited: session.waited(now),
                }),
                _ => stale.push(id.clone()),
            }
        }

        for id in stale {
            debug!("Dropping stale queue entry {} from mode '{}'", id, mode);
            queue.remove(&id);
        }

        ready
    }

    /// Queue ids of a mode in order
    pub fn waiting_ids(&self, mode: &str) -> Vec<SessionId> {
        self.queues
            .get(mode)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Queue ids of every mode
    pub fn all_waiting_ids(&self) -> Vec<SessionId> {
        self.queues
            .values()
            .flat_map(|queue| queue.iter().cloned())
            .collect()
    }

    /// `(position, queue size)` while the session is waiting
    pub fn queue_position(&self, session_id: &str) -> Option<(usize, usize)> {
        let session = self.sessions.get(session_id)?;
        if !session.is_waiting() {
            return None;
        }
        let queue = self.queues.get(&session.mode)?;
        queue
            .position(session_id)
            .map(|position| (position, queue.len()))
    }

    pub fn waiting_count(&self, mode: &str) -> usize {
        self.queues.get(mode).map(WaitingQueue::len).unwrap_or(0)
    }

    pub fn total_waiting(&self) -> usize {
        self.queues.values().map(WaitingQueue::len).sum()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Most advanced status per user
    pub fn presence(&self) -> PresenceSnapshot {
        let mut presence = PresenceSnapshot::new();
        for session in self.sessions.values() {
            presence
                .entry(session.user_id)
                .and_modify(|status| *status = (*status).max(session.status))
                .or_insert(session.status);
        }
        presence
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::SessionStatus;
    use crate::utils::current_timestamp;
    use serde_json::json;

    pub(crate) fn test_session(id: &str, user_id: u64, mode: &str, joined_at: Instant) -> PlayerSession {
        PlayerSession {
            session_id: id.to_string(),
            user_id,
            player_id: format!("player-{}", id),
            display_name: format!("Pilot {}", id),
            mode: mode.to_string(),
            team_size: 4,
            capacity: 8,
            joined_at,
            status: SessionStatus::Waiting,
            match_id: None,
            squad_id: None,
            cosmetic_profile: json!({ "outfitId": "outfit-sentinel" }),
            last_update: current_timestamp(),
            match_view: None,
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(&[ModeRule::squad(), ModeRule::solo()])
    }

    #[test]
    fn test_insert_and_positions() {
        let mut registry = registry();
        let now = Instant::now();
        registry.insert_waiting(test_session("a", 1, "squad", now));
        registry.insert_waiting(test_session("b", 2, "squad", now));
        registry.insert_waiting(test_session("c", 3, "solo", now));

        assert_eq!(registry.queue_position("a"), Some((1, 2)));
        assert_eq!(registry.queue_position("b"), Some((2, 2)));
        assert_eq!(registry.queue_position("c"), Some((1, 1)));
        assert_eq!(registry.total_waiting(), 3);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = registry();
        registry.insert_waiting(test_session("a", 1, "squad", Instant::now()));

        assert!(registry.dequeue("a"));
        assert!(!registry.dequeue("a"));
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(!registry.dequeue("a"));
        assert_eq!(registry.waiting_count("squad"), 0);
    }

    #[test]
    fn test_ready_sessions_filters_non_waiting() {
        let mut registry = registry();
        let start = Instant::now();
        registry.insert_waiting(test_session("a", 1, "squad", start));
        registry.insert_waiting(test_session("b", 2, "squad", start + Duration::from_secs(1)));

        // Simulate a status change that bypassed dequeue
        registry.get_mut("a").unwrap().status = SessionStatus::Matched;

        let ready = registry.ready_sessions("squad", start + Duration::from_secs(5));
        assert_eq!(
            ready,
            vec![ReadySession {
                session_id: "b".to_string(),
                waited: Duration::from_secs(4),
            }]
        );
        assert_eq!(registry.waiting_ids("squad"), vec!["b".to_string()]);
        assert!(registry.ready_sessions("unknown", start).is_empty());
    }

    #[test]
    fn test_presence_prefers_most_advanced_status() {
        let mut registry = registry();
        let now = Instant::now();
        registry.insert_waiting(test_session("a", 7, "squad", now));
        registry.insert_waiting(test_session("b", 7, "solo", now));
        registry.insert_waiting(test_session("c", 8, "solo", now));
        registry.dequeue("b");
        registry.get_mut("b").unwrap().status = SessionStatus::Playing;

        let presence = registry.presence();
        assert_eq!(presence.get(&7), Some(&SessionStatus::Playing));
        assert_eq!(presence.get(&8), Some(&SessionStatus::Waiting));
    }
}
