//! Per-mode FIFO waiting queue
//!
//! Removal is O(1): the id leaves the membership set immediately and the
//! stale slot in the order buffer is reclaimed lazily.

use crate::types::SessionId;
use std::collections::{HashSet, VecDeque};

/// Ordered set of waiting session ids, oldest first
#[derive(Debug, Clone, Default)]
pub struct WaitingQueue {
    order: VecDeque<SessionId>,
    members: HashSet<SessionId>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail; returns false if the id is already queued
    ///
    /// A re-queued id drops any stale slot it left behind, so it appears
    /// only at the tail.
    pub fn push_back(&mut self, session_id: SessionId) -> bool {
        if !self.members.insert(session_id.clone()) {
            return false;
        }
        if self.order.len() >= self.members.len() {
            self.order.retain(|id| id != &session_id);
        }
        self.order.push_back(session_id);
        true
    }

    /// Remove an id; safe to call for ids that already left the queue
    pub fn remove(&mut self, session_id: &str) -> bool {
        if !self.members.remove(session_id) {
            return false;
        }
        self.reclaim();
        true
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.members.contains(session_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Live ids in join order
    pub fn iter(&self) -> impl Iterator<Item = &SessionId> {
        self.order.iter().filter(|id| self.members.contains(*id))
    }

    /// 1-based position of a queued id
    pub fn position(&self, session_id: &str) -> Option<usize> {
        if !self.contains(session_id) {
            return None;
        }
        self.iter()
            .position(|id| id == session_id)
            .map(|index| index + 1)
    }

    fn reclaim(&mut self) {
        while let Some(front) = self.order.front() {
            if self.members.contains(front) {
                break;
            }
            self.order.pop_front();
        }

        if self.order.len() > 2 * self.members.len() + 16 {
            let members = &self.members;
            self.order.retain(|id| members.contains(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(queue: &WaitingQueue) -> Vec<String> {
        queue.iter().cloned().collect()
    }

    #[test]
    fn test_fifo_order_and_positions() {
        let mut queue = WaitingQueue::new();
        for id in ["a", "b", "c"] {
            assert!(queue.push_back(id.to_string()));
        }

        assert_eq!(ids(&queue), vec!["a", "b", "c"]);
        assert_eq!(queue.position("a"), Some(1));
        assert_eq!(queue.position("c"), Some(3));
        assert_eq!(queue.position("z"), None);
    }

    #[test]
    fn test_duplicate_push_rejected() {
        let mut queue = WaitingQueue::new();
        assert!(queue.push_back("a".to_string()));
        assert!(!queue.push_back("a".to_string()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_idempotent_removal() {
        let mut queue = WaitingQueue::new();
        queue.push_back("a".to_string());
        queue.push_back("b".to_string());

        assert!(queue.remove("a"));
        assert!(!queue.remove("a"));
        assert!(!queue.remove("never-queued"));
        assert_eq!(ids(&queue), vec!["b"]);
        assert_eq!(queue.position("b"), Some(1));
    }

    #[test]
    fn test_middle_removal_is_compacted() {
        let mut queue = WaitingQueue::new();
        for i in 0..100 {
            queue.push_back(format!("s{}", i));
        }
        // Keep the head alive so only compaction can reclaim slots
        for i in 1..100 {
            queue.remove(&format!("s{}", i));
        }

        assert_eq!(queue.len(), 1);
        assert!(queue.order.len() <= 2 * queue.len() + 16);
        assert_eq!(ids(&queue), vec!["s0"]);
    }

    #[test]
    fn test_requeue_after_middle_removal() {
        let mut queue = WaitingQueue::new();
        queue.push_back("a".to_string());
        queue.push_back("b".to_string());
        queue.push_back("c".to_string());

        queue.remove("b");
        assert!(queue.push_back("b".to_string()));

        assert_eq!(ids(&queue), vec!["a", "c", "b"]);
        assert_eq!(queue.position("b"), Some(3));
        assert_eq!(queue.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_position_counts_earlier_waiting(removals in proptest::collection::vec(any::<bool>(), 1..60)) {
            let mut queue = WaitingQueue::new();
            for i in 0..removals.len() {
                queue.push_back(format!("s{}", i));
            }
            for (i, remove) in removals.iter().enumerate() {
                if *remove {
                    queue.remove(&format!("s{}", i));
                }
            }

            for (i, removed) in removals.iter().enumerate() {
                let id = format!("s{}", i);
                if *removed {
                    prop_assert_eq!(queue.position(&id), None);
                } else {
                    let earlier = removals[..i].iter().filter(|r| !**r).count();
                    prop_assert_eq!(queue.position(&id), Some(earlier + 1));
                }
            }
        }
    }
}
