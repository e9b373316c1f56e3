//! Test fixtures and mock live connections for integration testing

#![allow(dead_code)]

use dropzone_matchmaker::cosmetics::StaticCosmeticsProvider;
use dropzone_matchmaker::lobby::fanout::next_connection_id;
use dropzone_matchmaker::lobby::{
    ConnectionId, FanoutError, LiveConnection, Matchmaker, MatchmakerConfig, SchedulerPolicy,
    StaticModeProvider,
};
use dropzone_matchmaker::types::{CosmeticProfile, PlayerSession};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Live connection that captures every payload it receives
#[derive(Debug)]
pub struct RecordingConnection {
    id: ConnectionId,
    payloads: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: next_connection_id(),
            payloads: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// All payloads received so far, parsed as JSON
    pub fn payloads(&self) -> Vec<Value> {
        self.payloads
            .lock()
            .map(|payloads| {
                payloads
                    .iter()
                    .filter_map(|p| serde_json::from_str(p).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Value> {
        self.payloads().pop()
    }

    pub fn count(&self) -> usize {
        self.payloads.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl LiveConnection for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, payload: Arc<str>) -> Result<(), FanoutError> {
        if self.is_closed() {
            return Err(FanoutError::Closed);
        }
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.push(payload.to_string());
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Live connection whose peer is already gone
#[derive(Debug)]
pub struct BrokenConnection {
    id: ConnectionId,
}

impl BrokenConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: next_connection_id(),
        })
    }
}

impl LiveConnection for BrokenConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, _payload: Arc<str>) -> Result<(), FanoutError> {
        Err(FanoutError::Closed)
    }

    fn close(&self) {}
}

pub fn agent_profile() -> CosmeticProfile {
    json!({ "outfitId": "outfit-sentinel", "emote": "salute" })
}

/// Matchmaker with the default modes, default thresholds and a fixed seed
pub fn create_test_matchmaker(seed: u64) -> Matchmaker {
    create_matchmaker_with_policy(seed, SchedulerPolicy::default())
}

pub fn create_matchmaker_with_policy(seed: u64, policy: SchedulerPolicy) -> Matchmaker {
    let config = MatchmakerConfig {
        policy,
        rng_seed: Some(seed),
        ..MatchmakerConfig::default()
    };

    Matchmaker::new(
        Arc::new(StaticModeProvider::new()),
        Arc::new(StaticCosmeticsProvider::with_seed(seed)),
        config,
    )
    .expect("Failed to create test matchmaker")
}

/// Policy with millisecond thresholds for tests that run the real scheduler
pub fn fast_policy() -> SchedulerPolicy {
    SchedulerPolicy {
        tick_interval: Duration::from_millis(10),
        quick_start: Duration::from_millis(40),
        max_wait: Duration::from_millis(80),
    }
}

/// Enqueue `count` players into `mode`, user ids starting at `first_user`
pub async fn enqueue_players(
    matchmaker: &Matchmaker,
    mode: &str,
    first_user: u64,
    count: usize,
) -> Vec<PlayerSession> {
    let mut sessions = Vec::with_capacity(count);
    for i in 0..count as u64 {
        let user_id = first_user + i;
        let session = matchmaker
            .enqueue(user_id, &format!("Pilot {}", user_id), agent_profile(), mode)
            .await
            .expect("Failed to enqueue test player");
        sessions.push(session);
    }
    sessions
}
