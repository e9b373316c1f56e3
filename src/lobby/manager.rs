//! Matchmaker facade
//!
//! Owns all matchmaking state (sessions, per-mode queues, matches and live
//! subscribers) behind one exclusive lock. Every public operation holds the
//! lock only for its state work; pushes to live connections run after the
//! guard is dropped.

use crate::config::{AppConfig, ModeRule};
use crate::cosmetics::CosmeticsProvider;
use crate::error::{MatchmakingError, Result};
use crate::lobby::assembler::MatchAssembler;
use crate::lobby::fanout::{
    dispatch, ChannelConnection, ConnectionId, Delivery, DeliveryReport, LiveConnection, LiveFrame,
    SubscriberRegistry,
};
use crate::lobby::perspective::{
    serialize_match, serialize_session, ClosedView, MatchView, SessionView,
};
use crate::lobby::provider::ModeProvider;
use crate::lobby::registry::SessionRegistry;
use crate::lobby::scheduler::{next_assembly, run_scheduler, AssemblyTrigger, SchedulerPolicy};
use crate::metrics::MetricsCollector;
use crate::types::{
    CosmeticProfile, LobbySnapshot, Match, MatchId, PlayerSession, PresenceSnapshot, SessionId,
    SessionStatus, UserId,
};
use crate::utils::{current_timestamp, generate_player_id, generate_session_id};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Construction-time matchmaker settings
#[derive(Debug, Clone)]
pub struct MatchmakerConfig {
    pub policy: SchedulerPolicy,
    /// How long after `startedAt` a match counts as active in the lobby snapshot
    pub active_match_window: Duration,
    /// Buffer of channel-backed live connections
    pub subscriber_buffer: usize,
    /// Fixed seed for reproducible assembly; entropy when unset
    pub rng_seed: Option<u64>,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            policy: SchedulerPolicy::default(),
            active_match_window: Duration::from_secs(900),
            subscriber_buffer: 32,
            rng_seed: None,
        }
    }
}

impl From<&AppConfig> for MatchmakerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            policy: SchedulerPolicy::from(config),
            active_match_window: config.active_match_window(),
            subscriber_buffer: config.matchmaking.subscriber_buffer,
            rng_seed: config.matchmaking.rng_seed,
        }
    }
}

/// Statistics about matchmaker operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchmakerStats {
    /// Total number of sessions enqueued
    pub sessions_enqueued: u64,
    /// Total number of sessions cancelled
    pub sessions_cancelled: u64,
    /// Total number of matches assembled
    pub matches_created: u64,
    pub capacity_fill_matches: u64,
    pub quick_start_matches: u64,
    pub max_wait_matches: u64,
    /// Matches acknowledged at least once
    pub matches_started: u64,
    /// Total number of bots drafted into matches
    pub bots_spawned: u64,
    pub notifications_delivered: u64,
    pub notifications_dropped: u64,
    /// Current number of sessions waiting across all modes
    pub players_waiting: usize,
    /// Current number of known sessions
    pub active_sessions: usize,
    /// Current number of live connections
    pub live_connections: usize,
}

impl MatchmakerStats {
    fn record_trigger(&mut self, trigger: AssemblyTrigger) {
        self.matches_created += 1;
        match trigger {
            AssemblyTrigger::CapacityFill => self.capacity_fill_matches += 1,
            AssemblyTrigger::QuickStart => self.quick_start_matches += 1,
            AssemblyTrigger::MaxWait => self.max_wait_matches += 1,
        }
    }
}

/// Outcome of one scheduler tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub matches_created: usize,
    pub match_ids: Vec<MatchId>,
    /// Payloads pushed to live connections after the tick
    pub delivered: usize,
}

struct MatchmakerState {
    registry: SessionRegistry,
    matches: HashMap<MatchId, Match>,
    /// Human sessions of each match
    match_sessions: HashMap<MatchId, Vec<SessionId>>,
    subscribers: SubscriberRegistry,
    rng: StdRng,
    stats: MatchmakerStats,
}

/// The matchmaking core
pub struct Matchmaker {
    state: Mutex<MatchmakerState>,
    mode_provider: Arc<dyn ModeProvider>,
    cosmetics: Arc<dyn CosmeticsProvider>,
    assembler: MatchAssembler,
    config: MatchmakerConfig,
    metrics_collector: Arc<MetricsCollector>,
}

impl Matchmaker {
    /// Create a new matchmaker with its own metrics registry
    pub fn new(
        mode_provider: Arc<dyn ModeProvider>,
        cosmetics: Arc<dyn CosmeticsProvider>,
        config: MatchmakerConfig,
    ) -> Result<Self> {
        let metrics_collector = Arc::new(MetricsCollector::new()?);
        Self::with_metrics(mode_provider, cosmetics, config, metrics_collector)
    }

    /// Create a new matchmaker with metrics collector
    ///
    /// Fails if the scheduler policy or any of the provider's mode rules is
    /// unusable.
    pub fn with_metrics(
        mode_provider: Arc<dyn ModeProvider>,
        cosmetics: Arc<dyn CosmeticsProvider>,
        config: MatchmakerConfig,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<Self> {
        config.policy.validate()?;

        let modes = mode_provider.available_modes();
        if modes.is_empty() {
            return Err(MatchmakingError::ConfigurationError {
                message: "Mode provider has no modes".to_string(),
            }
            .into());
        }
        for rule in &modes {
            rule.validate()?;
        }

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            state: Mutex::new(MatchmakerState {
                registry: SessionRegistry::new(&modes),
                matches: HashMap::new(),
                match_sessions: HashMap::new(),
                subscribers: SubscriberRegistry::new(),
                rng,
                stats: MatchmakerStats::default(),
            }),
            assembler: MatchAssembler::new(cosmetics.clone()),
            mode_provider,
            cosmetics,
            config,
            metrics_collector,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, MatchmakerState>> {
        self.state
            .lock()
            .map_err(|_| MatchmakingError::lock_poisoned("matchmaker state").into())
    }

    pub fn config(&self) -> &MatchmakerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Configured modes, in configuration order
    pub fn modes(&self) -> Vec<ModeRule> {
        self.mode_provider.available_modes()
    }

    /// Put a new session at the tail of its mode's queue
    pub async fn enqueue(
        &self,
        user_id: UserId,
        display_name: &str,
        cosmetic_profile: CosmeticProfile,
        mode: &str,
    ) -> Result<PlayerSession> {
        let rule = self.mode_provider.get_mode_rule(mode)?;

        let session = PlayerSession {
            session_id: generate_session_id(),
            user_id,
            player_id: generate_player_id(),
            display_name: display_name.to_string(),
            mode: rule.key.clone(),
            team_size: rule.team_size,
            capacity: rule.players_per_match,
            joined_at: Instant::now(),
            status: SessionStatus::Waiting,
            match_id: None,
            squad_id: None,
            cosmetic_profile,
            last_update: current_timestamp(),
            match_view: None,
        };

        let (deliveries, waiting) = {
            let mut state = self.lock()?;
            state.registry.insert_waiting(session.clone());
            state.stats.sessions_enqueued += 1;

            let waiting_ids = state.registry.waiting_ids(&rule.key);
            (
                collect_deliveries(&mut state, waiting_ids),
                state.registry.waiting_count(&rule.key),
            )
        };

        info!(
            "Enqueued session {} (user {}) into mode '{}', {} waiting",
            session.session_id, user_id, rule.key, waiting
        );
        self.metrics_collector.record_enqueued(&rule.key);
        self.metrics_collector.set_waiting(&rule.key, waiting);

        self.deliver(deliveries);
        Ok(session)
    }

    /// Remove a session entirely; false if it does not exist
    pub async fn cancel(&self, session_id: &str) -> Result<bool> {
        let (deliveries, mode, waiting) = {
            let mut state = self.lock()?;
            let Some(session) = state.registry.remove(session_id) else {
                return Ok(false);
            };
            state.stats.sessions_cancelled += 1;

            let mut affected = vec![session_id.to_string()];
            if session.is_waiting() {
                affected.extend(state.registry.waiting_ids(&session.mode));
            }
            let waiting = state.registry.waiting_count(&session.mode);
            (collect_deliveries(&mut state, affected), session.mode, waiting)
        };

        info!("Cancelled session {} in mode '{}'", session_id, mode);
        self.metrics_collector.record_cancelled(&mode);
        self.metrics_collector.set_waiting(&mode, waiting);

        self.deliver(deliveries);
        Ok(true)
    }

    /// Mark the session's match as started
    ///
    /// The first call sets `startedAt`; the acknowledging session moves to
    /// `Playing`. Every participant's cached view is refreshed and pushed.
    /// Returns `None` for unknown or unmatched sessions.
    pub async fn acknowledge_match(&self, session_id: &str) -> Result<Option<Match>> {
        let (game, deliveries) = {
            let mut guard = self.lock()?;
            let state = &mut *guard;

            let Some(match_id) = state
                .registry
                .get(session_id)
                .and_then(|s| s.match_id.clone())
            else {
                return Ok(None);
            };
            let Some(game) = state.matches.get_mut(&match_id) else {
                return Ok(None);
            };

            let first_start = game.started_at.is_none();
            if first_start {
                game.started_at = Some(current_timestamp());
                state.stats.matches_started += 1;
                self.metrics_collector.record_match_started();
                info!("Match {} started by session {}", match_id, session_id);
            }

            let mut changed = first_start;
            if let Some(session) = state.registry.get_mut(session_id) {
                if session.status == SessionStatus::Matched {
                    session.status = SessionStatus::Playing;
                    session.last_update = current_timestamp();
                    changed = true;
                }
            }

            let game = game.clone();
            let participants = state
                .match_sessions
                .get(&match_id)
                .cloned()
                .unwrap_or_default();

            let deliveries = if changed {
                for id in &participants {
                    if let Some(session) = state.registry.get_mut(id) {
                        let view = serialize_match(
                            &game,
                            Some(&*session),
                            self.cosmetics.as_ref(),
                            false,
                        );
                        session.match_view = Some(view);
                        if id != session_id {
                            session.last_update = current_timestamp();
                        }
                    }
                }
                collect_deliveries(state, participants)
            } else {
                Vec::new()
            };

            (game, deliveries)
        };

        self.deliver(deliveries);
        Ok(Some(game))
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<PlayerSession>> {
        let state = self.lock()?;
        Ok(state.registry.get(session_id).cloned())
    }

    pub async fn get_match(&self, match_id: &str) -> Result<Option<Match>> {
        let state = self.lock()?;
        Ok(state.matches.get(match_id).cloned())
    }

    /// Client view of a session
    pub async fn serialize_session(&self, session_id: &str) -> Result<Option<SessionView>> {
        let state = self.lock()?;
        Ok(state.registry.get(session_id).map(|session| {
            serialize_session(session, state.registry.queue_position(session_id))
        }))
    }

    /// Neutral view of a match
    pub async fn serialize_match(&self, match_id: &str) -> Result<Option<MatchView>> {
        let state = self.lock()?;
        Ok(state
            .matches
            .get(match_id)
            .map(|game| serialize_match(game, None, self.cosmetics.as_ref(), false)))
    }

    /// View of a match from one session's point of view
    ///
    /// An unknown session yields the neutral view.
    pub async fn serialize_match_for_session(
        &self,
        match_id: &str,
        session_id: &str,
    ) -> Result<Option<MatchView>> {
        let state = self.lock()?;
        Ok(state.matches.get(match_id).map(|game| {
            serialize_match(
                game,
                state.registry.get(session_id),
                self.cosmetics.as_ref(),
                false,
            )
        }))
    }

    /// Aggregate lobby counters
    pub async fn lobby_snapshot(&self) -> Result<LobbySnapshot> {
        let state = self.lock()?;
        let window = chrono::Duration::from_std(self.config.active_match_window)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let cutoff = current_timestamp() - window;

        let (active_matches, active_capacity) = state
            .matches
            .values()
            .filter(|game| game.started_at.is_some_and(|started| started > cutoff))
            .fold((0, 0), |(count, capacity), game| {
                (count + 1, capacity + game.capacity)
            });

        let searching = state.registry.total_waiting();
        Ok(LobbySnapshot {
            online_players: state.registry.len().max(searching + active_capacity),
            searching,
            active_matches,
        })
    }

    /// Most advanced status of every user with a session
    pub async fn presence_snapshot(&self) -> Result<PresenceSnapshot> {
        let state = self.lock()?;
        Ok(state.registry.presence())
    }

    /// Attach a live connection to a session
    ///
    /// The connection immediately receives the current session state. For an
    /// unknown session it receives the closed sentinel and is closed without
    /// being registered.
    pub async fn subscribe(
        &self,
        session_id: &str,
        connection: Arc<dyn LiveConnection>,
    ) -> Result<()> {
        let delivery = {
            let mut state = self.lock()?;
            let payload = match state.registry.get(session_id) {
                Some(session) => {
                    let view = serialize_session(session, state.registry.queue_position(session_id));
                    encode(session_id, &view)
                }
                None => encode(session_id, &ClosedView::new(session_id)),
            };
            let exists = state.registry.get(session_id).is_some();
            if exists {
                state.subscribers.add(session_id, connection.clone());
                self.metrics_collector
                    .set_live_subscribers(state.subscribers.connection_count());
            }

            payload.map(|payload| Delivery {
                session_id: session_id.to_string(),
                payload,
                connections: vec![connection.clone()],
                close_after: !exists,
            })
        };

        debug!("Connection {} subscribed to session {}", connection.id(), session_id);
        self.deliver(delivery.into_iter().collect());
        Ok(())
    }

    /// Detach a live connection; unknown pairs are ignored
    pub async fn unsubscribe(&self, session_id: &str, connection_id: ConnectionId) -> Result<bool> {
        let mut state = self.lock()?;
        let removed = state.subscribers.remove(session_id, connection_id);
        self.metrics_collector
            .set_live_subscribers(state.subscribers.connection_count());
        Ok(removed)
    }

    /// Subscribe a fresh channel-backed connection and hand back its receiver
    pub async fn open_connection(
        &self,
        session_id: &str,
    ) -> Result<(ConnectionId, mpsc::Receiver<LiveFrame>)> {
        let (connection, rx) = ChannelConnection::pair(self.config.subscriber_buffer);
        let connection_id = connection.id();
        self.subscribe(session_id, Arc::new(connection)).await?;
        Ok((connection_id, rx))
    }

    /// Push the current state of each session to its subscribers
    pub async fn notify<I, S>(&self, session_ids: I) -> Result<DeliveryReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let deliveries = {
            let mut state = self.lock()?;
            let ids = session_ids
                .into_iter()
                .map(|id| id.as_ref().to_string())
                .collect::<Vec<_>>();
            collect_deliveries(&mut state, ids)
        };
        Ok(self.deliver(deliveries))
    }

    pub async fn get_stats(&self) -> Result<MatchmakerStats> {
        let state = self.lock()?;
        let mut stats = state.stats.clone();
        stats.players_waiting = state.registry.total_waiting();
        stats.active_sessions = state.registry.len();
        stats.live_connections = state.subscribers.connection_count();
        Ok(stats)
    }

    /// Run one scheduler pass now
    pub async fn tick(&self) -> Result<TickReport> {
        self.tick_at(Instant::now()).await
    }

    /// Run one scheduler pass as if the clock read `now`
    pub async fn tick_at(&self, now: Instant) -> Result<TickReport> {
        let timer = self.metrics_collector.start_timer();
        let modes = self.mode_provider.available_modes();
        let policy = self.config.policy;
        let mut report = TickReport::default();

        let deliveries = {
            let mut guard = self.lock()?;
            let state = &mut *guard;
            let mut touched: Vec<SessionId> = Vec::new();

            for rule in &modes {
                loop {
                    let ready = state.registry.ready_sessions(&rule.key, now);
                    let Some((trigger, take)) = next_assembly(&ready, rule, &policy) else {
                        break;
                    };

                    let batch = &ready[..take];
                    let ids: Vec<SessionId> = batch.iter().map(|r| r.session_id.clone()).collect();
                    let waits: Vec<Duration> = batch.iter().map(|r| r.waited).collect();

                    let assembly_timer = self.metrics_collector.start_timer();
                    let game = self.assembler.create_match(
                        &mut state.registry,
                        &ids,
                        rule,
                        &mut state.rng,
                    );
                    self.metrics_collector
                        .record_assembly(&rule.key, assembly_timer.stop());
                    self.metrics_collector.record_match_created(
                        &rule.key,
                        trigger.as_str(),
                        game.human_count(),
                        game.bot_count(),
                        &waits,
                    );

                    info!(
                        "Match {} assembled by {} in mode '{}' ({} humans, oldest waited {:?})",
                        game.match_id,
                        trigger,
                        rule.key,
                        ids.len(),
                        waits.first().copied().unwrap_or_default()
                    );

                    state.stats.record_trigger(trigger);
                    state.stats.bots_spawned += game.bot_count() as u64;
                    report.matches_created += 1;
                    report.match_ids.push(game.match_id.clone());
                    state.match_sessions.insert(game.match_id.clone(), ids.clone());
                    state.matches.insert(game.match_id.clone(), game);
                    touched.extend(ids);
                }

                self.metrics_collector
                    .set_waiting(&rule.key, state.registry.waiting_count(&rule.key));
            }

            let mut affected = state.registry.all_waiting_ids();
            affected.extend(touched);
            collect_deliveries(state, affected)
        };

        self.metrics_collector.record_tick(timer.stop());
        report.delivered = self.deliver(deliveries).delivered;
        Ok(report)
    }

    /// Spawn the periodic scheduler task
    pub fn start_scheduler(self: Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let policy = self.config.policy;
        tokio::spawn(run_scheduler(self, policy, shutdown))
    }

    /// Send rendered payloads outside the lock, then prune failed connections
    fn deliver(&self, deliveries: Vec<Delivery>) -> DeliveryReport {
        if deliveries.is_empty() {
            return DeliveryReport::default();
        }

        let report = dispatch(&deliveries);
        self.metrics_collector
            .record_fanout(report.delivered, report.failed());

        match self.lock() {
            Ok(mut state) => {
                state.stats.notifications_delivered += report.delivered as u64;
                state.stats.notifications_dropped += report.failed() as u64;
                let pruned = state.subscribers.prune(&report.stale);
                if pruned > 0 {
                    warn!("Pruned {} stale live connections", pruned);
                }
                self.metrics_collector
                    .set_live_subscribers(state.subscribers.connection_count());
            }
            Err(e) => error!("Skipping subscriber pruning: {}", e),
        }

        report
    }
}

/// Serialize a payload for the wire; failures are logged and skipped
fn encode<T: Serialize>(session_id: &str, view: &T) -> Option<Arc<str>> {
    match serde_json::to_string(view) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            error!("Failed to serialize payload for session {}: {}", session_id, e);
            None
        }
    }
}

/// Render the current payload of each distinct session that has subscribers
///
/// Vanished sessions get the closed sentinel and lose their subscribers.
fn collect_deliveries(state: &mut MatchmakerState, session_ids: Vec<SessionId>) -> Vec<Delivery> {
    let mut seen = HashSet::new();
    let mut deliveries = Vec::new();

    for session_id in session_ids {
        if !seen.insert(session_id.clone()) || !state.subscribers.has_subscribers(&session_id) {
            continue;
        }

        let delivery = match state.registry.get(&session_id) {
            Some(session) => {
                let view = serialize_session(session, state.registry.queue_position(&session_id));
                encode(&session_id, &view).map(|payload| Delivery {
                    payload,
                    connections: state.subscribers.snapshot(&session_id),
                    session_id: session_id.clone(),
                    close_after: false,
                })
            }
            None => encode(&session_id, &ClosedView::new(&session_id)).map(|payload| Delivery {
                payload,
                connections: state.subscribers.take_all(&session_id),
                session_id: session_id.clone(),
                close_after: true,
            }),
        };

        deliveries.extend(delivery);
    }

    deliveries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmetics::StaticCosmeticsProvider;
    use crate::lobby::provider::StaticModeProvider;
    use serde_json::json;

    fn matchmaker() -> Matchmaker {
        let config = MatchmakerConfig {
            rng_seed: Some(7),
            ..MatchmakerConfig::default()
        };
        Matchmaker::new(
            Arc::new(StaticModeProvider::new()),
            Arc::new(StaticCosmeticsProvider::with_seed(7)),
            config,
        )
        .unwrap()
    }

    async fn enqueue_many(mm: &Matchmaker, mode: &str, count: usize) -> Vec<PlayerSession> {
        let mut sessions = Vec::new();
        for i in 0..count {
            let session = mm
                .enqueue(i as u64, &format!("Pilot {}", i), json!({ "outfitId": "outfit-sentinel" }), mode)
                .await
                .unwrap();
            sessions.push(session);
        }
        sessions
    }

    #[tokio::test]
    async fn test_enqueue_rejects_unknown_mode() {
        let mm = matchmaker();
        let err = mm.enqueue(1, "Pilot", json!({}), "trios").await.unwrap_err();
        let err = err.downcast_ref::<MatchmakingError>().unwrap();
        assert!(err.is_bad_request());
        assert_eq!(mm.lobby_snapshot().await.unwrap().searching, 0);
    }

    #[tokio::test]
    async fn test_enqueue_reports_positions() {
        let mm = matchmaker();
        let sessions = enqueue_many(&mm, "squad", 3).await;

        for (i, session) in sessions.iter().enumerate() {
            let view = mm.serialize_session(&session.session_id).await.unwrap().unwrap();
            assert_eq!(view.status, SessionStatus::Waiting);
            assert_eq!(view.queue_position, Some(i + 1));
            assert_eq!(view.players_searching, Some(3));
        }
        assert_eq!(mm.get_stats().await.unwrap().sessions_enqueued, 3);
    }

    #[tokio::test]
    async fn test_cancel_waiting_session() {
        let mm = matchmaker();
        let sessions = enqueue_many(&mm, "squad", 2).await;

        assert!(mm.cancel(&sessions[0].session_id).await.unwrap());
        assert!(!mm.cancel(&sessions[0].session_id).await.unwrap());
        assert!(mm.get_session(&sessions[0].session_id).await.unwrap().is_none());

        let view = mm.serialize_session(&sessions[1].session_id).await.unwrap().unwrap();
        assert_eq!(view.queue_position, Some(1));
        assert_eq!(mm.lobby_snapshot().await.unwrap().searching, 1);
    }

    #[tokio::test]
    async fn test_capacity_fill_in_one_tick() {
        let mm = matchmaker();
        let sessions = enqueue_many(&mm, "squad", 8).await;

        let report = mm.tick().await.unwrap();
        assert_eq!(report.matches_created, 1);

        let game = mm.get_match(&report.match_ids[0]).await.unwrap().unwrap();
        assert_eq!(game.player_count(), 8);
        assert_eq!(game.bot_count(), 0);
        for session in &sessions {
            let session = mm.get_session(&session.session_id).await.unwrap().unwrap();
            assert_eq!(session.status, SessionStatus::Matched);
        }
        assert_eq!(mm.get_stats().await.unwrap().capacity_fill_matches, 1);
    }

    #[tokio::test]
    async fn test_capacity_fill_drains_before_other_policies() {
        let mm = matchmaker();
        enqueue_many(&mm, "squad", 13).await;

        // 13 waited long enough for every policy: one full match, then
        // quick start picks up the remaining 5
        let report = mm.tick_at(Instant::now() + Duration::from_secs(4)).await.unwrap();
        assert_eq!(report.matches_created, 2);

        let stats = mm.get_stats().await.unwrap();
        assert_eq!(stats.capacity_fill_matches, 1);
        assert_eq!(stats.quick_start_matches, 1);
        assert_eq!(stats.bots_spawned, 3);
        assert_eq!(stats.players_waiting, 0);
    }

    #[tokio::test]
    async fn test_nothing_happens_before_thresholds() {
        let mm = matchmaker();
        enqueue_many(&mm, "squad", 3).await;

        let report = mm.tick_at(Instant::now() + Duration::from_secs(10)).await.unwrap();
        assert_eq!(report.matches_created, 0);
        assert_eq!(mm.lobby_snapshot().await.unwrap().searching, 3);
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let mm = matchmaker();
        let sessions = enqueue_many(&mm, "squad", 8).await;
        mm.tick().await.unwrap();

        let first = mm.acknowledge_match(&sessions[0].session_id).await.unwrap().unwrap();
        let second = mm.acknowledge_match(&sessions[0].session_id).await.unwrap().unwrap();
        assert!(first.started_at.is_some());
        assert_eq!(first.started_at, second.started_at);
        assert_eq!(first.match_id, second.match_id);

        let acker = mm.get_session(&sessions[0].session_id).await.unwrap().unwrap();
        assert_eq!(acker.status, SessionStatus::Playing);
        let other = mm.get_session(&sessions[1].session_id).await.unwrap().unwrap();
        assert_eq!(other.status, SessionStatus::Matched);

        // Cached views of every participant see the start time
        let view = mm.serialize_session(&sessions[1].session_id).await.unwrap().unwrap();
        assert_eq!(view.match_view.unwrap().started_at, first.started_at);

        let snapshot = mm.lobby_snapshot().await.unwrap();
        assert_eq!(snapshot.active_matches, 1);
        assert_eq!(snapshot.online_players, 8);
        assert_eq!(mm.get_stats().await.unwrap().matches_started, 1);
    }

    #[tokio::test]
    async fn test_acknowledge_unknown_or_waiting() {
        let mm = matchmaker();
        let sessions = enqueue_many(&mm, "solo", 1).await;

        assert!(mm.acknowledge_match("missing").await.unwrap().is_none());
        assert!(mm
            .acknowledge_match(&sessions[0].session_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_serialize_match_for_session_highlights_squad() {
        let mm = matchmaker();
        let sessions = enqueue_many(&mm, "duo", 12).await;
        let report = mm.tick().await.unwrap();
        let match_id = &report.match_ids[0];

        for session in &sessions {
            let stored = mm.get_session(&session.session_id).await.unwrap().unwrap();
            let view = mm
                .serialize_match_for_session(match_id, &session.session_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(view.player_squad_id, stored.squad_id);
            assert_eq!(view.player_squad.unwrap().squad_id, stored.squad_id.unwrap());
        }

        let neutral = mm.serialize_match(match_id).await.unwrap().unwrap();
        assert!(neutral.player_squad_id.is_none());
        assert!(mm.serialize_match("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_presence_snapshot() {
        let mm = matchmaker();
        let session = mm.enqueue(42, "Pilot", json!({}), "solo").await.unwrap();
        mm.enqueue(42, "Pilot", json!({}), "squad").await.unwrap();

        mm.tick_at(Instant::now() + Duration::from_secs(20)).await.unwrap();
        mm.acknowledge_match(&session.session_id).await.unwrap();

        let presence = mm.presence_snapshot().await.unwrap();
        assert_eq!(presence.get(&42), Some(&SessionStatus::Playing));
    }

    #[tokio::test]
    async fn test_subscribe_pushes_state_and_cancel_closes() {
        let mm = matchmaker();
        let session = mm.enqueue(1, "Pilot", json!({}), "squad").await.unwrap();

        let (_, mut rx) = mm.open_connection(&session.session_id).await.unwrap();
        let LiveFrame::Payload(payload) = rx.recv().await.unwrap() else {
            panic!("expected a payload frame");
        };
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["status"], "waiting");
        assert_eq!(value["queuePosition"], 1);

        mm.cancel(&session.session_id).await.unwrap();
        let LiveFrame::Payload(payload) = rx.recv().await.unwrap() else {
            panic!("expected the closed sentinel");
        };
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["status"], "closed");
        assert_eq!(rx.recv().await, Some(LiveFrame::Close));
        assert_eq!(mm.get_stats().await.unwrap().live_connections, 0);
    }

    #[tokio::test]
    async fn test_subscribe_unknown_session_gets_sentinel() {
        let mm = matchmaker();
        let (_, mut rx) = mm.open_connection("missing").await.unwrap();

        let LiveFrame::Payload(payload) = rx.recv().await.unwrap() else {
            panic!("expected the closed sentinel");
        };
        assert!(payload.contains("\"closed\""));
        assert_eq!(rx.recv().await, Some(LiveFrame::Close));
        assert_eq!(mm.get_stats().await.unwrap().live_connections, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let mm = matchmaker();
        let session = mm.enqueue(1, "Pilot", json!({}), "squad").await.unwrap();
        let (connection_id, _rx) = mm.open_connection(&session.session_id).await.unwrap();

        assert!(mm.unsubscribe(&session.session_id, connection_id).await.unwrap());
        assert!(!mm.unsubscribe(&session.session_id, connection_id).await.unwrap());
        assert!(!mm.unsubscribe("missing", 999).await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let mm = matchmaker();
        let session = mm.enqueue(1, "Pilot", json!({}), "squad").await.unwrap();
        let (_, rx) = mm.open_connection(&session.session_id).await.unwrap();
        drop(rx);

        let report = mm.notify([session.session_id.as_str()]).await.unwrap();
        assert_eq!(report.failed(), 1);

        let stats = mm.get_stats().await.unwrap();
        assert_eq!(stats.live_connections, 0);
        assert_eq!(stats.notifications_dropped, 1);
    }

    #[tokio::test]
    async fn test_notify_repeated_ids_delivers_once() {
        let mm = matchmaker();
        let session = mm.enqueue(1, "Pilot", json!({}), "squad").await.unwrap();
        let id = session.session_id.as_str();
        let (_, mut rx) = mm.open_connection(id).await.unwrap();
        // Initial state frame from subscribe
        assert!(matches!(rx.recv().await, Some(LiveFrame::Payload(_))));

        let report = mm.notify([id, id, id]).await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed(), 0);

        assert!(matches!(rx.try_recv(), Ok(LiveFrame::Payload(_))));
        assert!(rx.try_recv().is_err());
    }

    struct FixedModes(Vec<ModeRule>);

    impl ModeProvider for FixedModes {
        fn get_mode_rule(&self, mode: &str) -> Result<ModeRule> {
            self.0
                .iter()
                .find(|rule| rule.key == mode)
                .cloned()
                .ok_or_else(|| {
                    MatchmakingError::InvalidMode {
                        mode: mode.to_string(),
                    }
                    .into()
                })
        }

        fn available_modes(&self) -> Vec<ModeRule> {
            self.0.clone()
        }
    }

    fn build(provider: FixedModes, config: MatchmakerConfig) -> Result<Matchmaker> {
        Matchmaker::new(
            Arc::new(provider),
            Arc::new(StaticCosmeticsProvider::with_seed(7)),
            config,
        )
    }

    #[test]
    fn test_construction_rejects_unusable_settings() {
        let zero_team = FixedModes(vec![ModeRule::new("broken", "Broken", 0, 8)]);
        assert!(build(zero_team, MatchmakerConfig::default()).is_err());

        assert!(build(FixedModes(Vec::new()), MatchmakerConfig::default()).is_err());

        let zero_tick = MatchmakerConfig {
            policy: SchedulerPolicy {
                tick_interval: Duration::ZERO,
                ..SchedulerPolicy::default()
            },
            ..MatchmakerConfig::default()
        };
        assert!(build(FixedModes(ModeRule::defaults()), zero_tick).is_err());

        assert!(build(FixedModes(ModeRule::defaults()), MatchmakerConfig::default()).is_ok());
    }
}
