//! Main application state and service coordination
//!
//! This module contains the AppState that wires the matchmaker to its
//! collaborators and owns the background tasks: the scheduler, the health
//! server and the health metrics updater.

use crate::config::AppConfig;
use crate::cosmetics::StaticCosmeticsProvider;
use crate::lobby::{Matchmaker, MatchmakerConfig, StaticModeProvider};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::service::health::HealthCheck;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core matchmaking component
    matchmaker: Arc<Matchmaker>,

    metrics_collector: Arc<MetricsCollector>,

    /// Stops the scheduler and health metrics tasks
    shutdown_tx: broadcast::Sender<()>,

    scheduler_task: Mutex<Option<JoinHandle<()>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    health_server: Mutex<Option<Arc<HealthServer>>>,

    /// Service status
    is_running: RwLock<bool>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing matchmaking service '{}'", config.service.name);

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let matchmaker = Self::initialize_matchmaker(&config, metrics_collector.clone())?;
        let (shutdown_tx, _) = broadcast::channel(4);

        Ok(Self {
            config,
            matchmaker,
            metrics_collector,
            shutdown_tx,
            scheduler_task: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            health_server: Mutex::new(None),
            is_running: RwLock::new(false),
            started_at: Instant::now(),
        })
    }

    fn initialize_matchmaker(
        config: &AppConfig,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<Arc<Matchmaker>, ServiceError> {
        let mode_provider = StaticModeProvider::with_rules(config.modes.clone()).map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to load mode rules: {}", e),
            }
        })?;

        let cosmetics = match config.matchmaking.rng_seed {
            Some(seed) => StaticCosmeticsProvider::with_seed(seed),
            None => StaticCosmeticsProvider::new(),
        };

        for rule in &config.modes {
            info!(
                "Mode '{}' ({}): team size {}, {} per match",
                rule.key, rule.label, rule.team_size, rule.players_per_match
            );
        }

        let matchmaker = Matchmaker::with_metrics(
            Arc::new(mode_provider),
            Arc::new(cosmetics),
            MatchmakerConfig::from(config),
            metrics_collector,
        )
        .map_err(|e| ServiceError::Configuration {
            message: format!("Invalid matchmaker configuration: {}", e),
        })?;

        Ok(Arc::new(matchmaker))
    }

    /// Start the scheduler, health endpoints and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting matchmaking service");

        *self.is_running.write().await = true;

        self.start_health_server().await?;

        let scheduler = self
            .matchmaker
            .clone()
            .start_scheduler(self.shutdown_tx.subscribe());
        *self.scheduler_task.lock().await = Some(scheduler);

        self.start_health_metrics_task().await;

        info!("✅ Matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");

        *self.is_running.write().await = false;

        if self.shutdown_tx.send(()).is_err() {
            debug!("No background task was listening for shutdown");
        }

        if let Some(server) = self.health_server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            }
        }

        let mut handles: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        if let Some(scheduler) = self.scheduler_task.lock().await.take() {
            handles.push(scheduler);
        }
        self.stop_background_tasks(handles).await;

        let final_stats = self
            .matchmaker
            .get_stats()
            .await
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Matchmaking service shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn matchmaker(&self) -> Arc<Matchmaker> {
        self.matchmaker.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn scheduler_alive(&self) -> bool {
        self.scheduler_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_health_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let port = self.config.service.health_port;
        info!("Starting metrics and health endpoints on port {}", port);

        let health_config = HealthServerConfig {
            port,
            host: "0.0.0.0".to_string(),
        };
        let server = Arc::new(
            HealthServer::new(health_config, self.metrics_collector.clone())
                .with_app_state(self.clone()),
        );

        let task = {
            let server = server.clone();
            tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    error!("Health server failed: {}", e);
                } else {
                    info!("Health server task completed");
                }
            })
        };

        *self.health_server.lock().await = Some(server);
        self.background_tasks.lock().await.push(task);
        Ok(())
    }

    /// Periodically export uptime and health gauges
    async fn start_health_metrics_task(self: &Arc<Self>) {
        let app_state = Arc::downgrade(self);
        let mut shutdown = self.shutdown_tx.subscribe();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(15));
            debug!("Health metrics task started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(app_state) = app_state.upgrade() else {
                            break;
                        };
                        let collector = app_state.metrics_collector();
                        collector.update_uptime(app_state.uptime());

                        match HealthCheck::check(app_state.clone()).await {
                            Ok(health) => {
                                collector.update_health_status(health.status.as_gauge());
                                for check in &health.checks {
                                    collector.update_component_health(
                                        &check.name,
                                        check.status.as_gauge() > 0,
                                    );
                                }
                                debug!(
                                    "Health: {} - {} waiting, {} matches created",
                                    health.status,
                                    health.stats.players_waiting,
                                    health.stats.matches_created
                                );
                            }
                            Err(e) => warn!("Health check failed: {}", e),
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }

            debug!("Health metrics task stopped");
        });

        self.background_tasks.lock().await.push(task);
    }

    /// Wait for tasks to finish, aborting stragglers after the shutdown timeout
    async fn stop_background_tasks(&self, handles: Vec<JoinHandle<()>>) {
        let task_count = handles.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        let deadline = Instant::now() + self.config.shutdown_timeout();

        for (i, mut handle) in handles.into_iter().enumerate() {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => debug!("Background task {}/{} finished", i + 1, task_count),
                Ok(Err(e)) => warn!("Background task {}/{} failed: {}", i + 1, task_count, e),
                Err(_) => {
                    warn!("Background task {}/{} timed out, aborting", i + 1, task_count);
                    handle.abort();
                }
            }
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
