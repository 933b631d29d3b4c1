//! Periodic reindex of a chemical index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use chemlink_core::defaults::SEARCH_INDEX_INTERVAL_SECS;
use chemlink_core::{ChemicalIndex, Error, Result};

const EVENT_CAPACITY: usize = 16;

/// Outcome channel for one requested reindex.
type Reply = oneshot::Sender<Result<()>>;

/// Configuration for the index scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between reindex runs.
    pub interval: Duration,
    /// Whether periodic reindexing runs at all.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SEARCH_INDEX_INTERVAL_SECS),
            enabled: true,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SEARCH_INDEX_ENABLED` | `true` | Enable/disable periodic reindex |
    /// | `SEARCH_INDEX_INTERVAL_SECS` | `300` | Seconds between reindex runs |
    pub fn from_env() -> Self {
        let enabled = std::env::var("SEARCH_INDEX_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let secs = std::env::var("SEARCH_INDEX_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(SEARCH_INDEX_INTERVAL_SECS);

        Self {
            interval: Duration::from_secs(secs),
            enabled,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    SchedulerStarted,
    ReindexCompleted { duration_ms: u64 },
    ReindexFailed { error: String },
    SchedulerStopped,
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    trigger_tx: mpsc::Sender<Reply>,
    event_rx: broadcast::Receiver<SchedulerEvent>,
}

impl SchedulerHandle {
    /// Signal the scheduler to stop after any in-flight reindex.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Reindex now on the scheduler task and wait for the outcome.
    ///
    /// Runs in sequence with scheduled reindexes, never alongside one.
    pub async fn trigger(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.trigger_tx
            .send(reply_tx)
            .await
            .map_err(|_| Error::Internal("Index scheduler is not running".into()))?;
        reply_rx
            .await
            .map_err(|_| Error::Internal("Index scheduler stopped before reindexing".into()))?
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Folds DELTA into FAST on a fixed interval.
///
/// The first run happens one full interval after start; none runs at startup.
pub struct IndexScheduler {
    index: Arc<dyn ChemicalIndex>,
    config: SchedulerConfig,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl IndexScheduler {
    pub fn new(index: Arc<dyn ChemicalIndex>, config: SchedulerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            index,
            config,
            event_tx,
        }
    }

    /// Start the scheduler and return a handle for control.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx, &mut trigger_rx).await;
        });

        SchedulerHandle {
            shutdown_tx,
            trigger_tx,
            event_rx,
        }
    }

    #[instrument(skip_all, fields(index = self.index.name()))]
    async fn run(
        &self,
        shutdown_rx: &mut mpsc::Receiver<()>,
        trigger_rx: &mut mpsc::Receiver<Reply>,
    ) {
        if !self.config.enabled {
            info!(
                subsystem = "search",
                component = "scheduler",
                "Index scheduler is disabled, not starting"
            );
            return;
        }

        info!(
            subsystem = "search",
            component = "scheduler",
            interval_secs = self.config.interval.as_secs(),
            "Index scheduler started"
        );
        let _ = self.event_tx.send(SchedulerEvent::SchedulerStarted);

        let mut ticker = interval_at(
            tokio::time::Instant::now() + self.config.interval,
            self.config.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(
                        subsystem = "search",
                        component = "scheduler",
                        "Index scheduler received shutdown signal"
                    );
                    break;
                }
                Some(reply) = trigger_rx.recv() => {
                    debug!(subsystem = "search", component = "scheduler", "Manual reindex trigger");
                    let _ = reply.send(self.reindex_once().await);
                }
                _ = ticker.tick() => {
                    let _ = self.reindex_once().await;
                }
            }
        }

        let _ = self.event_tx.send(SchedulerEvent::SchedulerStopped);
        info!(subsystem = "search", component = "scheduler", "Index scheduler stopped");
    }

    /// Failures are reported and the next tick proceeds as usual.
    async fn reindex_once(&self) -> Result<()> {
        let start = Instant::now();
        match self.index.reindex().await {
            Ok(()) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    subsystem = "search",
                    component = "scheduler",
                    op = "reindex",
                    duration_ms,
                    "Scheduled reindex complete"
                );
                let _ = self
                    .event_tx
                    .send(SchedulerEvent::ReindexCompleted { duration_ms });
                Ok(())
            }
            Err(e) => {
                error!(
                    subsystem = "search",
                    component = "scheduler",
                    op = "reindex",
                    error = %e,
                    "Scheduled reindex failed"
                );
                let _ = self.event_tx.send(SchedulerEvent::ReindexFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
