//! Discovery Loop
//!
//! Polls the discovery source on a fixed interval. Each non-empty result is
//! handed to a detached task that acquires the batch and runs the portfolio
//! coordinator over it; the loop never waits for that task before sleeping
//! and polling again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;

use crate::domain::LiquidationManifest;
use crate::ports::{DiscoveryError, DiscoverySource};
use super::acquisition::AcquisitionPipeline;
use super::coordinator::PortfolioCoordinator;

pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(600);

/// Status snapshot of the discovery loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryStatus {
    pub is_running: bool,
    pub cycles: u64,
    pub batches_spawned: u64,
    pub discovery_failures: u64,
}

#[derive(Default)]
struct Counters {
    cycles: AtomicU64,
    batches_spawned: AtomicU64,
    discovery_failures: AtomicU64,
}

#[derive(Clone)]
pub struct DiscoveryLoop {
    source: Arc<dyn DiscoverySource>,
    pipeline: Arc<AcquisitionPipeline>,
    coordinator: Arc<PortfolioCoordinator>,
    interval: Duration,
    is_running: Arc<RwLock<bool>>,
    stop_requested: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    counters: Arc<Counters>,
}

impl DiscoveryLoop {
    pub fn new(
        source: Arc<dyn DiscoverySource>,
        pipeline: Arc<AcquisitionPipeline>,
        coordinator: Arc<PortfolioCoordinator>,
    ) -> Self {
        Self {
            source,
            pipeline,
            coordinator,
            interval: DEFAULT_DISCOVERY_INTERVAL,
            is_running: Arc::new(RwLock::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run discovery cycles until `stop` is called.
    ///
    /// Returns without a cycle if `stop` was called before `run`.
    pub async fn run(&self) {
        if self.stop_requested.load(Ordering::SeqCst) {
            tracing::info!("Discovery loop stopped before it started");
            return;
        }
        *self.is_running.write().await = true;

        tracing::info!(
            "Starting discovery loop - source: {}, interval: {:?}",
            self.source.name(),
            self.interval
        );

        while !self.stop_requested.load(Ordering::SeqCst) {
            if let Err(e) = self.tick().await {
                tracing::warn!("Discovery cycle skipped: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.notified() => {}
            }
        }

        *self.is_running.write().await = false;
        tracing::info!("Discovery loop stopped");
    }

    /// One discovery cycle.
    ///
    /// Returns the handle of the spawned batch task, or `None` when discovery
    /// found nothing. Dropping the handle leaves the batch running.
    pub async fn tick(
        &self,
    ) -> Result<Option<JoinHandle<Option<LiquidationManifest>>>, DiscoveryError> {
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);

        let candidates = match self.source.discover().await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.counters.discovery_failures.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        if candidates.is_empty() {
            tracing::info!("No new listings from {}", self.source.name());
            return Ok(None);
        }

        let batch_id = self.counters.batches_spawned.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!("Discovered {} candidates, starting batch #{}", candidates.len(), batch_id);

        let pipeline = Arc::clone(&self.pipeline);
        let coordinator = Arc::clone(&self.coordinator);

        let handle = tokio::spawn(async move {
            let batch = pipeline.acquire(candidates).await;
            if batch.is_empty() {
                tracing::warn!("Batch #{} acquired no positions", batch_id);
                return None;
            }

            let manifest = coordinator.run(batch.positions).await;
            tracing::info!(
                "Batch #{} closed: realized {} across {} positions",
                batch_id,
                manifest.total_realized(),
                manifest.disposals.len()
            );
            Some(manifest)
        });

        Ok(Some(handle))
    }

    /// Stop the loop after the current cycle
    pub async fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        *self.is_running.write().await = false;
        self.shutdown.notify_one();
        tracing::info!("Stop signal sent to discovery loop");
    }

    pub async fn status(&self) -> DiscoveryStatus {
        DiscoveryStatus {
            is_running: *self.is_running.read().await,
            cycles: self.counters.cycles.load(Ordering::Relaxed),
            batches_spawned: self.counters.batches_spawned.load(Ordering::Relaxed),
            discovery_failures: self.counters.discovery_failures.load(Ordering::Relaxed),
        }
    }
}
