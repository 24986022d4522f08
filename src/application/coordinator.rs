//! Portfolio Coordinator
//!
//! Runs one monitor task per position and races them. The first task to
//! finish (its stop-loss fired) is the primary: it is sold first, then every
//! other position is liquidated unconditionally, one at a time.
//!
//! The race is a `JoinSet`: the first task `join_next` yields wins, unless
//! other monitors had already finished by then, in which case the lowest
//! registration index among them wins. Exactly one primary is chosen; the
//! remaining monitors are aborted and never acted upon as primary.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::task::JoinSet;

use crate::domain::{
    CheckpointStore, Disposal, DisposalOutcome, LiquidationManifest, MonitorState, Position,
    StopLossFraction, TriggerReason,
};
use crate::ports::{PriceOracle, SwapExecutor};
use super::position_monitor::{PositionMonitor, DEFAULT_POLL_INTERVAL};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub stop_loss_fraction: StopLossFraction,
    pub poll_interval: Duration,
    /// Sell attempts per position before its disposal is recorded as failed
    pub sell_attempts: u32,
    pub sell_retry_delay: Duration,
}

impl CoordinatorConfig {
    pub fn new(stop_loss_fraction: StopLossFraction) -> Self {
        Self {
            stop_loss_fraction,
            poll_interval: DEFAULT_POLL_INTERVAL,
            sell_attempts: 1,
            sell_retry_delay: Duration::from_secs(2),
        }
    }
}

pub struct PortfolioCoordinator {
    oracle: Arc<dyn PriceOracle>,
    executor: Arc<dyn SwapExecutor>,
    config: CoordinatorConfig,
    checkpoints: Option<CheckpointStore>,
}

impl PortfolioCoordinator {
    pub fn new(
        oracle: Arc<dyn PriceOracle>,
        executor: Arc<dyn SwapExecutor>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            oracle,
            executor,
            config,
            checkpoints: None,
        }
    }

    pub fn with_checkpoints(mut self, store: Option<CheckpointStore>) -> Self {
        self.checkpoints = store;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Monitor every position until the first stop-loss fires, then liquidate
    /// the whole batch and return what each sell realized.
    pub async fn run(&self, positions: Vec<Position>) -> LiquidationManifest {
        let states = positions
            .into_iter()
            .map(|p| MonitorState::new(p, self.config.stop_loss_fraction))
            .collect();
        self.run_states(states).await
    }

    /// Race existing monitor states, e.g. restored from checkpoints.
    ///
    /// A state that is already triggered wins immediately.
    pub async fn run_states(&self, states: Vec<MonitorState>) -> LiquidationManifest {
        if states.is_empty() {
            return LiquidationManifest::empty();
        }

        let mut monitors = JoinSet::new();
        for (index, state) in states.iter().cloned().enumerate() {
            let monitor = PositionMonitor::new(state, Arc::clone(&self.oracle))
                .with_poll_interval(self.config.poll_interval)
                .with_checkpoints(self.checkpoints.clone());

            monitors.spawn(async move { (index, monitor.run().await) });
        }

        tracing::info!("Racing {} position monitors", states.len());

        let mut primary = loop {
            match monitors.join_next().await {
                Some(Ok(winner)) => break Some(winner),
                Some(Err(e)) => tracing::error!("Position monitor task failed: {}", e),
                None => break None,
            }
        };

        // Monitors that fired in the same tick: lowest registration index wins.
        tokio::task::yield_now().await;
        while let Some(finished) = monitors.try_join_next() {
            match finished {
                Ok(other) if primary.as_ref().is_some_and(|(index, _)| other.0 < *index) => {
                    primary = Some(other)
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Position monitor task failed: {}", e),
            }
        }
        monitors.abort_all();

        let Some((primary_index, mut primary_state)) = primary else {
            tracing::error!(
                "Every monitor exited without a trigger; {} positions left unmanaged",
                states.len()
            );
            return LiquidationManifest::empty();
        };

        let primary_token = primary_state.position().token.clone();
        tracing::info!(
            "Primary trigger: {} - liquidating {} positions",
            primary_state.position().label(),
            states.len()
        );

        let mut disposals = Vec::with_capacity(states.len());
        disposals.push(self.dispose(&mut primary_state).await);

        for (index, mut state) in states.into_iter().enumerate() {
            if index == primary_index {
                continue;
            }
            let mut state = self.latest_high_water_mark(state);
            state.force_liquidation();
            disposals.push(self.dispose(&mut state).await);
        }

        let manifest = LiquidationManifest::new(Some(primary_token), disposals);
        self.report(&manifest);
        manifest
    }

    /// Sell one triggered position, retrying without re-checking price.
    ///
    /// On failure the state stays `Triggered` and is checkpointed so the
    /// position can be found and sold later.
    pub async fn dispose(&self, state: &mut MonitorState) -> Disposal {
        let position = state.position().clone();
        let reason = state.trigger_reason().unwrap_or(TriggerReason::Liquidation);
        let max_attempts = self.config.sell_attempts.max(1);
        let mut attempts = 0;

        let outcome = loop {
            attempts += 1;
            tracing::info!(
                "SELL {} ({:?}) {} along {:?} - attempt {}/{}",
                position.label(),
                reason,
                position.held_amount,
                position.path_out,
                attempts,
                max_attempts
            );

            match self
                .executor
                .execute_swap(&position.chain, &position.path_out, position.held_amount)
                .await
            {
                Ok(receipt) => {
                    if let Err(e) = state.mark_sold(receipt.amount_out) {
                        tracing::warn!("Unexpected state for {}: {}", position.label(), e);
                    }
                    tracing::info!(
                        "SOLD {} for {} (tx: {})",
                        position.label(),
                        receipt.amount_out,
                        receipt.tx_hash.as_deref().unwrap_or("n/a")
                    );
                    if let Some(store) = &self.checkpoints {
                        if let Err(e) = store.remove(&position) {
                            tracing::warn!("Failed to clear checkpoint for {}: {}", position.label(), e);
                        }
                    }
                    break DisposalOutcome::Sold {
                        realized: receipt.amount_out,
                        attempts,
                    };
                }
                Err(e) if attempts < max_attempts => {
                    tracing::warn!(
                        "Sell attempt {}/{} for {} failed: {} (retrying in {:?})",
                        attempts,
                        max_attempts,
                        position.label(),
                        e,
                        self.config.sell_retry_delay
                    );
                    tokio::time::sleep(self.config.sell_retry_delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "SELL FAILED {} after {} attempts: {} - position left triggered",
                        position.label(),
                        attempts,
                        e
                    );
                    if let Some(store) = &self.checkpoints {
                        if let Err(e) = store.save(state) {
                            tracing::warn!("Checkpoint failed for {}: {}", position.label(), e);
                        }
                    }
                    break DisposalOutcome::Failed {
                        error: e.to_string(),
                        attempts,
                    };
                }
            }
        };

        Disposal {
            position,
            reason,
            outcome,
        }
    }

    /// Carry over the high-water mark the aborted monitor checkpointed, so a
    /// failed sweep sell does not overwrite it with the registration-time state.
    fn latest_high_water_mark(&self, state: MonitorState) -> MonitorState {
        let Some(store) = &self.checkpoints else {
            return state;
        };

        match store.load(state.position()) {
            Ok(Some(checkpoint)) if checkpoint.high_water_mark > state.high_water_mark() => {
                MonitorState::restore(
                    state.position().clone(),
                    state.stop_loss_fraction(),
                    checkpoint.high_water_mark,
                    state.phase().clone(),
                )
            }
            Ok(_) => state,
            Err(e) => {
                tracing::warn!("Failed to read checkpoint for {}: {}", state.position().label(), e);
                state
            }
        }
    }

    fn report(&self, manifest: &LiquidationManifest) {
        let failed = manifest.failures().count();
        let total: Decimal = manifest.total_realized();

        if failed > 0 {
            tracing::error!(
                "Liquidation finished with {} failed sells out of {} (realized {})",
                failed,
                manifest.disposals.len(),
                total
            );
        } else {
            tracing::info!(
                "Liquidation complete: {} positions sold, realized {}",
                manifest.disposals.len(),
                total
            );
        }

        if let Some(store) = &self.checkpoints {
            if let Err(e) = store.save_manifest(manifest) {
                tracing::warn!("Failed to write liquidation manifest: {}", e);
            }
        }
    }
}
