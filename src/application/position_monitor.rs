//! Position Monitor
//!
//! Drives one `MonitorState` with live quotes: poll, then wait a fixed delay,
//! until the stop-loss fires. Each monitor runs as its own task so slow quotes
//! for one position never delay another.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{CheckpointStore, MonitorState, Observation};
use crate::ports::{FeedError, PriceOracle};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct PositionMonitor {
    state: MonitorState,
    oracle: Arc<dyn PriceOracle>,
    poll_interval: Duration,
    checkpoints: Option<CheckpointStore>,
}

impl PositionMonitor {
    pub fn new(state: MonitorState, oracle: Arc<dyn PriceOracle>) -> Self {
        Self {
            state,
            oracle,
            poll_interval: DEFAULT_POLL_INTERVAL,
            checkpoints: None,
        }
    }

    /// Set custom poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Persist a checkpoint on every high-water mark raise and trigger
    pub fn with_checkpoints(mut self, store: Option<CheckpointStore>) -> Self {
        self.checkpoints = store;
        self
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Quote the position once and feed the value to the state machine.
    ///
    /// A feed error leaves the state untouched. Once the state has left
    /// `Watching` no quote is requested at all.
    pub async fn poll(&mut self) -> Result<Observation, FeedError> {
        if !self.state.is_watching() {
            return Ok(Observation::Ignored);
        }

        let position = self.state.position();
        let quote = self
            .oracle
            .quote(&position.chain, &position.path_out, position.held_amount)
            .await?;

        let observation = self.state.observe(quote.output_amount);
        let label = self.state.position().label();

        match &observation {
            Observation::NewHigh { high_water_mark } => {
                tracing::debug!("{} new high: {}", label, high_water_mark);
                self.checkpoint();
            }
            Observation::Holding { value, threshold } => {
                tracing::debug!(
                    "{} value {} | high {} | stop {}",
                    label,
                    value,
                    self.state.high_water_mark(),
                    threshold
                );
            }
            Observation::Triggered { value, threshold } => {
                tracing::info!(
                    "STOP-LOSS {} value {} fell below {} (high {})",
                    label,
                    value,
                    threshold,
                    self.state.high_water_mark()
                );
                self.checkpoint();
            }
            Observation::Ignored => {}
        }

        Ok(observation)
    }

    /// Poll until the stop-loss fires, then hand the triggered state back.
    ///
    /// Feed errors are logged and retried on the next cycle; they never end
    /// the loop.
    pub async fn run(mut self) -> MonitorState {
        tracing::info!(
            "Monitoring {} ({} held, stop {}%, every {:?})",
            self.state.position().label(),
            self.state.position().held_amount,
            self.state.stop_loss_fraction().value() * rust_decimal::Decimal::ONE_HUNDRED,
            self.poll_interval
        );

        loop {
            match self.poll().await {
                Ok(Observation::Triggered { .. }) | Ok(Observation::Ignored) => return self.state,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        "Quote failed for {}: {} (retrying in {:?})",
                        self.state.position().label(),
                        e,
                        self.poll_interval
                    );
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn checkpoint(&self) {
        if let Some(store) = &self.checkpoints {
            if let Err(e) = store.save(&self.state) {
                tracing::warn!("Checkpoint failed for {}: {}", self.state.position().label(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainRoute, Phase, Position, StopLossFraction, TriggerReason};
    use crate::ports::mocks::ScriptedOracle;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn state(token: &str, fraction: Decimal) -> MonitorState {
        let chain = ChainRoute {
            blockchain: "bsc".to_string(),
            chain_id: 56,
            dex_id: "pancakeswap".to_string(),
            quote_asset: "0xUSDT".to_string(),
        };
        let position = Position::new(token.to_string(), "PEPE".to_string(), dec!(1000), chain).unwrap();
        MonitorState::new(position, StopLossFraction::new(fraction).unwrap())
    }

    #[tokio::test]
    async fn test_poll_quotes_held_amount_along_path_out() {
        let oracle = ScriptedOracle::new().with_values("0xA", &[dec!(100)]);
        let mut monitor = PositionMonitor::new(state("0xA", dec!(0.1)), Arc::new(oracle.clone()));

        let obs = monitor.poll().await.unwrap();
        assert_eq!(obs, Observation::NewHigh { high_water_mark: dec!(100) });
        assert_eq!(oracle.get_calls(), vec!["0xA".to_string()]);
    }

    #[tokio::test]
    async fn test_feed_error_does_not_mutate_state() {
        let oracle = ScriptedOracle::new()
            .with_values("0xA", &[dec!(100)])
            .with_failure("0xA", FeedError::Http { status: 502, body: "bad gateway".into() });
        let mut monitor = PositionMonitor::new(state("0xA", dec!(0.1)), Arc::new(oracle));

        monitor.poll().await.unwrap();
        let before = monitor.state().clone();
        assert!(monitor.poll().await.is_err());
        assert_eq!(monitor.state(), &before);
        assert!(monitor.state().is_watching());
    }

    #[tokio::test]
    async fn test_no_quotes_after_trigger() {
        let oracle = ScriptedOracle::new().with_values("0xA", &[dec!(100), dec!(50), dec!(500)]);
        let mut monitor = PositionMonitor::new(state("0xA", dec!(0.1)), Arc::new(oracle.clone()));

        monitor.poll().await.unwrap();
        assert!(matches!(monitor.poll().await.unwrap(), Observation::Triggered { .. }));
        assert_eq!(monitor.poll().await.unwrap(), Observation::Ignored);
        assert_eq!(oracle.call_count("0xA"), 2);
        assert_eq!(monitor.state().high_water_mark(), dec!(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_feed_errors_and_triggers() {
        let oracle = ScriptedOracle::new()
            .with_values("0xA", &[dec!(100), dec!(120)])
            .with_failure("0xA", FeedError::Transport("timeout".into()))
            .with_failure("0xA", FeedError::Malformed("empty amountsOut".into()))
            .with_values("0xA", &[dec!(115), dec!(80)]);
        let monitor = PositionMonitor::new(state("0xA", dec!(0.10)), Arc::new(oracle.clone()))
            .with_poll_interval(Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        let finished = monitor.run().await;

        assert_eq!(
            finished.phase(),
            &Phase::Triggered { reason: TriggerReason::StopLoss, trigger_value: Some(dec!(80)) }
        );
        assert_eq!(finished.high_water_mark(), dec!(120));
        assert_eq!(oracle.call_count("0xA"), 6);
        // poll-then-wait: five sleeps between six polls
        assert_eq!(start.elapsed(), Duration::from_secs(25));
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_not_watching() {
        let oracle = ScriptedOracle::new();
        let mut s = state("0xA", dec!(0.1));
        s.force_liquidation();

        let finished = PositionMonitor::new(s, Arc::new(oracle.clone())).run().await;
        assert!(finished.is_triggered());
        assert!(oracle.get_calls().is_empty());
    }

    #[tokio::test]
    async fn test_checkpoints_written_on_new_high_and_trigger() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let oracle = ScriptedOracle::new().with_values("0xA", &[dec!(100), dec!(95), dec!(10)]);
        let mut monitor = PositionMonitor::new(state("0xA", dec!(0.1)), Arc::new(oracle))
            .with_checkpoints(Some(store.clone()));

        monitor.poll().await.unwrap();
        assert_eq!(store.load_all().unwrap()[0].phase, Phase::Watching);

        monitor.poll().await.unwrap();
        monitor.poll().await.unwrap();
        let saved = store.load_all().unwrap();
        assert_eq!(saved.len(), 1);
        assert!(matches!(saved[0].phase, Phase::Triggered { .. }));
    }
}
