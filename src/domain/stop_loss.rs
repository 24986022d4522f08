//! Trailing Stop-Loss State Machine
//!
//! Pure, synchronous state for one monitored position. The async poll loop in
//! `application::position_monitor` feeds it quote values; nothing here performs
//! I/O.
//!
//! Phases: `Watching -> Triggered -> Sold`.
//!
//! - While `Watching`, every observed value first raises the high-water mark
//!   (if higher) and is then compared against `high_water_mark * (1 - f)`.
//!   A strictly lower value moves the state to `Triggered`.
//! - Once `Triggered` or `Sold`, observations are ignored: the high-water mark
//!   is frozen and the drop condition is never evaluated again.
//! - A failed sell leaves the state in `Triggered`, so the sell can be retried
//!   without looking at price again.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::position::Position;

/// Why a position was marked for sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// The position's own value fell through its trailing threshold
    StopLoss,
    /// Another position in the batch triggered and everything is liquidated
    Liquidation,
}

/// Lifecycle phase of a monitored position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Watching,
    Triggered {
        reason: TriggerReason,
        /// Quote value that crossed the threshold (stop-loss triggers only)
        trigger_value: Option<Decimal>,
    },
    Sold {
        reason: TriggerReason,
        /// Quote asset received for the position
        realized: Decimal,
    },
}

/// Result of feeding one quote value to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Value set a new high-water mark
    NewHigh { high_water_mark: Decimal },
    /// Value is within the trailing band
    Holding { value: Decimal, threshold: Decimal },
    /// Value fell strictly below the threshold; position must be sold
    Triggered { value: Decimal, threshold: Decimal },
    /// State is no longer `Watching`; nothing was evaluated
    Ignored,
}

#[derive(Debug, Error, PartialEq)]
pub enum StopLossError {
    #[error("Stop-loss fraction must be between 0 and 1 (exclusive), got {0}")]
    InvalidFraction(Decimal),
    #[error("Position has not been triggered")]
    NotTriggered,
    #[error("Position is already sold")]
    AlreadySold,
}

/// Proportional drop from the high-water mark that triggers a sell, `0 < f < 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct StopLossFraction(Decimal);

impl StopLossFraction {
    pub fn new(fraction: Decimal) -> Result<Self, StopLossError> {
        if fraction <= Decimal::ZERO || fraction >= Decimal::ONE {
            return Err(StopLossError::InvalidFraction(fraction));
        }
        Ok(Self(fraction))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for StopLossFraction {
    type Error = StopLossError;

    fn try_from(fraction: Decimal) -> Result<Self, Self::Error> {
        Self::new(fraction)
    }
}

impl From<StopLossFraction> for Decimal {
    fn from(fraction: StopLossFraction) -> Self {
        fraction.0
    }
}

/// Stop-loss state for a single position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    position: Position,
    high_water_mark: Decimal,
    stop_loss_fraction: StopLossFraction,
    phase: Phase,
}

impl MonitorState {
    pub fn new(position: Position, stop_loss_fraction: StopLossFraction) -> Self {
        Self {
            position,
            high_water_mark: Decimal::ZERO,
            stop_loss_fraction,
            phase: Phase::Watching,
        }
    }

    /// Rebuild state from a checkpoint
    pub fn restore(
        position: Position,
        stop_loss_fraction: StopLossFraction,
        high_water_mark: Decimal,
        phase: Phase,
    ) -> Self {
        Self {
            position,
            high_water_mark: high_water_mark.max(Decimal::ZERO),
            stop_loss_fraction,
            phase,
        }
    }

    /// Feed a freshly quoted position value
    pub fn observe(&mut self, value: Decimal) -> Observation {
        if self.phase != Phase::Watching {
            return Observation::Ignored;
        }

        let raised = value > self.high_water_mark;
        if raised {
            self.high_water_mark = value;
        }

        // Measured against the ceiling as updated by this same observation.
        let threshold = self.threshold();
        if value < threshold {
            self.phase = Phase::Triggered {
                reason: TriggerReason::StopLoss,
                trigger_value: Some(value),
            };
            return Observation::Triggered { value, threshold };
        }

        if raised {
            Observation::NewHigh {
                high_water_mark: self.high_water_mark,
            }
        } else {
            Observation::Holding { value, threshold }
        }
    }

    /// Mark a still-watching position for unconditional sale.
    ///
    /// Returns `false` if the position was already triggered or sold.
    pub fn force_liquidation(&mut self) -> bool {
        if self.phase != Phase::Watching {
            return false;
        }
        self.phase = Phase::Triggered {
            reason: TriggerReason::Liquidation,
            trigger_value: None,
        };
        true
    }

    /// Record a completed sell. Only valid from `Triggered`.
    pub fn mark_sold(&mut self, realized: Decimal) -> Result<(), StopLossError> {
        match self.phase {
            Phase::Triggered { reason, .. } => {
                self.phase = Phase::Sold { reason, realized };
                Ok(())
            }
            Phase::Sold { .. } => Err(StopLossError::AlreadySold),
            Phase::Watching => Err(StopLossError::NotTriggered),
        }
    }

    /// Current sell threshold: `high_water_mark * (1 - stop_loss_fraction)`
    pub fn threshold(&self) -> Decimal {
        self.high_water_mark * (Decimal::ONE - self.stop_loss_fraction.value())
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn high_water_mark(&self) -> Decimal {
        self.high_water_mark
    }

    pub fn stop_loss_fraction(&self) -> StopLossFraction {
        self.stop_loss_fraction
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_watching(&self) -> bool {
        self.phase == Phase::Watching
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.phase, Phase::Triggered { .. })
    }

    pub fn is_sold(&self) -> bool {
        matches!(self.phase, Phase::Sold { .. })
    }

    pub fn trigger_reason(&self) -> Option<TriggerReason> {
        match self.phase {
            Phase::Watching => None,
            Phase::Triggered { reason, .. } | Phase::Sold { reason, .. } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::ChainRoute;
    use rust_decimal_macros::dec;

    fn state(fraction: Decimal) -> MonitorState {
        let chain = ChainRoute {
            blockchain: "bsc".to_string(),
            chain_id: 56,
            dex_id: "pancakeswap".to_string(),
            quote_asset: "0xUSDT".to_string(),
        };
        let position = Position::new("0xTOKEN".to_string(), "PEPE".to_string(), dec!(1000), chain).unwrap();
        MonitorState::new(position, StopLossFraction::new(fraction).unwrap())
    }

    #[test]
    fn test_invalid_fraction() {
        assert_eq!(StopLossFraction::new(dec!(0)), Err(StopLossError::InvalidFraction(dec!(0))));
        assert_eq!(StopLossFraction::new(dec!(1)), Err(StopLossError::InvalidFraction(dec!(1))));
        assert_eq!(StopLossFraction::new(dec!(-0.1)), Err(StopLossError::InvalidFraction(dec!(-0.1))));
        assert_eq!(StopLossFraction::new(dec!(0.25)).unwrap().value(), dec!(0.25));
    }

    #[test]
    fn test_fraction_deserialization_is_validated() {
        let ok: StopLossFraction = serde_json::from_str("\"0.15\"").unwrap();
        assert_eq!(ok.value(), dec!(0.15));
        assert!(serde_json::from_str::<StopLossFraction>("\"1.5\"").is_err());
    }

    #[test]
    fn test_high_water_mark_tracks_running_max() {
        let mut s = state(dec!(0.5));
        let values = [dec!(10), dec!(12), dec!(11), dec!(15), dec!(9), dec!(15), dec!(14)];
        let mut max = Decimal::ZERO;

        for v in values {
            s.observe(v);
            max = max.max(v);
            assert_eq!(s.high_water_mark(), max);
            assert!(s.is_watching());
        }
    }

    #[test]
    fn test_retrace_scenario_triggers_on_80() {
        let mut s = state(dec!(0.10));

        assert_eq!(s.observe(dec!(100)), Observation::NewHigh { high_water_mark: dec!(100) });
        assert_eq!(s.observe(dec!(120)), Observation::NewHigh { high_water_mark: dec!(120) });
        assert_eq!(
            s.observe(dec!(115)),
            Observation::Holding { value: dec!(115), threshold: dec!(108.00) }
        );
        assert_eq!(s.high_water_mark(), dec!(120));
        assert_eq!(
            s.observe(dec!(80)),
            Observation::Triggered { value: dec!(80), threshold: dec!(108.00) }
        );
        assert!(s.is_triggered());
        assert_eq!(s.trigger_reason(), Some(TriggerReason::StopLoss));
    }

    #[test]
    fn test_boundary_does_not_trigger() {
        let mut s = state(dec!(0.10));
        s.observe(dec!(100));

        // exactly H * (1 - f)
        assert!(matches!(s.observe(dec!(90)), Observation::Holding { .. }));
        assert!(s.is_watching());

        assert!(matches!(s.observe(dec!(89.99)), Observation::Triggered { .. }));
    }

    #[test]
    fn test_rising_position_never_triggers() {
        let mut s = state(dec!(0.01));
        for i in 1..=50 {
            let obs = s.observe(Decimal::from(i * 10));
            assert!(matches!(obs, Observation::NewHigh { .. }));
        }
        assert!(s.is_watching());
    }

    #[test]
    fn test_observations_ignored_after_trigger() {
        let mut s = state(dec!(0.10));
        s.observe(dec!(100));
        s.observe(dec!(50));
        assert!(s.is_triggered());

        let frozen = s.clone();
        assert_eq!(s.observe(dec!(500)), Observation::Ignored);
        assert_eq!(s.observe(dec!(1)), Observation::Ignored);
        assert_eq!(s, frozen);
    }

    #[test]
    fn test_mark_sold_requires_trigger() {
        let mut s = state(dec!(0.10));
        assert_eq!(s.mark_sold(dec!(10)), Err(StopLossError::NotTriggered));

        s.observe(dec!(100));
        s.observe(dec!(10));
        s.mark_sold(dec!(9.5)).unwrap();
        assert!(s.is_sold());
        assert_eq!(s.mark_sold(dec!(9.5)), Err(StopLossError::AlreadySold));
        assert_eq!(s.observe(dec!(1000)), Observation::Ignored);
    }

    #[test]
    fn test_force_liquidation() {
        let mut s = state(dec!(0.10));
        s.observe(dec!(100));
        assert!(s.force_liquidation());
        assert_eq!(s.trigger_reason(), Some(TriggerReason::Liquidation));
        assert!(!s.force_liquidation());

        s.mark_sold(dec!(99)).unwrap();
        assert_eq!(
            s.phase(),
            &Phase::Sold { reason: TriggerReason::Liquidation, realized: dec!(99) }
        );
    }

    #[test]
    fn test_force_liquidation_keeps_stop_loss_reason() {
        let mut s = state(dec!(0.10));
        s.observe(dec!(100));
        s.observe(dec!(1));
        assert!(!s.force_liquidation());
        assert_eq!(s.trigger_reason(), Some(TriggerReason::StopLoss));
    }
}
