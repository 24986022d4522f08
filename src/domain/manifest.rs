//! Liquidation Manifest
//!
//! Record of how every position in a batch was disposed of once the first
//! stop-loss fired.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::position::Position;
use super::stop_loss::TriggerReason;

/// Outcome of selling one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DisposalOutcome {
    Sold { realized: Decimal, attempts: u32 },
    Failed { error: String, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disposal {
    pub position: Position,
    pub reason: TriggerReason,
    pub outcome: DisposalOutcome,
}

impl Disposal {
    pub fn realized(&self) -> Option<Decimal> {
        match self.outcome {
            DisposalOutcome::Sold { realized, .. } => Some(realized),
            DisposalOutcome::Failed { .. } => None,
        }
    }

    pub fn is_sold(&self) -> bool {
        matches!(self.outcome, DisposalOutcome::Sold { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationManifest {
    /// Token of the position whose stop-loss fired first
    pub primary: Option<String>,
    /// Primary disposal first, then the sweep in registration order
    pub disposals: Vec<Disposal>,
    pub completed_at: DateTime<Utc>,
}

impl LiquidationManifest {
    pub fn new(primary: Option<String>, disposals: Vec<Disposal>) -> Self {
        Self {
            primary,
            disposals,
            completed_at: Utc::now(),
        }
    }

    /// Manifest for a batch where no monitor ever triggered
    pub fn empty() -> Self {
        Self::new(None, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.disposals.is_empty()
    }

    /// Sum of quote asset received across all successful sells
    pub fn total_realized(&self) -> Decimal {
        self.disposals.iter().filter_map(Disposal::realized).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Disposal> {
        self.disposals.iter().filter(|d| !d.is_sold())
    }

    pub fn find(&self, token: &str) -> Option<&Disposal> {
        self.disposals.iter().find(|d| d.position.token == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::ChainRoute;
    use rust_decimal_macros::dec;

    fn position(token: &str) -> Position {
        let chain = ChainRoute {
            blockchain: "bsc".to_string(),
            chain_id: 56,
            dex_id: "pancakeswap".to_string(),
            quote_asset: "0xUSDT".to_string(),
        };
        Position::new(token.to_string(), token.to_string(), dec!(10), chain).unwrap()
    }

    #[test]
    fn test_total_realized_skips_failures() {
        let manifest = LiquidationManifest::new(
            Some("A".to_string()),
            vec![
                Disposal {
                    position: position("A"),
                    reason: TriggerReason::StopLoss,
                    outcome: DisposalOutcome::Sold { realized: dec!(12.5), attempts: 1 },
                },
                Disposal {
                    position: position("B"),
                    reason: TriggerReason::Liquidation,
                    outcome: DisposalOutcome::Failed { error: "rejected".to_string(), attempts: 2 },
                },
                Disposal {
                    position: position("C"),
                    reason: TriggerReason::Liquidation,
                    outcome: DisposalOutcome::Sold { realized: dec!(7.5), attempts: 1 },
                },
            ],
        );

        assert_eq!(manifest.total_realized(), dec!(20));
        assert_eq!(manifest.failures().count(), 1);
        assert_eq!(manifest.find("B").unwrap().realized(), None);
    }

    #[test]
    fn test_manifest_serializes_outcome_tag() {
        let disposal = Disposal {
            position: position("A"),
            reason: TriggerReason::StopLoss,
            outcome: DisposalOutcome::Sold { realized: dec!(1.25), attempts: 1 },
        };
        let json = serde_json::to_value(&disposal).unwrap();
        assert_eq!(json["outcome"]["status"], "sold");
        assert_eq!(json["reason"], "stop_loss");
    }
}
