//! Acquisition Pipeline
//!
//! Turns discovered candidates into positions: resolve the chain route, buy
//! the token with a fixed amount of the chain's quote asset, and record what
//! the buy actually returned. Every candidate is its own failure domain.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{Candidate, ChainRegistry, Position, PositionError};
use crate::ports::{ExecutionError, SwapExecutor};

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("No chain mapping for blockchain '{0}'")]
    ConfigurationGap(String),

    #[error("Buy failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Buy settled with an unusable position: {0}")]
    InvalidPosition(#[from] PositionError),

    #[error("Token {0} already acquired in this batch")]
    Duplicate(String),
}

/// A candidate that produced no position, with the reason
#[derive(Debug)]
pub struct Rejection {
    pub candidate: Candidate,
    pub error: AcquisitionError,
}

/// Result of acquiring one discovery batch
#[derive(Debug, Default)]
pub struct AcquisitionBatch {
    /// Positions in candidate order
    pub positions: Vec<Position>,
    pub rejected: Vec<Rejection>,
}

impl AcquisitionBatch {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

pub struct AcquisitionPipeline {
    executor: Arc<dyn SwapExecutor>,
    registry: Arc<ChainRegistry>,
    buy_amount: Decimal,
}

impl AcquisitionPipeline {
    pub fn new(
        executor: Arc<dyn SwapExecutor>,
        registry: Arc<ChainRegistry>,
        buy_amount: Decimal,
    ) -> Self {
        Self {
            executor,
            registry,
            buy_amount,
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn buy_amount(&self) -> Decimal {
        self.buy_amount
    }

    /// Acquire every candidate in order. Never fails as a whole.
    pub async fn acquire(&self, candidates: Vec<Candidate>) -> AcquisitionBatch {
        let mut batch = AcquisitionBatch::default();

        for candidate in candidates {
            let duplicate = batch
                .positions
                .iter()
                .any(|p| p.token.eq_ignore_ascii_case(&candidate.contract_address));

            let result = if duplicate {
                Err(AcquisitionError::Duplicate(candidate.contract_address.clone()))
            } else {
                self.acquire_one(&candidate).await
            };

            match result {
                Ok(position) => batch.positions.push(position),
                Err(error) => {
                    match &error {
                        AcquisitionError::ConfigurationGap(_) | AcquisitionError::Duplicate(_) => {
                            tracing::warn!("Skipping {} ({}): {}", candidate.ticker, candidate.contract_address, error)
                        }
                        _ => tracing::error!(
                            "Failed to acquire {} ({}): {}",
                            candidate.ticker,
                            candidate.contract_address,
                            error
                        ),
                    }
                    batch.rejected.push(Rejection { candidate, error });
                }
            }
        }

        tracing::info!(
            "Acquisition batch done: {} positions, {} rejected",
            batch.positions.len(),
            batch.rejected.len()
        );
        batch
    }

    /// Buy one candidate along `quote_asset -> token`
    pub async fn acquire_one(&self, candidate: &Candidate) -> Result<Position, AcquisitionError> {
        let route = self
            .registry
            .resolve(&candidate.blockchain)
            .ok_or_else(|| AcquisitionError::ConfigurationGap(candidate.blockchain.clone()))?;

        let path_in = vec![route.quote_asset.clone(), candidate.contract_address.clone()];

        tracing::info!(
            "BUY {} on {} (chain {}, dex {}) with {} of {}",
            candidate.ticker,
            route.blockchain,
            route.chain_id,
            route.dex_id,
            self.buy_amount,
            route.quote_asset
        );

        let receipt = self
            .executor
            .execute_swap(route, &path_in, self.buy_amount)
            .await?;

        let position = Position::new(
            candidate.contract_address.clone(),
            candidate.ticker.clone(),
            receipt.amount_out,
            route.clone(),
        )?;

        tracing::info!(
            "Acquired {} {} (tx: {})",
            position.held_amount,
            position.label(),
            receipt.tx_hash.as_deref().unwrap_or("n/a")
        );
        Ok(position)
    }
}
