//! Paper trading executor
//!
//! Fills every swap at the live quote without submitting anything on-chain.
//! Monitoring and liquidation run exactly as they would live.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::ChainRoute;
use crate::ports::{ExecutionError, PriceOracle, SwapExecutor, SwapReceipt};

pub struct PaperSwapExecutor {
    oracle: Arc<dyn PriceOracle>,
}

impl PaperSwapExecutor {
    pub fn new(oracle: Arc<dyn PriceOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl SwapExecutor for PaperSwapExecutor {
    async fn execute_swap(
        &self,
        route: &ChainRoute,
        path: &[String],
        amount_in: Decimal,
    ) -> Result<SwapReceipt, ExecutionError> {
        let quote = self
            .oracle
            .quote(route, path, amount_in)
            .await
            .map_err(|e| ExecutionError::Transport(format!("paper fill quote failed: {}", e)))?;

        tracing::info!(
            "[PAPER] Swap {} along {:?} filled at {}",
            amount_in,
            path,
            quote.output_amount
        );

        Ok(SwapReceipt {
            amount_in,
            amount_out: quote.output_amount,
            tx_hash: None,
        })
    }
}
