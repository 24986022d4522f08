use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ChainRoute;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Token approval rejected: {0}")]
    ApprovalRejected(String),
    #[error("Swap transaction rejected: {0}")]
    TransactionRejected(String),
    #[error("Swap service transport error: {0}")]
    Transport(String),
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Settled swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub amount_in: Decimal,
    /// Realized output amount of the last asset in the path
    pub amount_out: Decimal,
    pub tx_hash: Option<String>,
}

/// Approves and swaps `amount_in` of `path[0]` along `path`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn execute_swap(
        &self,
        route: &ChainRoute,
        path: &[String],
        amount_in: Decimal,
    ) -> Result<SwapReceipt, ExecutionError>;
}
