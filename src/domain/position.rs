use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::chain::ChainRoute;

/// An acquired token holding, created once a buy settles
///
/// Positions are immutable; whether one has been sold is tracked by the
/// monitor state that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Token contract address
    pub token: String,
    /// Token ticker for display
    pub ticker: String,
    /// Route used to value and sell the position (token -> quote asset)
    pub path_out: Vec<String>,
    /// Route used to acquire the position (quote asset -> token)
    pub path_in: Vec<String>,
    /// Amount of the token held
    pub held_amount: Decimal,
    /// Chain the position lives on
    pub chain: ChainRoute,
    /// When the buy settled; tells apart repeat buys of the same token
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Invalid held amount: {0}")]
    InvalidAmount(Decimal),
    #[error("Empty token address")]
    EmptyToken,
}

impl Position {
    pub fn new(
        token: String,
        ticker: String,
        held_amount: Decimal,
        chain: ChainRoute,
    ) -> Result<Self, PositionError> {
        if token.trim().is_empty() {
            return Err(PositionError::EmptyToken);
        }
        if held_amount <= Decimal::ZERO {
            return Err(PositionError::InvalidAmount(held_amount));
        }

        Ok(Self {
            path_out: vec![token.clone(), chain.quote_asset.clone()],
            path_in: vec![chain.quote_asset.clone(), token.clone()],
            token,
            ticker,
            held_amount,
            chain,
            acquired_at: Utc::now(),
        })
    }

    /// Short label used in logs: `TICKER@chain`
    pub fn label(&self) -> String {
        format!("{}@{}", self.ticker, self.chain.blockchain)
    }
}
