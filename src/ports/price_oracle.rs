use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{ChainRoute, Quote};

/// Transient price feed failure. Monitors log it and retry on the next poll.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeedError {
    #[error("Quote transport error: {0}")]
    Transport(String),

    #[error("Quote service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed quote response: {0}")]
    Malformed(String),
}

/// Quotes the output of a trade path for a given input amount
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn quote(
        &self,
        route: &ChainRoute,
        path: &[String],
        amount_in: Decimal,
    ) -> Result<Quote, FeedError>;
}
