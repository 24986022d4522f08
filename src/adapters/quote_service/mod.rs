//! Quote Service Adapter
//!
//! `PriceOracle` implementation backed by the external quoting API.

mod client;
mod types;

pub use client::QuoteServiceClient;
pub use types::{QuoteParams, QuoteResponse};
