//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Quote service: `PriceOracle` over the quoting API
//! - Swap service: approve-then-swap `SwapExecutor`
//! - Paper: `SwapExecutor` that fills at the live quote
//! - Discovery: scraper process as a `DiscoverySource`
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod discovery;
pub mod http;
pub mod paper;
pub mod quote_service;
pub mod swap_service;

pub use cli::CliApp;
pub use discovery::ProcessDiscovery;
pub use http::{ServiceClient, ServiceConfig};
pub use paper::PaperSwapExecutor;
pub use quote_service::QuoteServiceClient;
pub use swap_service::SwapServiceClient;
