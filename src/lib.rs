//! Ratchet - New-listing sniper with a trailing stop-loss
//!
//! Buys tokens reported by a discovery scraper and protects every batch with
//! a trailing stop-loss: the first position to retrace from its peak is sold
//! and the rest of the batch is liquidated with it.
//!
//! # Modules
//!
//! - `domain`: Core types (Position, MonitorState, ChainRegistry, manifests)
//! - `ports`: Trait abstractions (PriceOracle, SwapExecutor, DiscoverySource)
//! - `adapters`: External implementations (quote/swap services, scraper, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Position monitors, coordinator, acquisition, discovery loop

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
