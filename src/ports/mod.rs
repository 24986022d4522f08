//! Ports Layer - Trait definitions for external collaborators
//!
//! Following hexagonal architecture, these traits abstract:
//! - Price quotes for a trade path (quote service)
//! - Swap execution, approve-then-swap (swap service)
//! - Discovery of newly listed tokens (scraper process)

pub mod discovery;
pub mod execution;
pub mod mocks;
pub mod price_oracle;

pub use discovery::{DiscoveryError, DiscoverySource};
pub use execution::{ExecutionError, SwapExecutor, SwapReceipt};
pub use price_oracle::{FeedError, PriceOracle};
