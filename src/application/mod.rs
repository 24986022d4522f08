//! Application Layer - Monitoring, liquidation and the discovery cycle
//!
//! - `position_monitor`: poll-then-wait task driving one stop-loss state
//! - `coordinator`: races monitors, sells the primary, sweeps the rest
//! - `acquisition`: buys discovered candidates into positions
//! - `discovery_loop`: periodic discovery feeding detached batches

pub mod acquisition;
pub mod coordinator;
pub mod discovery_loop;
pub mod position_monitor;

pub use acquisition::{AcquisitionBatch, AcquisitionError, AcquisitionPipeline, Rejection};
pub use coordinator::{CoordinatorConfig, PortfolioCoordinator};
pub use discovery_loop::{DiscoveryLoop, DiscoveryStatus, DEFAULT_DISCOVERY_INTERVAL};
pub use position_monitor::{PositionMonitor, DEFAULT_POLL_INTERVAL};
