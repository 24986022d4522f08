//! Domain Layer - Core types and the trailing stop-loss state machine
//!
//! Pure types and logic with no network access. All external interactions
//! happen through the ports layer.
//!
//! - `stop_loss`: per-position `Watching -> Triggered -> Sold` state machine
//! - `position`: acquired holdings and their trade paths
//! - `chain`: static blockchain -> routing metadata registry
//! - `manifest`: record of a batch liquidation
//! - `checkpoint`: optional on-disk snapshots of monitor state

pub mod candidate;
pub mod chain;
pub mod checkpoint;
pub mod manifest;
pub mod position;
pub mod quote;
pub mod stop_loss;

pub use candidate::Candidate;
pub use chain::{ChainRegistry, ChainRoute};
pub use checkpoint::{CheckpointError, CheckpointStore, MonitorCheckpoint};
pub use manifest::{Disposal, DisposalOutcome, LiquidationManifest};
pub use position::{Position, PositionError};
pub use quote::Quote;
pub use stop_loss::{MonitorState, Observation, Phase, StopLossError, StopLossFraction, TriggerReason};
