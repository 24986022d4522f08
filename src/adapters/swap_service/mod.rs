//! Swap Service Adapter
//!
//! `SwapExecutor` implementation backed by the external transaction service,
//! which prepares, signs and broadcasts approve and swap transactions.

mod client;
mod types;

pub use client::SwapServiceClient;
pub use types::{ApproveResponse, SwapRequest, SwapResponse};
