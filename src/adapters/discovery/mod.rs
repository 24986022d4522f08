//! Discovery Adapter
//!
//! Runs the external listing scraper as a child process and parses its
//! stdout into candidates.

mod process;

pub use process::{ProcessDiscovery, DEFAULT_DISCOVERY_TIMEOUT};
