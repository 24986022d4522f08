//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    load_config, Config, ConfigError, QUOTE_API_KEY_ENV, SWAP_API_KEY_ENV,
};
