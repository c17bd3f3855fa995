//! Gatehouse sidecar entrypoint support: environment-driven configuration
//! and the start-up error type. The binary in `main.rs` wires the
//! config, refresher, and proxy crates together.

pub mod config;
pub mod error;

pub use config::{ConfigError, EffectiveConfig, Environ};
pub use error::ServerError;
