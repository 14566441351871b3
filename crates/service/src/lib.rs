//! Service infrastructure for the stash gateway.
//!
//! This crate provides the pieces the gateway binary wires together:
//! - Configuration (defaults plus an optional TOML file)
//! - State management (resource service plus key resolution)
//! - HTTP handlers (resources, metadata, operations, health checks)

pub mod config;
pub mod http;
pub mod state;

// Re-export key types for convenience
pub use config::{Config, ConfigError, KeyConfig};
pub use state::{State as ServiceState, StateSetupError};
