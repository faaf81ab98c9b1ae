//! Runtime configuration and logging setup for the main binary.

mod config;
mod logging;

pub use config::{Config, GdsConfig, TelemetryConfig};
pub use logging::Logging;
