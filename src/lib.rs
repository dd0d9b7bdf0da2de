//! stepreplay CLI library
//!
//! Exposes configuration, logging and command modules for integration testing

pub mod commands;
pub mod config;
pub mod logging;

pub use config::{load_config, Config, ConfigError};
pub use logging::{init_logging, LogFormat};
