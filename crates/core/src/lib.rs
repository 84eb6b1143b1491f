//! Shared foundation for huddle: configuration loading and validation.

pub mod config;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
