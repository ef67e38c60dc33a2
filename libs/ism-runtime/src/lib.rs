//! Ambient runtime stack: typed configuration loading and logging setup (spec §6,
//! §10.1, §10.3). Mirrors the teacher's `runtime` crate split, scoped to what the
//! engine's construction sequence (spec §4.7) needs.

pub mod config;
pub mod logging;

pub use config::{DatabaseConfig, EngineConfig, LoggingConfig, RuntimeSection};
pub use logging::init_logging_from_config;
