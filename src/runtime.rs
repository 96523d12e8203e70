//! Runtime glue that wires configuration, fatal error propagation, telemetry,
//! and runner orchestration.

pub mod config;
pub mod fatal;
pub mod runner;
pub mod telemetry;
