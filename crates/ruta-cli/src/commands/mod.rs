//! CLI command implementations.

pub mod check_config;
pub mod common;
pub mod config;
pub mod devices;
pub mod simulate;
