//! Library half of the `vigil` binary: argument parsing and settings
//! resolution, kept here so they can be tested without starting a server.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by main.rs only
use dotenvy as _;
use tokio as _;
use tracing as _;
use tracing_subscriber as _;

// Dev-dependency used by integration tests only
#[cfg(test)]
use tempfile as _;

pub mod config;
pub mod parser;

pub use config::{load_settings, server_config};
pub use parser::Cli;
