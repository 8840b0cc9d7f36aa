//! Command-line arguments.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use vigil_axum::DEFAULT_LISTEN;

/// Watch services across hosts and stream their state changes to dashboards.
///
/// Flags override the values read from the settings file.
#[derive(Debug, Parser)]
#[command(name = "vigil")]
#[command(version)]
pub struct Cli {
    /// JSON settings file; built-in defaults are used when omitted
    #[arg(long, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to serve the API and event stream on
    #[arg(long, env = "VIGIL_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Seconds between poll cycles for agent and health API hosts
    #[arg(long, env = "VIGIL_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Publish transitions seen during the initial discovery sweep
    #[arg(long)]
    pub no_discovery_suppression: bool,

    /// Origin allowed to call the API (repeatable); any origin when omitted
    #[arg(long = "cors-origin", env = "VIGIL_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Enable debug logging when RUST_LOG is not set
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}
