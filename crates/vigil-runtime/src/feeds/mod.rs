//! Native event feeds for push-capable sources.
//!
//! A feed can enumerate its host's current services (the discovery sweep)
//! and open a long-lived subscription yielding an observation per relevant
//! native event. Feeds hold no state between calls: every `subscribe` opens
//! a fresh subscription, and dropping the returned stream closes it.

mod command;
mod docker;
mod systemd;

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use thiserror::Error;
use vigil_core::{ServiceObservation, SourceKind};

pub use docker::DockerFeed;
pub use systemd::SystemdFeed;

/// Errors from an event feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The backend CLI could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Reading from the backend failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend produced output that could not be understood.
    #[error("Failed to parse backend output: {0}")]
    Parse(String),

    /// The D-Bus connection or a bus call failed.
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    /// The subscription ended.
    #[error("Event feed closed")]
    Closed,

    /// The backend CLI exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Stream of observations from an open subscription.
///
/// An `Err` item means the subscription is broken; the stream should be
/// dropped and re-opened.
pub type FeedStream = Pin<Box<dyn Stream<Item = Result<ServiceObservation, FeedError>> + Send>>;

/// A push-capable native event source for one host.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Host this feed observes.
    fn host(&self) -> &str;

    /// Source label attached to observations.
    fn source(&self) -> SourceKind;

    /// Enumerate every current service on the host.
    async fn discover(&self) -> Result<Vec<ServiceObservation>, FeedError>;

    /// Open a subscription filtered to relevant transitions.
    async fn subscribe(&self) -> Result<FeedStream, FeedError>;
}
