//! Provider contract for "current state" backends.
//!
//! Given a host, a provider returns the current list of services and their
//! state. Poll watchers call it on every tick; push watchers use the
//! equivalent enumeration of their event feed for discovery sweeps.
//!
//! # Design Notes
//!
//! - Core owns the trait (pure)
//! - Runtime owns the HTTP implementation
//! - An `Err` means "the host is unreachable for this call"

use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ServiceObservation, SourceKind};

/// Errors returned by a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The host could not be contacted.
    #[error("Host unreachable: {0}")]
    Unreachable(String),

    /// The call did not finish before its deadline.
    #[error("Request timed out")]
    Timeout,

    /// The host answered with something that is not a service list.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The provider has no configuration for this host.
    #[error("Unknown host: {0}")]
    UnknownHost(String),
}

/// Port for fetching the current services of a host.
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Source label attached to every observation this provider returns.
    fn source(&self) -> SourceKind;

    /// Fetch the current service list for `host`.
    ///
    /// Implementations must give up once `deadline` has passed and return
    /// [`ProviderError::Timeout`].
    async fn get_services(
        &self,
        host: &str,
        deadline: Instant,
    ) -> Result<Vec<ServiceObservation>, ProviderError>;
}
