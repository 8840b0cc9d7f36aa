//! HTTP provider for remote agents and third-party health APIs.
//!
//! Both backends expose `GET {endpoint}/api/services` returning
//! `[{"name": string, "running": bool, "status": string}]`.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use vigil_core::{ProviderError, ServiceObservation, ServiceProvider, ServiceState, SourceKind};

const SERVICES_PATH: &str = "/api/services";

#[derive(Debug, Deserialize)]
struct RemoteService {
    name: String,
    running: bool,
    #[serde(default)]
    status: String,
}

/// Polls a fixed set of hosts over HTTP.
#[derive(Debug, Clone)]
pub struct HttpServiceProvider {
    client: Client,
    source: SourceKind,
    endpoints: HashMap<String, String>,
}

impl HttpServiceProvider {
    /// Create a provider for `source` over `(host, base_url)` pairs.
    pub fn new<I>(source: SourceKind, endpoints: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            client: Client::new(),
            source,
            endpoints: endpoints
                .into_iter()
                .map(|(host, url)| (host, url.trim_end_matches('/').to_string()))
                .collect(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<RemoteService>, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unreachable(format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ServiceProvider for HttpServiceProvider {
    fn source(&self) -> SourceKind {
        self.source
    }

    async fn get_services(
        &self,
        host: &str,
        deadline: Instant,
    ) -> Result<Vec<ServiceObservation>, ProviderError> {
        let base = self
            .endpoints
            .get(host)
            .ok_or_else(|| ProviderError::UnknownHost(host.to_string()))?;
        let url = format!("{base}{SERVICES_PATH}");

        debug!(host, %url, source = %self.source, "Fetching services");

        let services = tokio::time::timeout_at(deadline.into(), self.fetch(&url))
            .await
            .map_err(|_| ProviderError::Timeout)??;

        Ok(services
            .into_iter()
            .map(|s| {
                ServiceObservation::new(
                    host,
                    s.name,
                    self.source,
                    ServiceState::from_running(s.running),
                    s.status,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unknown_host() {
        let provider = HttpServiceProvider::new(SourceKind::Agent, Vec::new());
        let result = provider
            .get_services("nobody", Instant::now() + Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ProviderError::UnknownHost(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        // Port 1 on loopback refuses connections.
        let provider = HttpServiceProvider::new(
            SourceKind::HealthApi,
            [("api".to_string(), "http://127.0.0.1:1/".to_string())],
        );
        let result = provider
            .get_services("api", Instant::now() + Duration::from_secs(5))
            .await;
        assert!(matches!(
            result,
            Err(ProviderError::Unreachable(_) | ProviderError::Timeout)
        ));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let provider = HttpServiceProvider::new(
            SourceKind::Agent,
            [("nas".to_string(), "http://nas:9751/".to_string())],
        );
        assert_eq!(provider.endpoints["nas"], "http://nas:9751");
    }
}
