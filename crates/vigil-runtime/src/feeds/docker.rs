//! Container runtime feed backed by the `docker` CLI.
//!
//! Discovery runs `docker ps -a` and the subscription follows
//! `docker events`, both with `--format '{{json .}}'` so every line is one
//! JSON document.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use vigil_core::{ServiceObservation, ServiceState, SourceKind};

use super::command::{capture, line_stream};
use super::{EventFeed, FeedError, FeedStream};

const PROGRAM: &str = "docker";

/// Container actions that change run state.
const EVENT_FILTERS: [&str; 5] = [
    "event=start",
    "event=stop",
    "event=die",
    "event=pause",
    "event=unpause",
];

/// Watches the containers of one Docker engine.
#[derive(Debug, Clone)]
pub struct DockerFeed {
    host: String,
    endpoint: Option<String>,
}

impl DockerFeed {
    /// Feed for `host`. With an `endpoint` the CLI talks to that daemon
    /// (`docker -H <endpoint>`), otherwise to the local one.
    pub fn new(host: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            host: host.into(),
            endpoint,
        }
    }

    fn args<'a>(&self, rest: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(endpoint) = &self.endpoint {
            args.push("-H".to_string());
            args.push(endpoint.clone());
        }
        args.extend(rest.into_iter().map(str::to_string));
        args
    }
}

#[async_trait]
impl EventFeed for DockerFeed {
    fn host(&self) -> &str {
        &self.host
    }

    fn source(&self) -> SourceKind {
        SourceKind::Docker
    }

    async fn discover(&self) -> Result<Vec<ServiceObservation>, FeedError> {
        let output = capture(PROGRAM, &self.args(["ps", "-a", "--format", "{{json .}}"])).await?;
        parse_ps(&self.host, &output)
    }

    async fn subscribe(&self) -> Result<FeedStream, FeedError> {
        let mut rest = vec!["events", "--filter", "type=container"];
        for filter in EVENT_FILTERS {
            rest.extend(["--filter", filter]);
        }
        rest.extend(["--format", "{{json .}}"]);
        line_stream(PROGRAM, &self.args(rest), self.host.clone(), parse_event)
    }
}

#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status", default)]
    status: String,
}

impl PsLine {
    fn is_running(&self) -> bool {
        if self.state.is_empty() {
            // Older engines omit State; fall back to the status text.
            self.status.starts_with("Up") && !self.status.contains("(Paused)")
        } else {
            self.state == "running"
        }
    }
}

/// Parse `docker ps -a --format '{{json .}}'` output.
fn parse_ps(host: &str, output: &str) -> Result<Vec<ServiceObservation>, FeedError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let ps: PsLine =
                serde_json::from_str(line).map_err(|e| FeedError::Parse(e.to_string()))?;
            // A container can carry several comma-separated names; the
            // first is its own.
            let name = ps.names.split(',').next().unwrap_or_default().to_string();
            Ok(ServiceObservation::new(
                host,
                name,
                SourceKind::Docker,
                ServiceState::from_running(ps.is_running()),
                ps.status.clone(),
            ))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct EventLine {
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Action", default)]
    action: String,
    #[serde(rename = "Actor", default)]
    actor: Actor,
}

#[derive(Debug, Default, Deserialize)]
struct Actor {
    #[serde(rename = "Attributes", default)]
    attributes: HashMap<String, String>,
}

/// Parse one `docker events --format '{{json .}}'` line.
fn parse_event(host: &str, line: &str) -> Result<Option<ServiceObservation>, FeedError> {
    let event: EventLine = serde_json::from_str(line).map_err(|e| FeedError::Parse(e.to_string()))?;
    if event.kind != "container" {
        return Ok(None);
    }

    let (state, status) = match event.action.as_str() {
        "start" | "unpause" => (ServiceState::Running, "Up".to_string()),
        "pause" => (ServiceState::Stopped, "Paused".to_string()),
        "die" | "stop" => {
            let status = event
                .actor
                .attributes
                .get("exitCode")
                .map_or_else(|| "Exited".to_string(), |code| format!("Exited ({code})"));
            (ServiceState::Stopped, status)
        }
        _ => return Ok(None),
    };

    let name = event
        .actor
        .attributes
        .get("name")
        .ok_or_else(|| FeedError::Parse("container event without a name".to_string()))?;

    Ok(Some(ServiceObservation::new(
        host,
        name.clone(),
        SourceKind::Docker,
        state,
        status,
    )))
}
