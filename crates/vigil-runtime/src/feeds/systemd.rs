//! Init-system feed backed by `systemctl` and the systemd D-Bus API.
//!
//! Discovery lists service units with `systemctl list-units --output=json`.
//! The subscription opens its own bus connection, calls
//! `org.freedesktop.systemd1.Manager.Subscribe` on it and listens on that
//! same connection for `PropertiesChanged` signals carrying a unit's
//! `ActiveState`. systemd only emits unit signals while at least one client
//! is subscribed, and drops the subscription when that client disconnects,
//! so the connection lives exactly as long as the returned stream.
//!
//! With an endpoint, the bus is reached through
//! `ssh <endpoint> systemd-stdio-bridge`, the transport `systemctl -H` uses.

use std::collections::HashMap;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, warn};
use vigil_core::{ServiceObservation, ServiceState, SourceKind};
use zbus::connection::Builder;
use zbus::message::Type as MessageType;
use zbus::zvariant::OwnedValue;
use zbus::{Connection, MatchRule, Message, MessageStream};

use super::command::capture;
use super::{EventFeed, FeedError, FeedStream};

const SYSTEMCTL: &str = "systemctl";

const SYSTEMD_SERVICE: &str = "org.freedesktop.systemd1";
const MANAGER_PATH: &str = "/org/freedesktop/systemd1";
const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";
const UNIT_PATH_PREFIX: &str = "/org/freedesktop/systemd1/unit/";

/// Signals buffered by the bus connection before the oldest are dropped.
const SIGNAL_QUEUE: usize = 256;

/// Watches the service units of one systemd instance.
#[derive(Debug, Clone)]
pub struct SystemdFeed {
    host: String,
    endpoint: Option<String>,
}

impl SystemdFeed {
    /// Feed for `host`. With an `endpoint` both discovery and the signal
    /// subscription go over SSH, otherwise to the local system bus.
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

    async fn connect(&self) -> Result<Connection, FeedError> {
        let builder = match &self.endpoint {
            Some(endpoint) => Builder::address(ssh_bridge_address(endpoint).as_str())?,
            None => Builder::system()?,
        };
        Ok(builder.build().await?)
    }
}

#[async_trait]
impl EventFeed for SystemdFeed {
    fn host(&self) -> &str {
        &self.host
    }

    fn source(&self) -> SourceKind {
        SourceKind::Systemd
    }

    async fn discover(&self) -> Result<Vec<ServiceObservation>, FeedError> {
        let args = self.args([
            "list-units",
            "--type=service",
            "--all",
            "--output=json",
            "--no-pager",
        ]);
        let output = capture(SYSTEMCTL, &args).await?;
        parse_units(&self.host, &output)
    }

    async fn subscribe(&self) -> Result<FeedStream, FeedError> {
        let connection = self.connect().await?;

        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .sender(SYSTEMD_SERVICE)?
            .interface(PROPERTIES_INTERFACE)?
            .member("PropertiesChanged")?
            .build();
        let messages = MessageStream::for_match_rule(rule, &connection, Some(SIGNAL_QUEUE)).await?;

        // Must be issued on the connection that receives the signals.
        connection
            .call_method(
                Some(SYSTEMD_SERVICE),
                MANAGER_PATH,
                Some(MANAGER_INTERFACE),
                "Subscribe",
                &(),
            )
            .await?;
        debug!(host = %self.host, "Subscribed to systemd unit signals");

        let host = self.host.clone();
        Ok(Box::pin(stream! {
            let _subscription = connection;
            tokio::pin!(messages);
            loop {
                match messages.next().await {
                    Some(Ok(message)) => match observation_from_signal(&host, &message) {
                        Ok(Some(obs)) => yield Ok(obs),
                        Ok(None) => {}
                        Err(e) => warn!(host = %host, error = %e, "Skipping unreadable unit signal"),
                    },
                    Some(Err(e)) => {
                        yield Err(FeedError::Bus(e));
                        break;
                    }
                    None => {
                        yield Err(FeedError::Closed);
                        break;
                    }
                }
            }
        }))
    }
}

/// `active` and `reloading` units are up; everything else is down.
fn unit_state(active: &str) -> ServiceState {
    ServiceState::from_running(matches!(active, "active" | "reloading"))
}

#[derive(Debug, Deserialize)]
struct UnitLine {
    unit: String,
    active: String,
    sub: String,
}

/// Parse `systemctl list-units --output=json`.
fn parse_units(host: &str, output: &str) -> Result<Vec<ServiceObservation>, FeedError> {
    let units: Vec<UnitLine> =
        serde_json::from_str(output).map_err(|e| FeedError::Parse(e.to_string()))?;
    Ok(units
        .into_iter()
        .map(|u| {
            ServiceObservation::new(
                host,
                u.unit,
                SourceKind::Systemd,
                unit_state(&u.active),
                format!("{} ({})", u.active, u.sub),
            )
        })
        .collect())
}

/// Decode a `PropertiesChanged(interface, changed, invalidated)` signal.
fn observation_from_signal(
    host: &str,
    message: &Message,
) -> Result<Option<ServiceObservation>, FeedError> {
    let header = message.header();
    let Some(path) = header.path() else {
        return Ok(None);
    };
    let body = message.body();
    let (interface, changed, _invalidated): (String, HashMap<String, OwnedValue>, Vec<String>) =
        body.deserialize()?;

    unit_change(
        host,
        path.as_str(),
        &interface,
        text_property(&changed, "ActiveState"),
        text_property(&changed, "SubState"),
    )
}

fn text_property<'a>(changed: &'a HashMap<String, OwnedValue>, name: &str) -> Option<&'a str> {
    changed
        .get(name)
        .and_then(|value| value.downcast_ref::<&str>().ok())
}

/// Observation for a unit property change, or `None` when the change is not
/// an `ActiveState` update of a service unit.
fn unit_change(
    host: &str,
    path: &str,
    interface: &str,
    active: Option<&str>,
    sub: Option<&str>,
) -> Result<Option<ServiceObservation>, FeedError> {
    if interface != UNIT_INTERFACE {
        return Ok(None);
    }
    let Some(active) = active else {
        return Ok(None);
    };

    let Some(unit) = unit_from_path(path) else {
        return Err(FeedError::Parse(format!("not a unit path: {path}")));
    };
    if !unit.ends_with(".service") {
        return Ok(None);
    }

    let status = sub.map_or_else(|| active.to_string(), |sub| format!("{active} ({sub})"));
    Ok(Some(ServiceObservation::new(
        host,
        unit,
        SourceKind::Systemd,
        unit_state(active),
        status,
    )))
}

/// D-Bus address that reaches `endpoint`'s system bus over SSH.
///
/// Values in a D-Bus address escape every byte outside
/// `[-0-9A-Za-z_/.\*]` as `%xx`.
fn ssh_bridge_address(endpoint: &str) -> String {
    let mut escaped = String::with_capacity(endpoint.len());
    for b in endpoint.bytes() {
        if b.is_ascii_alphanumeric() || b"-_/.\\*".contains(&b) {
            escaped.push(char::from(b));
        } else {
            escaped.push_str(&format!("%{b:02x}"));
        }
    }
    format!("unixexec:path=ssh,argv1=-xT,argv2=--,argv3={escaped},argv4=systemd-stdio-bridge")
}

/// Decode a unit object path such as
/// `/org/freedesktop/systemd1/unit/nginx_2eservice` to `nginx.service`.
///
/// systemd escapes every byte outside `[A-Za-z0-9]` as `_xx` (lowercase hex).
fn unit_from_path(path: &str) -> Option<String> {
    let escaped = path.strip_prefix(UNIT_PATH_PREFIX)?;
    let mut bytes = Vec::with_capacity(escaped.len());
    let mut rest = escaped.as_bytes();
    while let Some((&b, tail)) = rest.split_first() {
        if b == b'_' {
            let hex = tail.get(..2)?;
            let hex = std::str::from_utf8(hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(b);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}
