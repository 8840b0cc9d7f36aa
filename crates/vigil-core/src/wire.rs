//! Line-oriented wire format shared by the distribution hub and viewers.
//!
//! # Wire Format
//!
//! Every message is a JSON object with a `type`, a unix-millisecond
//! `timestamp` and a type-specific `payload`:
//!
//! ```json
//! {"type":"service_update","timestamp":1718000000000,"payload":{"host":"web-01","service_name":"nginx","source":"docker","previous_state":"running","current_state":"stopped","status":"Exited (0)"}}
//! {"type":"host_unreachable","timestamp":1718000000000,"payload":{"host":"db-01","reason":"connection refused"}}
//! {"type":"host_recovered","timestamp":1718000000000,"payload":{"host":"db-01"}}
//! {"type":"ping","timestamp":1718000000000,"payload":{}}
//! ```
//!
//! Several messages may travel in one transmission, separated by `\n`.
//! Receivers split on newlines and skip blank fragments.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::MonitorEvent;

/// Errors decoding a wire message.
#[derive(Debug, Error)]
pub enum WireError {
    /// The fragment is not valid JSON, has an unknown `type`, or its payload
    /// does not match the type.
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Payload of a `service_update` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUpdatePayload {
    pub host: String,
    pub service_name: String,
    pub source: String,
    pub previous_state: String,
    pub current_state: String,
    pub status: String,
}

/// Payload of a `host_unreachable` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostUnreachablePayload {
    pub host: String,
    pub reason: String,
}

/// Payload of a `host_recovered` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecoveredPayload {
    pub host: String,
}

/// Typed body of a wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireBody {
    ServiceUpdate(ServiceUpdatePayload),
    HostUnreachable(HostUnreachablePayload),
    HostRecovered(HostRecoveredPayload),
    Ping,
}

impl WireBody {
    /// Value of the `type` field.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ServiceUpdate(_) => "service_update",
            Self::HostUnreachable(_) => "host_unreachable",
            Self::HostRecovered(_) => "host_recovered",
            Self::Ping => "ping",
        }
    }
}

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage", into = "RawMessage")]
pub struct WireMessage {
    /// Unix milliseconds.
    pub timestamp: i64,
    pub body: WireBody,
}

/// Untyped envelope used for (de)serialization.
#[derive(Serialize, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    timestamp: i64,
    #[serde(default)]
    payload: serde_json::Value,
}

impl From<WireMessage> for RawMessage {
    fn from(msg: WireMessage) -> Self {
        let kind = msg.body.kind().to_string();
        let payload = match msg.body {
            WireBody::ServiceUpdate(p) => serde_json::to_value(p),
            WireBody::HostUnreachable(p) => serde_json::to_value(p),
            WireBody::HostRecovered(p) => serde_json::to_value(p),
            WireBody::Ping => Ok(serde_json::Value::Object(serde_json::Map::new())),
        }
        // Plain string structs always convert.
        .unwrap_or_default();
        Self {
            kind,
            timestamp: msg.timestamp,
            payload,
        }
    }
}

impl TryFrom<RawMessage> for WireMessage {
    type Error = String;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        fn payload<T: serde::de::DeserializeOwned>(
            kind: &str,
            value: serde_json::Value,
        ) -> Result<T, String> {
            serde_json::from_value(value).map_err(|e| format!("invalid payload for {kind}: {e}"))
        }

        let body = match raw.kind.as_str() {
            "service_update" => WireBody::ServiceUpdate(payload(&raw.kind, raw.payload)?),
            "host_unreachable" => WireBody::HostUnreachable(payload(&raw.kind, raw.payload)?),
            "host_recovered" => WireBody::HostRecovered(payload(&raw.kind, raw.payload)?),
            "ping" => WireBody::Ping,
            other => return Err(format!("unknown message type: {other}")),
        };
        Ok(Self {
            timestamp: raw.timestamp,
            body,
        })
    }
}

impl WireMessage {
    /// A keep-alive message stamped with the current time.
    pub fn ping() -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            body: WireBody::Ping,
        }
    }

    /// Whether this is a keep-alive message.
    pub const fn is_ping(&self) -> bool {
        matches!(self.body, WireBody::Ping)
    }

    /// Serialize to a single JSON line (without terminator).
    pub fn to_line(&self) -> String {
        // The envelope is built from strings and integers only.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a single JSON line.
    pub fn from_line(line: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(line)?)
    }
}

impl From<&MonitorEvent> for WireMessage {
    fn from(event: &MonitorEvent) -> Self {
        let body = match event {
            MonitorEvent::ServiceStateChanged {
                host,
                service,
                source,
                previous_state,
                current_state,
                status,
                ..
            } => WireBody::ServiceUpdate(ServiceUpdatePayload {
                host: host.clone(),
                service_name: service.clone(),
                source: source.as_str().to_string(),
                previous_state: previous_state.as_str().to_string(),
                current_state: current_state.as_str().to_string(),
                status: status.clone(),
            }),
            MonitorEvent::HostUnreachable { host, reason, .. } => {
                WireBody::HostUnreachable(HostUnreachablePayload {
                    host: host.clone(),
                    reason: reason.clone(),
                })
            }
            MonitorEvent::HostRecovered { host, .. } => {
                WireBody::HostRecovered(HostRecoveredPayload { host: host.clone() })
            }
        };
        Self {
            timestamp: event.timestamp().timestamp_millis(),
            body,
        }
    }
}

/// Join messages into one newline-separated transmission unit.
pub fn encode_frame(messages: &[WireMessage]) -> String {
    messages
        .iter()
        .map(WireMessage::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a transmission unit into its messages, in order.
///
/// Blank fragments are skipped. Each remaining fragment is decoded on its
/// own, so one malformed message does not hide its neighbours.
pub fn decode_frame(frame: &str) -> Vec<Result<WireMessage, WireError>> {
    frame
        .split('\n')
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(WireMessage::from_line)
        .collect()
}
