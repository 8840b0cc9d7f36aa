//! Host reachability records.

use serde::{Deserialize, Serialize};

/// Reason recorded when a failure was reported without any detail.
pub(crate) const UNKNOWN_ERROR: &str = "unknown error";

/// Reachability of a host, as held by the State Store.
///
/// `reachable == false` always comes with a non-empty `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRecord {
    pub host: String,
    pub reachable: bool,
    /// Last failure reason; empty while reachable.
    pub last_error: String,
}

impl HostRecord {
    /// A reachable host.
    pub fn reachable(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            reachable: true,
            last_error: String::new(),
        }
    }

    /// An unreachable host. Blank reasons are replaced so the record never
    /// reports a failure without an explanation.
    pub fn unreachable(host: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let last_error = if reason.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            reason
        };
        Self {
            host: host.into(),
            reachable: false,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_never_has_empty_error() {
        let record = HostRecord::unreachable("db-01", "  ");
        assert!(!record.reachable);
        assert_eq!(record.last_error, UNKNOWN_ERROR);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&HostRecord::unreachable("db-01", "refused")).unwrap();
        assert!(json.contains("\"lastError\":\"refused\""));
    }
}
