//! Tunnel discovery boundary: live `(host, port)` pairs keyed by entity id.
//!
//! The engine never talks to a discovery API itself. A [`TunnelProvider`]
//! supplies the live coordinates, and [`overlay_tunnel`] merges them onto an
//! entity record for external use. Absence of a tunnel is not an error at
//! this layer; callers opt into that via `must_exist`.

use crate::entity::EntityRecord;
use crate::error::{OutpostError, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// A live endpoint reported by tunnel discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelEndpoint {
    pub host: String,
    pub port: u16,
}

/// Source of live endpoints keyed by entity id.
pub trait TunnelProvider {
    fn lookup(&self, entity_id: &str) -> Option<TunnelEndpoint>;
}

/// Map-backed provider. Serves as the cache refreshed from a discovery API
/// and as the test double.
#[derive(Debug, Clone, Default)]
pub struct TunnelTable {
    endpoints: BTreeMap<String, TunnelEndpoint>,
}

impl TunnelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a discovery API payload; see [`parse_tunnel_list`].
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            endpoints: parse_tunnel_list(payload),
        }
    }

    pub fn insert(&mut self, entity_id: impl Into<String>, endpoint: TunnelEndpoint) {
        self.endpoints.insert(entity_id.into(), endpoint);
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl TunnelProvider for TunnelTable {
    fn lookup(&self, entity_id: &str) -> Option<TunnelEndpoint> {
        self.endpoints.get(entity_id).cloned()
    }
}

/// Return a copy of `record` with the provider's live coordinates overlaid
/// onto `url`/`port`. Returns `Ok(None)` when no tunnel exists and
/// `must_exist` is false.
pub fn overlay_tunnel(
    record: &EntityRecord,
    provider: &dyn TunnelProvider,
    must_exist: bool,
) -> Result<Option<EntityRecord>> {
    match provider.lookup(&record.id) {
        Some(endpoint) => Ok(Some(
            record.clone().with_live(endpoint.host, endpoint.port),
        )),
        None if must_exist => Err(OutpostError::TunnelNotFound {
            id: record.id.clone(),
        }),
        None => {
            debug!(id = %record.id, "no tunnel found for entity");
            Ok(None)
        }
    }
}

fn tcp_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^tcp://(.+):(\d+)$").expect("static pattern"))
}

/// Parse a discovery API payload of the shape
/// `{"tunnels": [{"metadata": <entity id>, "proto": "tcp", "public_url": "tcp://host:port"}, ...]}`.
///
/// Entries are keyed by their `metadata` field. Tunnels without metadata,
/// with an unparsable `public_url`, or sharing metadata with an earlier
/// tunnel are skipped with a warning. Non-tcp tunnels without metadata are
/// ignored silently.
pub fn parse_tunnel_list(payload: &Value) -> BTreeMap<String, TunnelEndpoint> {
    let mut endpoints = BTreeMap::new();
    let tunnels = payload
        .get("tunnels")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for tunnel in tunnels {
        let metadata = tunnel
            .get("metadata")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let proto = tunnel
            .get("proto")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let public_url = tunnel
            .get("public_url")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if metadata.is_empty() {
            if proto == "tcp" {
                warn!(public_url = %public_url, "tcp tunnel has no metadata, skipping");
            }
            continue;
        }
        if endpoints.contains_key(metadata) {
            warn!(metadata = %metadata, "multiple tunnels share the same metadata, skipping");
            continue;
        }

        let parsed = tcp_url_pattern().captures(public_url).and_then(|captures| {
            let host = captures[1].to_string();
            let port = captures[2].parse::<u16>().ok()?;
            Some(TunnelEndpoint { host, port })
        });
        match parsed {
            Some(endpoint) => {
                debug!(metadata = %metadata, host = %endpoint.host, port = endpoint.port, "parsed tunnel");
                endpoints.insert(metadata.to_string(), endpoint);
            }
            None => {
                warn!(public_url = %public_url, "failed to parse public_url, skipping");
            }
        }
    }
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "tunnels": [
                {"metadata": "box1", "proto": "tcp", "public_url": "tcp://4.tcp.example.net:14022"},
                {"metadata": "", "proto": "tcp", "public_url": "tcp://unlabeled.example.net:1"},
                {"metadata": "", "proto": "https", "public_url": "https://ignored.example.net"},
                {"metadata": "box1", "proto": "tcp", "public_url": "tcp://dup.example.net:2"},
                {"metadata": "box2", "proto": "tcp", "public_url": "not-a-url"},
                {"metadata": "box3", "proto": "tcp", "public_url": "tcp://8.tcp.example.net:8022"}
            ]
        })
    }

    #[test]
    fn test_parse_tunnel_list() {
        let endpoints = parse_tunnel_list(&sample_payload());
        assert_eq!(endpoints.len(), 2);
        assert_eq!(
            endpoints.get("box1"),
            Some(&TunnelEndpoint {
                host: "4.tcp.example.net".to_string(),
                port: 14022
            })
        );
        assert_eq!(
            endpoints.get("box3"),
            Some(&TunnelEndpoint {
                host: "8.tcp.example.net".to_string(),
                port: 8022
            })
        );
    }

    #[test]
    fn test_parse_empty_payload() {
        assert!(parse_tunnel_list(&json!({})).is_empty());
        assert!(parse_tunnel_list(&json!({"tunnels": []})).is_empty());
    }

    #[test]
    fn test_overlay_fills_live_coordinates() {
        let table = TunnelTable::from_payload(&sample_payload());
        let record = EntityRecord {
            id: "box1".to_string(),
            user: "alice".to_string(),
            ..Default::default()
        };

        let merged = overlay_tunnel(&record, &table, true).unwrap().unwrap();
        assert_eq!(merged.url, "4.tcp.example.net");
        assert_eq!(merged.port, 14022);
        assert_eq!(merged.user, "alice");
    }

    #[test]
    fn test_overlay_missing_tunnel() {
        let table = TunnelTable::new();
        let record = EntityRecord {
            id: "box9".to_string(),
            ..Default::default()
        };

        assert!(overlay_tunnel(&record, &table, false).unwrap().is_none());
        assert!(matches!(
            overlay_tunnel(&record, &table, true).unwrap_err(),
            OutpostError::TunnelNotFound { .. }
        ));
    }
}
