//! Remote entity records and template default-fill.
//!
//! An [`EntityRecord`] is an immutable value; updates go through the pure
//! `with_*` functions which return a new record. The dynamic-only fields are
//! `url` and `port`: they hold live network coordinates, are never written to
//! the static registry file, and survive reconciliation via
//! [`EntityRecord::with_live`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Operating system family of a remote entity.
///
/// `Unknown` is the unset sentinel filled from the template during fix-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OsType {
    #[default]
    Unknown,
    Linux,
    MacOs,
    Windows,
}

impl OsType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, OsType::Unknown)
    }
}

/// One remote entity: a named host/service used for deployment, testing or
/// tunneling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntityRecord {
    /// Stable unique key. Matches the entity's key in the registry map;
    /// mismatches are repaired during fix-up.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Human-readable display name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    /// Remote login user. Empty means unset.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    /// Live host name or address. Dynamic-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Live port. Dynamic-only.
    #[serde(default, skip_serializing_if = "is_zero_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "OsType::is_unknown")]
    pub os_type: OsType,

    /// Project directory on the remote host. An empty path (or the literal
    /// `default`) means unset.
    #[serde(default, skip_serializing_if = "dir_is_unset")]
    pub project_dir: PathBuf,

    /// Opaque host metadata, copied verbatim and never defaulted.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub host_info: Map<String, Value>,
}

impl EntityRecord {
    /// Copy with the given id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Copy with live network coordinates set.
    pub fn with_live(mut self, url: impl Into<String>, port: u16) -> Self {
        self.url = url.into();
        self.port = port;
        self
    }

    /// Copy with the dynamic-only fields cleared. Static registry entries
    /// must never carry live coordinates.
    pub fn scrubbed(&self) -> Self {
        let mut record = self.clone();
        record.url = String::new();
        record.port = 0;
        record
    }

    /// Rebuild against a template: the id is forced to the given key, and
    /// unset fields (`os_type`, `user`, `project_dir`) are filled from the
    /// template. Live coordinates and `host_info` are left untouched.
    pub fn apply_defaults(&self, id: &str, template: &EntityRecord) -> EntityRecord {
        let mut fixed = self.clone();
        fixed.id = id.to_string();
        if fixed.os_type.is_unknown() {
            fixed.os_type = template.os_type;
        }
        if fixed.user.is_empty() {
            fixed.user = template.user.clone();
        }
        if dir_is_unset(&fixed.project_dir) {
            fixed.project_dir = template.project_dir.clone();
        }
        fixed
    }
}

fn is_zero_port(port: &u16) -> bool {
    *port == 0
}

/// Unset sentinel for `project_dir`.
fn dir_is_unset(path: &Path) -> bool {
    path.as_os_str().is_empty() || path == Path::new("default")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> EntityRecord {
        EntityRecord {
            user: "alice".to_string(),
            os_type: OsType::Linux,
            project_dir: PathBuf::from("/home/alice/project"),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_defaults_fills_unset_fields() {
        let record = EntityRecord {
            id: "stale".to_string(),
            label: "Build box".to_string(),
            ..Default::default()
        };

        let fixed = record.apply_defaults("box1", &template());
        assert_eq!(fixed.id, "box1");
        assert_eq!(fixed.label, "Build box");
        assert_eq!(fixed.user, "alice");
        assert_eq!(fixed.os_type, OsType::Linux);
        assert_eq!(fixed.project_dir, PathBuf::from("/home/alice/project"));
    }

    #[test]
    fn test_apply_defaults_keeps_set_fields() {
        let record = EntityRecord {
            id: "box2".to_string(),
            user: "bob".to_string(),
            os_type: OsType::MacOs,
            project_dir: PathBuf::from("/opt/work"),
            ..Default::default()
        };

        let fixed = record.apply_defaults("box2", &template());
        assert_eq!(fixed.user, "bob");
        assert_eq!(fixed.os_type, OsType::MacOs);
        assert_eq!(fixed.project_dir, PathBuf::from("/opt/work"));
    }

    #[test]
    fn test_default_path_is_unset_sentinel() {
        let record = EntityRecord {
            project_dir: PathBuf::from("default"),
            ..Default::default()
        };
        let fixed = record.apply_defaults("box3", &template());
        assert_eq!(fixed.project_dir, PathBuf::from("/home/alice/project"));
    }

    #[test]
    fn test_scrubbed_clears_live_coordinates() {
        let record = EntityRecord {
            id: "box4".to_string(),
            user: "carol".to_string(),
            ..Default::default()
        }
        .with_live("4.tcp.example.net", 14022);

        let scrubbed = record.scrubbed();
        assert!(scrubbed.url.is_empty());
        assert_eq!(scrubbed.port, 0);
        assert_eq!(scrubbed.user, "carol");
    }

    #[test]
    fn test_static_serialization_omits_live_fields() {
        let record = EntityRecord {
            id: "box5".to_string(),
            user: "dan".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(record.scrubbed()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("url"));
        assert!(!obj.contains_key("port"));
        assert!(!obj.contains_key("os_type"));
    }

    #[test]
    fn test_round_trip_with_host_info() {
        let mut host_info = Map::new();
        host_info.insert("gpu".to_string(), Value::String("a6000".to_string()));
        let record = EntityRecord {
            id: "box6".to_string(),
            host_info,
            ..Default::default()
        }
        .with_live("host.example.net", 2222);

        let json = serde_json::to_string(&record).unwrap();
        let parsed: EntityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
