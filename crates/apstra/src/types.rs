//! Core types for controller operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Login credentials for a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Build credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A blueprint as listed by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintSummary {
    /// Controller id.
    pub id: String,
    /// Display label (the name used in input files).
    pub label: String,
}

/// Staging vs deployed version of a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStatus {
    /// Free-form status reported by the controller.
    #[serde(default)]
    pub status: String,
    /// Version of the staging blueprint.
    #[serde(default)]
    pub staging_version: u64,
    /// Version of the deployed blueprint.
    #[serde(default)]
    pub deployed_version: u64,
}

impl DiffStatus {
    /// Whether the staging blueprint holds uncommitted changes.
    #[must_use]
    pub fn has_uncommitted_changes(&self) -> bool {
        self.staging_version != self.deployed_version
    }
}

/// A Time Voyager revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Revision id.
    pub revision_id: String,
    /// Whether the revision is kept permanently.
    #[serde(default)]
    pub user_saved: bool,
    /// Creation timestamp (RFC 3339, sorts chronologically).
    #[serde(default)]
    pub created_at: String,
    /// Commit description.
    #[serde(default)]
    pub description: String,
}

/// Structural validation errors of a staging blueprint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuildErrors {
    /// Number of individual errors.
    pub count: usize,
    /// Raw error document.
    pub details: Value,
}

impl BuildErrors {
    /// Count the leaf entries of an error document.
    #[must_use]
    pub fn from_document(details: Value) -> Self {
        Self {
            count: count_entries(&details),
            details,
        }
    }

    /// Whether the blueprint builds cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.count == 0
    }
}

fn count_entries(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.values().map(count_entries).sum(),
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}

/// Result of a commit-check for one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemCheck {
    /// System label (hostname).
    pub label: String,
    /// Controller system id.
    #[serde(default)]
    pub system_id: String,
    /// `ok`, `drift` or `error`.
    #[serde(default)]
    pub state: String,
    /// Error messages reported for the system.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Rendered configuration diff, when the controller provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl SystemCheck {
    /// Whether this system reported drift or errors.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.errors.is_empty() || !self.state.eq_ignore_ascii_case("ok")
    }
}

/// Commit-check result for a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitCheckReport {
    /// Per-system results.
    #[serde(default)]
    pub systems: Vec<SystemCheck>,
}

impl CommitCheckReport {
    /// Systems with drift or errors.
    #[must_use]
    pub fn failures(&self) -> Vec<&SystemCheck> {
        self.systems.iter().filter(|s| s.is_failure()).collect()
    }

    /// Whether every system passed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Design and resource object kinds managed outside the plan tool's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    /// Design template.
    Template,
    /// Rack type.
    RackType,
    /// Logical device.
    LogicalDevice,
    /// Interface map.
    InterfaceMap,
    /// Configlet.
    Configlet,
    /// Property set.
    PropertySet,
    /// IPv4 pool.
    IpPool,
    /// IPv6 pool.
    Ipv6Pool,
    /// VNI pool.
    VniPool,
    /// ASN pool.
    AsnPool,
}

impl ObjectKind {
    /// Every kind.
    pub const ALL: [Self; 10] = [
        Self::Template,
        Self::RackType,
        Self::LogicalDevice,
        Self::InterfaceMap,
        Self::Configlet,
        Self::PropertySet,
        Self::IpPool,
        Self::Ipv6Pool,
        Self::VniPool,
        Self::AsnPool,
    ];

    /// REST collection path.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Template => "/api/design/templates",
            Self::RackType => "/api/design/rack-types",
            Self::LogicalDevice => "/api/design/logical-devices",
            Self::InterfaceMap => "/api/design/interface-maps",
            Self::Configlet => "/api/design/configlets",
            Self::PropertySet => "/api/design/property-sets",
            Self::IpPool => "/api/resources/ip-pools",
            Self::Ipv6Pool => "/api/resources/ipv6-pools",
            Self::VniPool => "/api/resources/vni-pools",
            Self::AsnPool => "/api/resources/asn-pools",
        }
    }

    /// Key of the object list in the input YAML files.
    #[must_use]
    pub fn menu_key(&self) -> &'static str {
        match self {
            Self::Template => "templates",
            Self::RackType => "rack_types",
            Self::LogicalDevice => "logical_devices",
            Self::InterfaceMap => "interface_maps",
            Self::Configlet => "configlets",
            Self::PropertySet => "property_sets",
            Self::IpPool => "ip_pools",
            Self::Ipv6Pool => "ipv6_pools",
            Self::VniPool => "vni_pools",
            Self::AsnPool => "asn_pools",
        }
    }

    /// Resolve a YAML object-type key.
    #[must_use]
    pub fn from_menu_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.menu_key() == key)
    }

    /// Deletion order: interface maps must go before the logical devices
    /// they reference. Lower ranks are deleted first.
    #[must_use]
    pub fn deletion_rank(&self) -> u8 {
        match self {
            Self::LogicalDevice => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.menu_key().replace('_', " "))
    }
}

/// A design or resource object on the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Controller id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A managed system (device) known to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    /// Controller id.
    pub id: String,
    /// Device key (serial number).
    #[serde(default)]
    pub device_key: String,
    /// Hostname from device facts.
    #[serde(default)]
    pub hostname: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_status_uncommitted() {
        let status = DiffStatus {
            status: "undeployed".to_string(),
            staging_version: 5,
            deployed_version: 4,
        };
        assert!(status.has_uncommitted_changes());

        let status: DiffStatus =
            serde_json::from_value(json!({"staging_version": 3, "deployed_version": 3})).unwrap();
        assert!(!status.has_uncommitted_changes());
    }

    #[test]
    fn test_build_errors_count() {
        let errors = BuildErrors::from_document(json!({
            "nodes": {"leaf1": ["missing asn"], "leaf2": ["missing loopback", "no pool"]},
            "relationships": {},
        }));
        assert_eq!(errors.count, 3);
        assert!(!errors.is_clean());
        assert!(BuildErrors::from_document(json!({"nodes": {}})).is_clean());
    }

    #[test]
    fn test_commit_check_failures() {
        let report: CommitCheckReport = serde_json::from_value(json!({
            "systems": [
                {"label": "leaf1", "state": "ok"},
                {"label": "leaf2", "state": "drift"},
                {"label": "spine1", "state": "ok", "errors": ["commit failed"]},
            ]
        }))
        .unwrap();
        let labels: Vec<_> = report.failures().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["leaf2", "spine1"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_object_kind_menu_keys() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_menu_key(kind.menu_key()), Some(kind));
        }
        assert_eq!(ObjectKind::from_menu_key("racks"), None);
        assert!(ObjectKind::InterfaceMap.deletion_rank() < ObjectKind::LogicalDevice.deletion_rank());
        assert_eq!(ObjectKind::IpPool.to_string(), "ip pools");
    }
}
