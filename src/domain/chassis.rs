//! Chassis resource model
//!
//! Redfish `Chassis`, `Manager` and collection bodies served by the
//! plugin, plus the request bodies accepted by POST and PATCH.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CHASSIS_ODATA_TYPE: &str = "#Chassis.v1_14_0.Chassis";
pub const CHASSIS_COLLECTION_ODATA_TYPE: &str = "#ChassisCollection.ChassisCollection";
pub const MANAGER_ODATA_TYPE: &str = "#Manager.v1_10_0.Manager";
pub const MANAGER_COLLECTION_ODATA_TYPE: &str = "#ManagerCollection.ManagerCollection";

// =============================================================================
// Links
// =============================================================================

/// Redfish reference: `{"@odata.id": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "@odata.id")]
    pub oid: String,
}

impl Link {
    pub fn new(oid: impl Into<String>) -> Self {
        Self { oid: oid.into() }
    }
}

impl From<&str> for Link {
    fn from(oid: &str) -> Self {
        Self::new(oid)
    }
}

// =============================================================================
// Chassis Type
// =============================================================================

/// Chassis types the plugin manages
///
/// Any other value is kept verbatim so it can be reported back in a
/// `PropertyValueNotInList` message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChassisType {
    RackGroup,
    Rack,
    #[serde(untagged)]
    Other(String),
}

impl ChassisType {
    pub fn is_supported(&self) -> bool {
        matches!(self, ChassisType::RackGroup | ChassisType::Rack)
    }
}

impl Default for ChassisType {
    fn default() -> Self {
        ChassisType::Other(String::new())
    }
}

impl std::fmt::Display for ChassisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChassisType::RackGroup => write!(f, "RackGroup"),
            ChassisType::Rack => write!(f, "Rack"),
            ChassisType::Other(other) => write!(f, "{}", other),
        }
    }
}

// =============================================================================
// Chassis
// =============================================================================

/// `Links` section of a chassis
///
/// `Contains` is never persisted; it is filled from the containment index
/// on every read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChassisLinks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contained_by: Vec<Link>,
    #[serde(default)]
    pub managed_by: Vec<Link>,
    #[serde(default)]
    pub contains: Vec<Link>,
}

/// Stored and served chassis body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Chassis {
    #[serde(rename = "@odata.context", default)]
    pub odata_context: String,
    #[serde(rename = "@odata.id")]
    pub oid: String,
    #[serde(rename = "@odata.type", default)]
    pub odata_type: String,
    pub id: String,
    pub name: String,
    pub chassis_type: ChassisType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub links: ChassisLinks,
}

impl Chassis {
    /// Parent oid, if any
    pub fn parent(&self) -> Option<&str> {
        self.links.contained_by.first().map(|l| l.oid.as_str())
    }

    /// Copy of this chassis as persisted: `Links.Contains` stripped
    pub fn for_storage(&self) -> Chassis {
        let mut stored = self.clone();
        stored.links.contains.clear();
        stored
    }

    /// Set `Links.Contains` from index members
    pub fn with_members(mut self, members: BTreeSet<String>) -> Self {
        self.links.contains = members.into_iter().map(Link::new).collect();
        self
    }
}

// =============================================================================
// Requests
// =============================================================================

/// POST body for chassis creation
///
/// Every field is optional at the wire level so missing properties reach
/// the validator instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChassisCreateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub chassis_type: ChassisType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub links: CreateLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateLinks {
    #[serde(default)]
    pub contained_by: Vec<Link>,
    #[serde(default)]
    pub managed_by: Vec<Link>,
}

/// PATCH body: only `Links.Contains` may be written
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RackUpdateRequest {
    #[serde(default)]
    pub links: RackUpdateLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RackUpdateLinks {
    #[serde(default)]
    pub contains: Vec<Link>,
}

impl RackUpdateRequest {
    /// Desired member oids, deduplicated
    pub fn desired_members(&self) -> BTreeSet<String> {
        self.links.contains.iter().map(|l| l.oid.clone()).collect()
    }
}

// =============================================================================
// Collections & Manager
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "@odata.context")]
    pub odata_context: String,
    #[serde(rename = "@odata.id")]
    pub oid: String,
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Members", default)]
    pub members: Vec<Link>,
    #[serde(rename = "Members@odata.count", default)]
    pub members_count: usize,
}

impl Collection {
    pub fn new(
        oid: impl Into<String>,
        odata_type: &str,
        name: &str,
        context: impl Into<String>,
        members: Vec<Link>,
    ) -> Self {
        Self {
            odata_context: context.into(),
            oid: oid.into(),
            odata_type: odata_type.to_string(),
            name: name.to_string(),
            members_count: members.len(),
            members,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStatus {
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Health")]
    pub health: String,
}

/// The plugin's own manager resource, built from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manager {
    #[serde(rename = "@odata.context")]
    pub odata_context: String,
    #[serde(rename = "@odata.id")]
    pub oid: String,
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    pub id: String,
    pub name: String,
    pub manager_type: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
    pub firmware_version: String,
    pub status: ManagerStatus,
}

impl Manager {
    pub fn new(base_path: &str, uuid: &str, name: &str, firmware_version: &str) -> Self {
        Self {
            odata_context: format!("{}/$metadata#Manager.Manager", base_path),
            oid: format!("{}/Managers/{}", base_path, uuid),
            odata_type: MANAGER_ODATA_TYPE.to_string(),
            id: uuid.to_string(),
            name: name.to_string(),
            manager_type: "Service".to_string(),
            uuid: uuid.to_string(),
            firmware_version: firmware_version.to_string(),
            status: ManagerStatus {
                state: "Enabled".to_string(),
                health: "OK".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chassis_type_parsing() {
        let t: ChassisType = serde_json::from_str("\"Rack\"").unwrap();
        assert_eq!(t, ChassisType::Rack);
        assert!(t.is_supported());

        let t: ChassisType = serde_json::from_str("\"Blade\"").unwrap();
        assert_eq!(t, ChassisType::Other("Blade".into()));
        assert!(!t.is_supported());
        assert_eq!(t.to_string(), "Blade");
    }

    #[test]
    fn test_create_request_defaults() {
        let req: ChassisCreateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.name.is_empty());
        assert!(!req.chassis_type.is_supported());
        assert!(req.links.managed_by.is_empty());
    }

    #[test]
    fn test_update_request_rejects_unknown_fields() {
        let ok: RackUpdateRequest = serde_json::from_str(
            r#"{"Links":{"Contains":[{"@odata.id":"/redfish/v1/Systems/1"},{"@odata.id":"/redfish/v1/Systems/1"}]}}"#,
        )
        .unwrap();
        assert_eq!(ok.desired_members().len(), 1);

        assert!(serde_json::from_str::<RackUpdateRequest>(r#"{"Name":"x"}"#).is_err());
        assert!(
            serde_json::from_str::<RackUpdateRequest>(r#"{"Links":{"ManagedBy":[]}}"#).is_err()
        );
    }

    #[test]
    fn test_storage_form_drops_contains() {
        let chassis = Chassis {
            odata_context: "/ODIM/v1/$metadata#Chassis.Chassis".into(),
            oid: "/ODIM/v1/Chassis/1".into(),
            odata_type: CHASSIS_ODATA_TYPE.into(),
            id: "1".into(),
            name: "R1".into(),
            chassis_type: ChassisType::Rack,
            description: None,
            links: ChassisLinks {
                contained_by: vec![Link::new("/ODIM/v1/Chassis/0")],
                managed_by: vec![],
                contains: vec![Link::new("/redfish/v1/Systems/1")],
            },
        };
        let stored = chassis.for_storage();
        assert!(stored.links.contains.is_empty());
        assert_eq!(stored.parent(), Some("/ODIM/v1/Chassis/0"));

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["ChassisType"], "Rack");
        assert_eq!(json["Links"]["Contains"], serde_json::json!([]));
        assert!(json.get("Description").is_none());
    }

    #[test]
    fn test_collection_counts_members() {
        let c = Collection::new(
            "/ODIM/v1/Chassis",
            CHASSIS_COLLECTION_ODATA_TYPE,
            "Chassis Collection",
            "/ODIM/v1/$metadata#ChassisCollection.ChassisCollection",
            vec![Link::new("a"), Link::new("b")],
        );
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["Members@odata.count"], 2);
    }
}
