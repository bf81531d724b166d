//! Redfish event model
//!
//! Inbound event envelopes delivered to the event sink and the
//! subscription request the plugin registers upstream.

use crate::domain::chassis::Link;
use serde::{Deserialize, Serialize};

/// Event envelope POSTed by the upstream event service
///
/// Only `Events[*].OriginOfCondition` drives reconciliation; every other
/// field is tolerated but optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "@odata.context", default)]
    pub odata_context: String,
    #[serde(rename = "@odata.type", default)]
    pub odata_type: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Events", default)]
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventRecord {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub origin_of_condition: Option<Link>,
}

impl EventRecord {
    pub fn origin(&self) -> Option<&str> {
        self.origin_of_condition
            .as_ref()
            .map(|l| l.oid.as_str())
            .filter(|oid| !oid.is_empty())
    }
}

/// Body of `POST /redfish/v1/EventService/Subscriptions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionRequest {
    pub name: String,
    pub destination: String,
    pub event_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_ids: Vec<String>,
    pub resource_types: Vec<String>,
    pub context: String,
    pub protocol: String,
    pub subscription_type: String,
    pub event_format_type: String,
    pub subordinate_resources: bool,
    pub origin_resources: Vec<Link>,
}

impl SubscriptionRequest {
    /// Removal subscription for computer systems, delivered to `destination`
    pub fn resource_removed(name: &str, destination: &str) -> Self {
        Self {
            name: name.to_string(),
            destination: destination.to_string(),
            event_types: vec!["ResourceRemoved".to_string()],
            message_ids: Vec::new(),
            resource_types: vec!["ComputerSystem".to_string()],
            context: "ODIMRA_Event".to_string(),
            protocol: "Redfish".to_string(),
            subscription_type: "RedfishEvent".to_string(),
            event_format_type: "Event".to_string(),
            subordinate_resources: true,
            origin_resources: vec![Link::new("/redfish/v1/Systems")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_envelope() {
        let env: EventEnvelope = serde_json::from_str(
            r#"{"Events":[{"EventType":"ResourceRemoved","OriginOfCondition":{"@odata.id":"/redfish/v1/Systems/1"}},{"EventType":"Alert"}]}"#,
        )
        .unwrap();
        assert_eq!(env.events.len(), 2);
        assert_eq!(env.events[0].origin(), Some("/redfish/v1/Systems/1"));
        assert_eq!(env.events[1].origin(), None);
    }

    #[test]
    fn test_subscription_request_shape() {
        let req = SubscriptionRequest::resource_removed("URP", "https://urp:45003/EventService/Events");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["EventTypes"][0], "ResourceRemoved");
        assert_eq!(json["ResourceTypes"][0], "ComputerSystem");
        assert_eq!(json["OriginResources"][0]["@odata.id"], "/redfish/v1/Systems");
        assert_eq!(json["SubordinateResources"], true);
        assert!(json.get("MessageIds").is_none());
    }
}
