//! End-to-end tests of the REST surface over the in-memory store

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::LOCATION, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use unmanaged_racks_plugin::domain::ports::RedfishResponse;
use unmanaged_racks_plugin::{
    MemoryStore, Plugin, PluginConfig, RedfishTransport, RestRouter, Result,
};

const ROOT_UUID: &str = "0f6e3f3c-6b1e-4d3a-9a57-3a0c4f8f2a10";
const SYS1: &str = "/ODIM/v1/Systems/sys1";
const SYS2: &str = "/ODIM/v1/Systems/sys2";

/// Upstream answering inventory reads; subscriptions are refused
struct Upstream;

#[async_trait]
impl RedfishTransport for Upstream {
    async fn get(&self, uri: &str) -> Result<RedfishResponse> {
        let members = match uri {
            "/redfish/v1/Systems" => json!([{ "@odata.id": SYS1 }, { "@odata.id": SYS2 }]),
            "/redfish/v1/Chassis" => json!([]),
            _ => {
                return Ok(RedfishResponse {
                    status: 404,
                    location: None,
                    body: String::new(),
                })
            }
        };
        Ok(RedfishResponse {
            status: 200,
            location: None,
            body: json!({ "Members": members }).to_string(),
        })
    }

    async fn post(&self, _uri: &str, _body: &Value) -> Result<RedfishResponse> {
        Ok(RedfishResponse {
            status: 503,
            location: None,
            body: String::new(),
        })
    }
}

struct Harness {
    router: Router,
    store: MemoryStore,
}

impl Harness {
    fn new() -> Self {
        let mut config = PluginConfig {
            root_service_uuid: ROOT_UUID.to_string(),
            odim_url: "https://odimra.local:45000".to_string(),
            ..Default::default()
        };
        config.subscription.retry_interval_secs = 3600;
        config.transaction.initial_backoff_millis = 1;
        config.transaction.max_backoff_millis = 2;

        let store = MemoryStore::new();
        let plugin = Plugin::new(
            config,
            Arc::new(store.clone()),
            Arc::new(Upstream),
            CancellationToken::new(),
        )
        .unwrap();
        Self {
            router: RestRouter::new(Arc::new(plugin)).build(),
            store,
        }
    }

    fn manager(&self) -> String {
        format!("/ODIM/v1/Managers/{}", ROOT_UUID)
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Option<String>, Value) {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            assert_ok!(serde_json::from_slice(&bytes))
        };
        (status, location, json)
    }

    async fn create_rack_group(&self, name: &str) -> String {
        let (status, location, body) = self
            .send(
                "POST",
                "/ODIM/v1/Chassis",
                Some(json!({
                    "Name": name,
                    "ChassisType": "RackGroup",
                    "Links": { "ManagedBy": [{ "@odata.id": self.manager() }] }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        location.unwrap()
    }

    async fn create_rack(&self, name: &str, parent: &str) -> String {
        let (status, location, body) = self
            .send(
                "POST",
                "/ODIM/v1/Chassis",
                Some(json!({
                    "Name": name,
                    "ChassisType": "Rack",
                    "Links": {
                        "ContainedBy": [{ "@odata.id": parent }],
                        "ManagedBy": [{ "@odata.id": self.manager() }]
                    }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        location.unwrap()
    }

    async fn patch(&self, rack: &str, members: &[&str]) -> (StatusCode, Value) {
        let contains: Vec<Value> = members.iter().map(|m| json!({ "@odata.id": m })).collect();
        let (status, _, body) = self
            .send("PATCH", rack, Some(json!({ "Links": { "Contains": contains } })))
            .await;
        (status, body)
    }

    async fn contains(&self, oid: &str) -> Vec<String> {
        let (status, _, body) = self.send("GET", oid, None).await;
        assert_eq!(status, StatusCode::OK);
        body["Links"]["Contains"]
            .as_array()
            .map(|links| {
                links
                    .iter()
                    .map(|l| l["@odata.id"].as_str().unwrap().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn message_id(body: &Value) -> &str {
    body["error"]["@Message.ExtendedInfo"][0]["MessageId"]
        .as_str()
        .unwrap_or_default()
}

fn removed(origin: &str) -> Value {
    json!({
        "@odata.type": "#Event.v1_4_0.Event",
        "Name": "Event Array",
        "Events": [{
            "EventType": "ResourceRemoved",
            "EventId": "1",
            "MessageId": "ResourceEvent.1.0.3.ResourceRemoved",
            "OriginOfCondition": { "@odata.id": origin }
        }]
    })
}

#[tokio::test]
async fn test_rack_group_and_rack_creation() {
    let h = Harness::new();
    let rg = h.create_rack_group("RG1").await;
    let rack = h.create_rack("R1", &rg).await;

    assert_eq!(h.contains(&rg).await, vec![rack.clone()]);

    let (status, _, body) = h.send("GET", &rack, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Name"], "R1");
    assert_eq!(body["ChassisType"], "Rack");
    assert_eq!(body["Links"]["ContainedBy"][0]["@odata.id"], rg.as_str());
    assert_eq!(body["Links"]["ManagedBy"][0]["@odata.id"], h.manager());

    let (status, _, body) = h.send("GET", "/ODIM/v1/Chassis", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Members@odata.count"], 2);
}

#[tokio::test]
async fn test_duplicate_name_conflicts() {
    let h = Harness::new();
    h.create_rack_group("RG1").await;

    let (status, _, body) = h
        .send(
            "POST",
            "/ODIM/v1/Chassis",
            Some(json!({
                "Name": "RG1",
                "ChassisType": "RackGroup",
                "Links": { "ManagedBy": [{ "@odata.id": h.manager() }] }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(message_id(&body).contains("ResourceAlreadyExists"), "{}", body);
}

#[tokio::test]
async fn test_create_validation_failures() {
    let h = Harness::new();

    let (status, _, body) = h
        .send(
            "POST",
            "/ODIM/v1/Chassis",
            Some(json!({
                "Name": "R1",
                "ChassisType": "Rack",
                "Links": { "ManagedBy": [{ "@odata.id": h.manager() }] }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message_id(&body).contains("PropertyValueConflict"), "{}", body);

    let (status, _, body) = h
        .send(
            "POST",
            "/ODIM/v1/Chassis",
            Some(json!({
                "Name": "Blade",
                "ChassisType": "Blade",
                "Links": { "ManagedBy": [{ "@odata.id": h.manager() }] }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message_id(&body).contains("PropertyValueNotInList"), "{}", body);

    let (status, _, _) = h
        .send(
            "POST",
            "/ODIM/v1/Chassis",
            Some(json!({
                "Name": "R1",
                "ChassisType": "Rack",
                "Links": {
                    "ContainedBy": [{ "@odata.id": "/ODIM/v1/Chassis/missing" }],
                    "ManagedBy": [{ "@odata.id": h.manager() }]
                }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_delete_requires_empty_chassis() {
    let h = Harness::new();
    let rg = h.create_rack_group("RG1").await;
    let rack = h.create_rack("R1", &rg).await;

    let (status, _, body) = h.send("DELETE", &rg, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(message_id(&body).contains("ResourceInUse"), "{}", body);

    let (status, _, _) = h.send("DELETE", &rack, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = h.send("DELETE", &rg, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = h.send("GET", &rg, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_attach_and_detach_systems() {
    let h = Harness::new();
    let rg = h.create_rack_group("RG1").await;
    let rack = h.create_rack("R1", &rg).await;

    let (status, body) = h.patch(&rack, &[SYS1]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Links"]["Contains"][0]["@odata.id"], SYS1);

    // a rack with members cannot be deleted
    let (status, _, _) = h.send("DELETE", &rack, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = h.patch(&rack, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.contains(&rack).await.is_empty(), "{}", body);

    let (status, _, _) = h.send("DELETE", &rack, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_removal_event_detaches_member() {
    let h = Harness::new();
    let rg = h.create_rack_group("RG1").await;
    let rack = h.create_rack("R1", &rg).await;
    h.patch(&rack, &[SYS1, SYS2]).await;

    // delivered with southbound oids, rewritten on the way in
    let event = removed("/redfish/v1/Systems/sys1");
    let (status, _, _) = h.send("POST", "/EventService/Events", Some(event.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.contains(&rack).await, vec![SYS2.to_string()]);

    let revision = h.store.revision();
    let (status, _, _) = h.send("POST", "/EventService/Events", Some(event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.store.revision(), revision);

    // sys1 is free again
    let other = h.create_rack("R2", &rg).await;
    let (status, _) = h.patch(&other, &[SYS1]).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_member_of_another_rack_conflicts() {
    let h = Harness::new();
    let rg = h.create_rack_group("RG1").await;
    let r1 = h.create_rack("R1", &rg).await;
    let r2 = h.create_rack("R2", &rg).await;
    h.patch(&r1, &[SYS1]).await;

    let (status, body) = h.patch(&r2, &[SYS1]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(message_id(&body).contains("PropertyValueConflict"), "{}", body);

    assert_eq!(h.contains(&r1).await, vec![SYS1.to_string()]);
    assert!(h.contains(&r2).await.is_empty());
}

#[tokio::test]
async fn test_unknown_asset_and_missing_rack() {
    let h = Harness::new();
    let rg = h.create_rack_group("RG1").await;
    let rack = h.create_rack("R1", &rg).await;

    let (status, body) = h.patch(&rack, &["/ODIM/v1/Systems/ghost"]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!message_id(&body).is_empty());

    let (status, _) = h.patch("/ODIM/v1/Chassis/missing", &[SYS1]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h.patch(&rg, &[SYS1]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_activates_plugin() {
    let h = Harness::new();
    let (status, _, body) = h.send("GET", "/ODIM/v1/Status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Status"]["Available"], "yes");
    assert_eq!(body["Name"], "Unmanaged Racks Plugin Status");
}
