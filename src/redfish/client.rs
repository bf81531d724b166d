//! Southbound Redfish client
//!
//! `HttpRedfishClient` talks to the upstream aggregation service with HTTP
//! Basic credentials and applies URL translation in both directions.
//! `InventoryClient` answers "which assets does the upstream inventory
//! know about" for the rack membership check.

use crate::config::PluginConfig;
use crate::domain::chassis::Link;
use crate::domain::ports::{RedfishResponse, RedfishTransport, RedfishTransportRef};
use crate::error::{Error, Result};
use crate::redfish::translation::UrlTranslator;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

// =============================================================================
// HTTP Transport
// =============================================================================

pub struct HttpRedfishClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
    translator: UrlTranslator,
}

impl HttpRedfishClient {
    pub fn new(config: &PluginConfig) -> Result<Self> {
        let base_url = Url::parse(&config.odim_url)
            .map_err(|e| Error::Configuration(format!("Invalid OdimURL: {}", e)))?;
        let client = Client::builder()
            .timeout(config.upstream_timeout())
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        Ok(Self {
            client,
            base_url,
            username: config.odim_user_name.clone(),
            password: config.odim_password.clone(),
            translator: UrlTranslator::new(&config.url_translation),
        })
    }

    /// Resolve a (northbound) URI against the upstream base URL
    fn resolve(&self, uri: &str) -> Result<Url> {
        let southbound = self.translator.to_southbound(uri);
        self.base_url
            .join(&southbound)
            .map_err(|e| Error::Internal(format!("Cannot resolve {}: {}", southbound, e)))
    }

    async fn into_response(&self, response: reqwest::Response) -> Result<RedfishResponse> {
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| self.translator.to_northbound(v));
        let body = response.text().await?;
        Ok(RedfishResponse {
            status,
            location,
            body: self.translator.to_northbound(&body),
        })
    }
}

#[async_trait]
impl RedfishTransport for HttpRedfishClient {
    async fn get(&self, uri: &str) -> Result<RedfishResponse> {
        let url = self.resolve(uri)?;
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        self.into_response(response).await
    }

    async fn post(&self, uri: &str, body: &serde_json::Value) -> Result<RedfishResponse> {
        let url = self.resolve(uri)?;
        debug!("POST {}", url);
        let payload = self.translator.to_southbound(&serde_json::to_string(body)?);
        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;
        self.into_response(response).await
    }
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct Members {
    #[serde(rename = "Members", default)]
    members: Vec<Link>,
}

/// Upstream inventory lookups
#[derive(Clone)]
pub struct InventoryClient {
    transport: RedfishTransportRef,
    collections: Vec<String>,
}

impl InventoryClient {
    pub fn new(transport: RedfishTransportRef, collections: Vec<String>) -> Self {
        Self {
            transport,
            collections,
        }
    }

    pub fn transport(&self) -> &RedfishTransportRef {
        &self.transport
    }

    /// Union of the members of every configured inventory collection
    pub async fn known_assets(&self) -> Result<BTreeSet<String>> {
        let mut assets = BTreeSet::new();
        for collection in &self.collections {
            let response = self.transport.get(collection).await?;
            if !response.is_success() {
                return Err(Error::UpstreamStatus {
                    uri: collection.clone(),
                    status: response.status,
                });
            }
            let members: Members = serde_json::from_str(&response.body)?;
            assets.extend(members.members.into_iter().map(|l| l.oid));
        }
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubTransport;
    use assert_matches::assert_matches;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::Router;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_known_assets_union() {
        let stub = StubTransport::new()
            .on_get("/redfish/v1/Chassis", 200, &StubTransport::collection(&["/redfish/v1/Chassis/c1"]))
            .on_get(
                "/redfish/v1/Systems",
                200,
                &StubTransport::collection(&["/redfish/v1/Systems/s1", "/redfish/v1/Systems/s2"]),
            );
        let inventory = InventoryClient::new(
            Arc::new(stub),
            vec!["/redfish/v1/Chassis".into(), "/redfish/v1/Systems".into()],
        );

        let assets = inventory.known_assets().await.unwrap();
        assert_eq!(assets.len(), 3);
        assert!(assets.contains("/redfish/v1/Systems/s2"));
    }

    #[tokio::test]
    async fn test_known_assets_upstream_failure() {
        let stub = StubTransport::new().on_get("/redfish/v1/Systems", 503, "");
        let inventory = InventoryClient::new(Arc::new(stub), vec!["/redfish/v1/Systems".into()]);
        assert_matches!(
            inventory.known_assets().await,
            Err(Error::UpstreamStatus { status: 503, .. })
        );
    }

    async fn systems(headers: HeaderMap) -> impl IntoResponse {
        if headers.get("authorization").is_none() {
            return (StatusCode::UNAUTHORIZED, String::new());
        }
        (
            StatusCode::OK,
            r#"{"Members":[{"@odata.id":"/redfish/v1/Systems/s1"}]}"#.to_string(),
        )
    }

    async fn subscribe(body: String) -> impl IntoResponse {
        let status = if body.contains("/redfish/v1/Systems") {
            StatusCode::ACCEPTED
        } else {
            StatusCode::BAD_REQUEST
        };
        (status, [("Location", "/redfish/v1/TaskService/Tasks/1")], String::new())
    }

    #[tokio::test]
    async fn test_http_client_translates_both_ways() {
        let app = Router::new()
            .route("/redfish/v1/Systems", get(systems))
            .route("/redfish/v1/EventService/Subscriptions", post(subscribe));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = PluginConfig {
            odim_url: format!("http://{}", addr),
            odim_user_name: "admin".into(),
            odim_password: "secret".into(),
            ..Default::default()
        };
        let client = HttpRedfishClient::new(&config).unwrap();

        let response = client.get("/ODIM/v1/Systems").await.unwrap();
        assert_eq!(response.status, 200);
        assert!(response.body.contains("/ODIM/v1/Systems/s1"));

        let response = client
            .post(
                "/redfish/v1/EventService/Subscriptions",
                &serde_json::json!({"OriginResources":[{"@odata.id":"/ODIM/v1/Systems"}]}),
            )
            .await
            .unwrap();
        assert_eq!(response.status, 202);
        assert_eq!(
            response.location.as_deref(),
            Some("/ODIM/v1/TaskService/Tasks/1")
        );
    }
}
