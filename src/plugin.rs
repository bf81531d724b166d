//! Plugin context
//!
//! `Plugin` owns everything a running instance needs: configuration, the
//! DAO over the shared store, the southbound transport and the services
//! built on top of them. It is constructed once and handed to the REST
//! layer behind an `Arc`; nothing lives in process-wide statics.

use crate::chassis::ChassisService;
use crate::config::PluginConfig;
use crate::domain::chassis::{Collection, Link, Manager, MANAGER_COLLECTION_ODATA_TYPE};
use crate::domain::ports::{KvStoreRef, RedfishTransportRef};
use crate::error::Result;
use crate::events::{EventReconciler, SubscriptionKeepAlive, SubscriptionState};
use crate::metrics::PluginMetrics;
use crate::redfish::client::InventoryClient;
use crate::redfish::translation::UrlTranslator;
use crate::store::Dao;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const MANAGER_NAME: &str = "Unmanaged Racks Plugin";

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityStatus {
    #[serde(rename = "Available")]
    pub available: String,
    /// Start time of this instance
    #[serde(rename = "Uptime")]
    pub uptime: String,
    #[serde(rename = "TimeStamp")]
    pub timestamp: String,
}

/// Body of `GET {BasePath}/Status`
#[derive(Debug, Clone, Serialize)]
pub struct PluginStatus {
    #[serde(rename = "_comment")]
    pub comment: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Status")]
    pub status: AvailabilityStatus,
    #[serde(rename = "EventSubscription")]
    pub event_subscription: SubscriptionState,
}

// =============================================================================
// Plugin
// =============================================================================

pub struct Plugin {
    config: PluginConfig,
    metrics: PluginMetrics,
    store: KvStoreRef,
    chassis: ChassisService,
    reconciler: EventReconciler,
    keep_alive: Arc<SubscriptionKeepAlive>,
    manager: Manager,
    started_at: DateTime<Utc>,
    shutdown: CancellationToken,
}

impl Plugin {
    /// Wire a plugin instance over the given store and upstream transport
    pub fn new(
        config: PluginConfig,
        store: KvStoreRef,
        transport: RedfishTransportRef,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let metrics = PluginMetrics::new()?;
        let dao = Dao::new(store.clone(), config.transaction.clone(), metrics.clone());
        let inventory = InventoryClient::new(
            Arc::clone(&transport),
            config.inventory_collections.clone(),
        );
        let manager_oid = config.manager_oid();

        let chassis = ChassisService::new(
            dao.clone(),
            inventory,
            &config.base_path,
            &manager_oid,
            metrics.clone(),
        );
        let reconciler = EventReconciler::new(
            dao,
            UrlTranslator::new(&config.url_translation),
            metrics.clone(),
        );
        let keep_alive = Arc::new(SubscriptionKeepAlive::new(
            transport,
            config.event_destination(),
            config.subscription.clone(),
            metrics.clone(),
            shutdown.clone(),
        ));
        let manager = Manager::new(
            &config.base_path,
            &config.root_service_uuid,
            MANAGER_NAME,
            &config.firmware_version,
        );

        info!("Plugin manager {}", manager.oid);
        Ok(Self {
            config,
            metrics,
            store,
            chassis,
            reconciler,
            keep_alive,
            manager,
            started_at: Utc::now(),
            shutdown,
        })
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PluginMetrics {
        &self.metrics
    }

    pub fn chassis(&self) -> &ChassisService {
        &self.chassis
    }

    pub fn reconciler(&self) -> &EventReconciler {
        &self.reconciler
    }

    pub fn keep_alive(&self) -> &Arc<SubscriptionKeepAlive> {
        &self.keep_alive
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Start the subscription keep-alive if it is not running yet
    pub fn activate(&self) {
        if self.keep_alive.start() {
            info!("Plugin activated");
        }
    }

    pub fn managers(&self) -> Collection {
        Collection::new(
            format!("{}/Managers", self.config.base_path),
            MANAGER_COLLECTION_ODATA_TYPE,
            "Managers",
            format!(
                "{}/$metadata#ManagerCollection.ManagerCollection",
                self.config.base_path
            ),
            vec![Link::new(self.manager.oid.clone())],
        )
    }

    pub fn status(&self) -> PluginStatus {
        PluginStatus {
            comment: "Plugin Status Response".to_string(),
            name: "Unmanaged Racks Plugin Status".to_string(),
            version: self.config.firmware_version.clone(),
            status: AvailabilityStatus {
                available: "yes".to_string(),
                uptime: self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            },
            event_subscription: self.keep_alive.state(),
        }
    }

    /// Store reachability, for the health endpoint
    pub async fn healthy(&self) -> bool {
        self.store.health_check().await.unwrap_or(false)
    }
}
