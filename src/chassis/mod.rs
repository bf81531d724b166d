//! Chassis Service
//!
//! Create, read, list, reconcile and delete rack groups and racks. Every
//! handler validates first (fail-fast, one diagnostic per request) and then
//! commits through a single optimistic transaction, so the forward and
//! reverse containment index are always written together.
//!
//! Transactions re-check inside the watch whatever a concurrent request
//! could have invalidated between validation and commit; validation alone
//! only guards the common, uncontended path.

mod create;
mod delete;
mod update;

use crate::domain::chassis::{Chassis, Collection, Link, CHASSIS_COLLECTION_ODATA_TYPE};
use crate::error::{Error, Result};
use crate::metrics::PluginMetrics;
use crate::redfish::client::InventoryClient;
use crate::store::Dao;
use tracing::debug;

pub use create::chassis_id;

/// Chassis handlers bound to one plugin instance
#[derive(Clone)]
pub struct ChassisService {
    dao: Dao,
    inventory: InventoryClient,
    base_path: String,
    manager_oid: String,
    metrics: PluginMetrics,
}

impl ChassisService {
    pub fn new(
        dao: Dao,
        inventory: InventoryClient,
        base_path: &str,
        manager_oid: &str,
        metrics: PluginMetrics,
    ) -> Self {
        Self {
            dao,
            inventory,
            base_path: base_path.to_string(),
            manager_oid: manager_oid.to_string(),
            metrics,
        }
    }

    pub fn dao(&self) -> &Dao {
        &self.dao
    }

    /// Oid of the chassis collection
    pub fn collection_oid(&self) -> String {
        format!("{}/Chassis", self.base_path)
    }

    /// Oid of the chassis with the given `Id`
    pub fn oid_for(&self, id: &str) -> String {
        format!("{}/Chassis/{}", self.base_path, id)
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Read one chassis with its current members
    pub async fn get(&self, oid: &str) -> Result<Chassis> {
        let result = self.dao.find_chassis(oid).await.and_then(|found| {
            found.ok_or_else(|| Error::ResourceNotFound {
                kind: "Chassis".into(),
                oid: oid.to_string(),
            })
        });
        self.observe("get", &result);
        result
    }

    /// List every chassis
    pub async fn collection(&self) -> Result<Collection> {
        let result = self.dao.chassis_oids().await.map(|oids| {
            debug!("Chassis collection has {} members", oids.len());
            Collection::new(
                self.collection_oid(),
                CHASSIS_COLLECTION_ODATA_TYPE,
                "Chassis Collection",
                format!("{}/$metadata#ChassisCollection.ChassisCollection", self.base_path),
                oids.into_iter().map(Link::new).collect(),
            )
        });
        self.observe("list", &result);
        result
    }

    /// Count the outcome of an operation
    fn observe<T>(&self, operation: &str, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(e) if e.status_code().is_client_error() => "rejected",
            Err(_) => "error",
        };
        self.metrics.record_operation(operation, outcome);
    }
}
