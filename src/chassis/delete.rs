//! Chassis deletion

use super::ChassisService;
use crate::domain::chassis::Chassis;
use crate::domain::ports::{KvStore, Transaction};
use crate::error::{Error, Result};
use crate::redfish::messages;
use crate::redfish::validation::{Rule, Validator, Violation};
use crate::store::keys::{self, CHASSIS};
use tracing::info;

impl ChassisService {
    /// Delete an empty rack group or rack
    pub async fn delete(&self, oid: &str) -> Result<()> {
        let result = self.delete_chassis(oid).await;
        self.observe("delete", &result);
        result
    }

    async fn delete_chassis(&self, oid: &str) -> Result<()> {
        let Some(chassis) = self.dao.find_chassis(oid).await? else {
            return Err(Error::ResourceNotFound {
                kind: "Chassis".into(),
                oid: oid.to_string(),
            });
        };

        let target = &chassis;
        let violation = Validator::new()
            .rule(Rule::new(
                move || !target.chassis_type.is_supported(),
                move || {
                    Violation::bad_request(messages::property_value_not_in_list(
                        &target.chassis_type.to_string(),
                        "ChassisType",
                        "supported ChassisTypes are: RackGroup|Rack",
                    ))
                },
            ))
            .rule(Rule::new(
                move || !target.links.contains.is_empty(),
                move || {
                    Violation::conflict(messages::resource_in_use(&format!(
                        "there are existing elements(Links.Contains) under {}",
                        target.oid
                    )))
                },
            ))
            .validate()
            .await?;
        if let Some(violation) = violation {
            return Err(Error::Rejected(violation));
        }

        self.dao
            .transact("delete", || self.commit_delete(&chassis))
            .await?;
        info!("Deleted {} {} ({})", chassis.chassis_type, chassis.name, oid);
        Ok(())
    }

    /// Remove the body and, for a rack, its edge to the parent
    async fn commit_delete(&self, chassis: &Chassis) -> Result<()> {
        let oid = chassis.oid.as_str();
        let entity = keys::entity_key(CHASSIS, oid);
        let contains = keys::contains_key(CHASSIS, oid);
        let pointer = keys::contained_in_key(CHASSIS, oid);

        let mut watched = vec![entity.clone(), contains.clone(), pointer.clone()];
        if let Some(parent) = chassis.parent() {
            watched.push(keys::contains_key(CHASSIS, parent));
        }
        let mut tx = self.dao.store().watch(&watched).await?;

        if !tx.exists(&entity).await? {
            return Err(Error::ResourceNotFound {
                kind: "Chassis".into(),
                oid: oid.to_string(),
            });
        }
        // Members may have been attached since validation
        if !tx.smembers(&contains).await?.is_empty() {
            return Err(Error::ResourceInUse {
                oid: oid.to_string(),
            });
        }

        tx.delete(&entity);
        if let Some(parent) = chassis.parent() {
            tx.delete(&pointer);
            tx.srem(&keys::contains_key(CHASSIS, parent), oid);
        }
        tx.commit().await
    }
}
