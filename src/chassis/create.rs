//! Chassis creation

use super::ChassisService;
use crate::domain::chassis::{
    Chassis, ChassisCreateRequest, ChassisLinks, ChassisType, CHASSIS_ODATA_TYPE,
};
use crate::domain::ports::{KvStore, Transaction};
use crate::error::{Error, Result};
use crate::redfish::messages;
use crate::redfish::validation::{Rule, Validator, Violation};
use crate::store::keys::{self, CHASSIS};
use tracing::info;
use uuid::Uuid;

/// `Id` assigned to a chassis named `name`
///
/// Derived from the name, so two chassis with the same name would share an
/// oid and the second create is reported as already existing.
pub fn chassis_id(name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn unknown_parent(parent: &str) -> Violation {
    Violation::bad_request(messages::resource_not_found(
        "Chassis",
        parent,
        "Requested Links.ContainedBy[0] is unknown",
    ))
}

impl ChassisService {
    /// Create a rack group or a rack
    pub async fn create(&self, request: ChassisCreateRequest) -> Result<Chassis> {
        let result = self.create_chassis(request).await;
        self.observe("create", &result);
        result
    }

    async fn create_chassis(&self, request: ChassisCreateRequest) -> Result<Chassis> {
        if let Some(violation) = self.create_rules(&request).validate().await? {
            return Err(Error::Rejected(violation));
        }

        let id = chassis_id(&request.name);
        let oid = self.oid_for(&id);
        let chassis = Chassis {
            odata_context: format!("{}/$metadata#Chassis.Chassis", self.base_path),
            oid,
            odata_type: CHASSIS_ODATA_TYPE.to_string(),
            id,
            name: request.name,
            chassis_type: request.chassis_type,
            description: request.description,
            links: ChassisLinks {
                contained_by: request.links.contained_by,
                managed_by: request.links.managed_by,
                contains: vec![],
            },
        };

        self.dao
            .transact("create", || self.commit_create(&chassis))
            .await?;

        info!(
            "Created {} {} ({})",
            chassis.chassis_type, chassis.name, chassis.oid
        );
        Ok(chassis)
    }

    fn create_rules<'a>(&'a self, request: &'a ChassisCreateRequest) -> Validator<'a> {
        let is_rack = request.chassis_type == ChassisType::Rack;
        let contained_by = &request.links.contained_by;
        let managed_by = &request.links.managed_by;
        let parent_oid = contained_by.first().map(|l| l.oid.as_str()).unwrap_or_default();
        let dao = &self.dao;
        let manager_oid = self.manager_oid.as_str();

        Validator::new()
            .rule(Rule::new(
                move || request.name.is_empty(),
                || Violation::bad_request(messages::property_missing("Name", "cannot be empty")),
            ))
            .rule(Rule::new(
                move || !request.chassis_type.is_supported(),
                move || {
                    Violation::bad_request(messages::property_value_not_in_list(
                        &request.chassis_type.to_string(),
                        "ChassisType",
                        "supported ChassisTypes are: RackGroup|Rack",
                    ))
                },
            ))
            .rule(Rule::new(
                move || is_rack && contained_by.is_empty(),
                || {
                    Violation::bad_request(messages::property_value_conflict(
                        "ChassisType",
                        "Links.ContainedBy",
                        "Links.ContainedBy is required for creation of \"ChassisType=Rack\"",
                    ))
                },
            ))
            .rule(Rule::new(
                move || is_rack && contained_by.len() != 1,
                || {
                    Violation::bad_request(messages::property_value_conflict(
                        "ChassisType",
                        "Links.ContainedBy",
                        "len(Links.ContainedBy) should equal 1",
                    ))
                },
            ))
            .rule(Rule::new(
                move || !is_rack && !contained_by.is_empty(),
                || {
                    Violation::bad_request(messages::property_value_conflict(
                        "ChassisType",
                        "Links.ContainedBy",
                        "Links.ContainedBy is not allowed for creation of \"ChassisType=RackGroup\"",
                    ))
                },
            ))
            .rule(Rule::deferred(
                move || async move {
                    Ok::<_, Error>(is_rack && dao.find_chassis(parent_oid).await?.is_none())
                },
                move || unknown_parent(parent_oid),
            ))
            .rule(Rule::deferred(
                move || async move {
                    let parent = if is_rack {
                        dao.find_chassis(parent_oid).await?
                    } else {
                        None
                    };
                    Ok::<_, Error>(parent.map_or(false, |p| p.chassis_type != ChassisType::RackGroup))
                },
                || {
                    Violation::bad_request(messages::property_value_conflict(
                        "Links.ContainedBy",
                        "ChassisType",
                        "Links.ContainedBy[0] should refer to \"ChassisType=RackGroup\"",
                    ))
                },
            ))
            .rule(Rule::new(
                move || managed_by.is_empty(),
                || {
                    Violation::bad_request(messages::property_missing(
                        "Links.ManagedBy",
                        "cannot be empty",
                    ))
                },
            ))
            .rule(Rule::new(
                move || managed_by.first().map_or(false, |m| m.oid != manager_oid),
                move || {
                    let given = managed_by.first().map(|m| m.oid.as_str()).unwrap_or_default();
                    Violation::bad_request(messages::property_value_not_in_list(
                        given,
                        "Links.ManagedBy",
                        &format!("should refer to {}", manager_oid),
                    ))
                },
            ))
    }

    /// Store the body and, for a rack, both sides of the containment edge
    async fn commit_create(&self, chassis: &Chassis) -> Result<()> {
        let entity = keys::entity_key(CHASSIS, &chassis.oid);
        let mut watched = vec![entity.clone()];
        if let Some(parent) = chassis.parent() {
            watched.push(keys::entity_key(CHASSIS, parent));
            watched.push(keys::contains_key(CHASSIS, parent));
            watched.push(keys::contained_in_key(CHASSIS, &chassis.oid));
        }

        let mut tx = self.dao.store().watch(&watched).await?;
        if tx.exists(&entity).await? {
            return Err(Error::ResourceExists {
                kind: "Chassis".into(),
                name: chassis.name.clone(),
            });
        }

        tx.set_nx(&entity, &serde_json::to_string(&chassis.for_storage())?);
        if let Some(parent) = chassis.parent() {
            // The parent may have been deleted since validation
            if !tx.exists(&keys::entity_key(CHASSIS, parent)).await? {
                return Err(Error::Rejected(unknown_parent(parent)));
            }
            tx.sadd(&keys::contains_key(CHASSIS, parent), &chassis.oid);
            tx.set(&keys::contained_in_key(CHASSIS, &chassis.oid), parent);
        }
        tx.commit().await
    }
}
