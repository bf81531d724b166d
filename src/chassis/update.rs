//! Rack membership reconciliation (PATCH `Links.Contains`)

use super::ChassisService;
use crate::domain::chassis::{Chassis, ChassisType, RackUpdateRequest};
use crate::domain::ports::{KvStore, Transaction};
use crate::error::{Error, Result};
use crate::redfish::messages;
use crate::redfish::validation::{Rule, Validator, Violation};
use crate::store::keys::{self, CHASSIS};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

fn attached_elsewhere(member: &str, owner: &str) -> Violation {
    Violation::conflict(messages::property_value_conflict(
        "Links.Contains",
        "Links.ContainedBy",
        &format!("{} is already attached to {}", member, owner),
    ))
}

fn chassis_as_member(member: &str) -> Violation {
    Violation::bad_request(messages::property_value_not_in_list(
        member,
        "Links.Contains",
        "Chassis cannot be attached under Rack chassis",
    ))
}

impl ChassisService {
    /// Replace the member set of a rack
    pub async fn update(&self, oid: &str, request: RackUpdateRequest) -> Result<Chassis> {
        let result = self.update_rack(oid, request).await;
        self.observe("update", &result);
        result
    }

    async fn update_rack(&self, oid: &str, request: RackUpdateRequest) -> Result<Chassis> {
        let Some(rack) = self.dao.find_chassis(oid).await? else {
            return Err(Error::ResourceNotFound {
                kind: "Chassis".into(),
                oid: oid.to_string(),
            });
        };
        let desired = request.desired_members();

        if let Some(violation) = self.validate_update(&rack, &desired).await? {
            return Err(Error::Rejected(violation));
        }

        let changed = self
            .dao
            .transact("update", || self.commit_update(oid, &desired))
            .await?;
        if changed {
            info!("Rack {} now holds {} members", oid, desired.len());
        } else {
            debug!("Rack {} membership unchanged", oid);
        }

        self.dao
            .find_chassis(oid)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "Chassis".into(),
                oid: oid.to_string(),
            })
    }

    async fn validate_update(
        &self,
        rack: &Chassis,
        desired: &BTreeSet<String>,
    ) -> Result<Option<Violation>> {
        let dao = &self.dao;
        let inventory = &self.inventory;
        let clash: OnceLock<(String, String)> = OnceLock::new();
        let clash = &clash;
        let chassis_member: OnceLock<String> = OnceLock::new();
        let chassis_member = &chassis_member;

        Validator::new()
            .rule(Rule::new(
                move || rack.chassis_type != ChassisType::Rack,
                move || {
                    Violation::bad_request(messages::property_value_not_in_list(
                        &rack.chassis_type.to_string(),
                        "ChassisType",
                        "supported ChassisTypes are: Rack",
                    ))
                },
            ))
            .rule(Rule::new(
                move || rack.parent().map_or(false, |p| desired.contains(p)),
                || {
                    Violation::bad_request(messages::property_value_conflict(
                        "Links.Contains",
                        "Links.ContainedBy",
                        "RackGroup cannot be attached under Rack chassis",
                    ))
                },
            ))
            .rule(Rule::deferred(
                move || async move {
                    if desired.is_empty() {
                        return Ok::<_, Error>(false);
                    }
                    match inventory.known_assets().await {
                        Ok(known) => Ok(!desired.is_subset(&known)),
                        Err(e) => {
                            warn!("Cannot confirm requested members upstream: {}", e);
                            Ok(true)
                        }
                    }
                },
                move || {
                    Violation::bad_request(messages::property_value_not_in_list(
                        &format!("{:?}", desired),
                        "Links.Contains",
                        "Couldn't retrieve information about requested links. Make sure that they are existing!",
                    ))
                },
            ))
            .rule(Rule::deferred(
                move || async move {
                    for member in desired {
                        if dao.chassis_exists(member).await? {
                            let _ = chassis_member.set(member.clone());
                            return Ok::<_, Error>(true);
                        }
                    }
                    Ok(false)
                },
                move || chassis_as_member(chassis_member.get().map_or("", String::as_str)),
            ))
            .rule(Rule::deferred(
                move || async move {
                    for member in desired {
                        match dao.container_of(member).await? {
                            Some(owner) if owner != rack.oid => {
                                let _ = clash.set((member.clone(), owner));
                                return Ok::<_, Error>(true);
                            }
                            _ => {}
                        }
                    }
                    Ok(false)
                },
                move || match clash.get() {
                    Some((member, owner)) => attached_elsewhere(member, owner),
                    None => attached_elsewhere("", ""),
                },
            ))
            .validate()
            .await
    }

    /// Apply the difference between the stored and the desired member set
    ///
    /// Returns whether anything was written.
    async fn commit_update(&self, rack_oid: &str, desired: &BTreeSet<String>) -> Result<bool> {
        let entity = keys::entity_key(CHASSIS, rack_oid);
        let contains = keys::contains_key(CHASSIS, rack_oid);
        let known = self.dao.contains(rack_oid).await?;

        let mut watched = vec![entity.clone(), contains.clone()];
        watched.extend(
            known
                .union(desired)
                .map(|member| keys::contained_in_key(CHASSIS, member)),
        );
        let mut tx = self.dao.store().watch(&watched).await?;

        // The member set was read before the watch was in place
        if tx.smembers(&contains).await? != known {
            return Err(Error::TransactionAborted {
                keys: vec![contains],
            });
        }
        if !tx.exists(&entity).await? {
            return Err(Error::ResourceNotFound {
                kind: "Chassis".into(),
                oid: rack_oid.to_string(),
            });
        }

        let to_remove: Vec<&String> = known.difference(desired).collect();
        let to_add: Vec<&String> = desired.difference(&known).collect();
        if to_remove.is_empty() && to_add.is_empty() {
            tx.commit().await?;
            return Ok(false);
        }

        for member in &to_add {
            if let Some(owner) = tx.get(&keys::contained_in_key(CHASSIS, member)).await? {
                if owner != rack_oid {
                    return Err(Error::Rejected(attached_elsewhere(member, &owner)));
                }
            }
        }

        for member in to_remove {
            tx.srem(&contains, member);
            tx.delete(&keys::contained_in_key(CHASSIS, member));
        }
        for member in to_add {
            tx.sadd(&contains, member);
            tx.set(&keys::contained_in_key(CHASSIS, member), rack_oid);
        }
        tx.commit().await?;
        Ok(true)
    }
}
