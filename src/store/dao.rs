//! Chassis DAO
//!
//! Typed reads over the key schema and the bounded-retry wrapper every
//! multi-key mutation goes through.

use crate::config::TransactionConfig;
use crate::domain::chassis::Chassis;
use crate::domain::ports::{KvStore, KvStoreRef, Transaction};
use crate::error::Result;
use crate::metrics::PluginMetrics;
use crate::store::keys::{self, CHASSIS};
use backoff::ExponentialBackoffBuilder;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Data access object shared by the handlers and the background tasks
#[derive(Clone)]
pub struct Dao {
    store: KvStoreRef,
    policy: TransactionConfig,
    metrics: PluginMetrics,
}

impl Dao {
    pub fn new(store: KvStoreRef, policy: TransactionConfig, metrics: PluginMetrics) -> Self {
        Self {
            store,
            policy,
            metrics,
        }
    }

    pub fn store(&self) -> &KvStoreRef {
        &self.store
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read a chassis with `Links.Contains` populated from the index
    pub async fn find_chassis(&self, oid: &str) -> Result<Option<Chassis>> {
        let Some(raw) = self.store.get(&keys::entity_key(CHASSIS, oid)).await? else {
            return Ok(None);
        };
        let chassis: Chassis = serde_json::from_str(&raw)?;
        let members = self.contains(oid).await?;
        Ok(Some(chassis.with_members(members)))
    }

    /// Oids of every stored chassis, sorted
    pub async fn chassis_oids(&self) -> Result<Vec<String>> {
        let keys = self.store.keys(&keys::entity_pattern(CHASSIS)).await?;
        Ok(keys
            .iter()
            .filter_map(|k| keys::oid_from_entity_key(CHASSIS, k))
            .map(str::to_string)
            .collect())
    }

    pub async fn chassis_exists(&self, oid: &str) -> Result<bool> {
        self.store.exists(&keys::entity_key(CHASSIS, oid)).await
    }

    /// Forward index: members of `oid`
    pub async fn contains(&self, oid: &str) -> Result<BTreeSet<String>> {
        self.store.smembers(&keys::contains_key(CHASSIS, oid)).await
    }

    /// Reverse index: parent of `member`
    pub async fn container_of(&self, member: &str) -> Result<Option<String>> {
        self.store.get(&keys::contained_in_key(CHASSIS, member)).await
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Run `op` until it succeeds, fails permanently or runs out of attempts
    ///
    /// `op` is expected to open its own watch, re-read whatever it depends
    /// on and commit. Only transient errors (aborted commits, store
    /// transport failures) are retried, with exponential backoff.
    pub async fn transact<T, F, Fut>(&self, name: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.policy.initial_backoff_millis))
            .with_max_interval(Duration::from_millis(self.policy.max_backoff_millis))
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0u32;
        let result = backoff::future::retry_notify(
            policy,
            || {
                attempt += 1;
                let current = attempt;
                let fut = op();
                async move {
                    match fut.await {
                        Ok(value) => Ok(value),
                        Err(e) if e.is_transient() && current < max_attempts => {
                            Err(backoff::Error::transient(e))
                        }
                        Err(e) => Err(backoff::Error::permanent(e)),
                    }
                }
            },
            |e: crate::error::Error, wait: Duration| {
                self.metrics.record_retry();
                debug!("Transaction {} retrying in {:?}: {}", name, wait, e);
            },
        )
        .await;

        if let Err(e) = &result {
            if e.is_transient() {
                warn!(
                    "Transaction {} gave up after {} attempts: {}",
                    name, max_attempts, e
                );
            }
        }
        result
    }
}

/// Read a stored chassis body through an open transaction
pub async fn read_chassis(tx: &mut dyn Transaction, oid: &str) -> Result<Option<Chassis>> {
    match tx.get(&keys::entity_key(CHASSIS, oid)).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}
