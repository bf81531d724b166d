//! Event Reconciler
//!
//! Detaches assets the upstream inventory reports as removed. Each event
//! record is handled in its own transaction; a failing record is logged
//! and counted, and the rest of the delivery is still processed.

use crate::domain::events::EventEnvelope;
use crate::domain::ports::{KvStore, Transaction};
use crate::error::{Error, Result};
use crate::metrics::PluginMetrics;
use crate::redfish::translation::UrlTranslator;
use crate::store::keys::{self, CHASSIS};
use crate::store::Dao;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Whether a delivery is currently being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReconcilerState {
    Idle,
    Processing,
}

/// Outcome of one delivery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Assets removed from a rack
    pub detached: Vec<String>,
    /// Records without an origin, whose origin is not attached anywhere,
    /// or whose origin is one of our own chassis
    pub skipped: usize,
    /// Records whose detach failed
    pub failed: usize,
}

#[derive(Clone)]
pub struct EventReconciler {
    dao: Dao,
    translator: UrlTranslator,
    metrics: PluginMetrics,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight counter when a delivery finishes, however it ends
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EventReconciler {
    pub fn new(dao: Dao, translator: UrlTranslator, metrics: PluginMetrics) -> Self {
        Self {
            dao,
            translator,
            metrics,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> ReconcilerState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            ReconcilerState::Processing
        } else {
            ReconcilerState::Idle
        }
    }

    /// Handle a raw event delivery
    ///
    /// Only an unparseable body fails the call; per-record failures end up
    /// in the report.
    pub async fn process(&self, raw: &str) -> Result<ReconcileReport> {
        let translated = self.translator.to_northbound(raw);
        let envelope: EventEnvelope = serde_json::from_str(&translated)
            .map_err(|e| Error::MalformedJson(e.to_string()))?;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        debug!(
            "Processing event delivery {:?} with {} records",
            envelope.name,
            envelope.events.len()
        );

        let mut report = ReconcileReport::default();
        for event in &envelope.events {
            let Some(origin) = event.origin() else {
                report.skipped += 1;
                self.metrics.record_event("skipped");
                continue;
            };

            match self.detach(origin).await {
                Ok(Some(rack)) => {
                    info!("Detached {} from {} ({})", origin, rack, event.event_type);
                    report.detached.push(origin.to_string());
                    self.metrics.record_event("detached");
                }
                Ok(None) => {
                    debug!("{} is not attached to any rack", origin);
                    report.skipped += 1;
                    self.metrics.record_event("skipped");
                }
                Err(e) => {
                    error!("Failed to detach {}: {}", origin, e);
                    report.failed += 1;
                    self.metrics.record_event("failed");
                }
            }
        }
        Ok(report)
    }

    /// Remove `member` from whichever rack holds it
    ///
    /// Returns the rack it was removed from, or `None` if it was not
    /// attached. Rack groups and racks are never detached here: their
    /// edges only go away through delete.
    pub async fn detach(&self, member: &str) -> Result<Option<String>> {
        if self.dao.container_of(member).await?.is_none() {
            return Ok(None);
        }
        self.dao
            .transact("detach", || self.commit_detach(member))
            .await
    }

    async fn commit_detach(&self, member: &str) -> Result<Option<String>> {
        let pointer = keys::contained_in_key(CHASSIS, member);
        let entity = keys::entity_key(CHASSIS, member);
        let Some(rack) = self.dao.container_of(member).await? else {
            return Ok(None);
        };

        let contains = keys::contains_key(CHASSIS, &rack);
        let mut tx = self
            .dao
            .store()
            .watch(&[pointer.clone(), contains.clone(), entity.clone()])
            .await?;

        if tx.exists(&entity).await? {
            debug!("{} is a managed chassis, not an asset", member);
            tx.commit().await?;
            return Ok(None);
        }

        // The pointer was read before the watch was in place
        if tx.get(&pointer).await?.as_deref() != Some(rack.as_str()) {
            return Err(Error::TransactionAborted { keys: vec![pointer] });
        }

        tx.delete(&pointer);
        tx.srem(&contains, member);
        tx.commit().await?;
        Ok(Some(rack))
    }
}
