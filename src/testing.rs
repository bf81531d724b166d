//! Test doubles shared by the unit tests

use crate::config::PluginConfig;
use crate::domain::ports::{KvStore, KvStoreRef, RedfishResponse, RedfishTransport, Transaction, WriteOp};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub const ROOT_UUID: &str = "6d6f7272-6964-4f6e-8e74-726163657221";

/// Configuration suitable for in-process tests
pub fn test_config() -> PluginConfig {
    let mut config = PluginConfig {
        root_service_uuid: ROOT_UUID.to_string(),
        odim_url: "https://odimra.local:45000".to_string(),
        url_translation: Default::default(),
        ..Default::default()
    };
    config.transaction.initial_backoff_millis = 1;
    config.transaction.max_backoff_millis = 2;
    config.subscription.retry_interval_secs = 0;
    config.subscription.monitor_poll_interval_millis = 1;
    config
}

// =============================================================================
// Stub Transport
// =============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Response(RedfishResponse),
    TransportError,
}

/// Scripted southbound transport
///
/// Replies for a URI are consumed in order; the last one is repeated.
#[derive(Default)]
pub struct StubTransport {
    gets: Mutex<HashMap<String, VecDeque<Reply>>>,
    posts: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{"Members": [...]}` body
    pub fn collection(members: &[&str]) -> String {
        let members: Vec<serde_json::Value> = members
            .iter()
            .map(|m| serde_json::json!({ "@odata.id": m }))
            .collect();
        serde_json::json!({ "Members": members }).to_string()
    }

    pub fn on_get(self, uri: &str, status: u16, body: &str) -> Self {
        self.gets.lock().entry(uri.to_string()).or_default().push_back(Reply::Response(
            RedfishResponse {
                status,
                location: None,
                body: body.to_string(),
            },
        ));
        self
    }

    pub fn on_get_error(self, uri: &str) -> Self {
        self.gets
            .lock()
            .entry(uri.to_string())
            .or_default()
            .push_back(Reply::TransportError);
        self
    }

    pub fn on_post(self, uri: &str, status: u16, location: Option<&str>) -> Self {
        self.posts.lock().entry(uri.to_string()).or_default().push_back(Reply::Response(
            RedfishResponse {
                status,
                location: location.map(str::to_string),
                body: String::new(),
            },
        ));
        self
    }

    pub fn on_post_error(self, uri: &str) -> Self {
        self.posts
            .lock()
            .entry(uri.to_string())
            .or_default()
            .push_back(Reply::TransportError);
        self
    }

    pub fn count(&self, method: &str, uri: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|(m, u)| m == method && u == uri)
            .count()
    }

    fn reply(table: &Mutex<HashMap<String, VecDeque<Reply>>>, uri: &str) -> Result<RedfishResponse> {
        let mut table = table.lock();
        let queue = table
            .get_mut(uri)
            .ok_or_else(|| Error::UpstreamStatus {
                uri: uri.to_string(),
                status: 404,
            })?;
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::TransportError) | None => {
                Err(Error::Internal(format!("connection refused: {}", uri)))
            }
        }
    }
}

#[async_trait]
impl RedfishTransport for StubTransport {
    async fn get(&self, uri: &str) -> Result<RedfishResponse> {
        self.requests.lock().push(("GET".into(), uri.into()));
        Self::reply(&self.gets, uri)
    }

    async fn post(&self, uri: &str, _body: &serde_json::Value) -> Result<RedfishResponse> {
        self.requests.lock().push(("POST".into(), uri.into()));
        Self::reply(&self.posts, uri)
    }
}

// =============================================================================
// Fault-Injecting Store
// =============================================================================

/// Store wrapper that fails a number of commits before delegating
///
/// Failed commits never reach the inner store, so nothing they buffered
/// is applied.
pub struct FlakyStore {
    inner: KvStoreRef,
    aborts: Arc<AtomicU32>,
    outages: Arc<AtomicU32>,
    commits: Arc<AtomicU32>,
}

impl FlakyStore {
    pub fn new(inner: KvStoreRef) -> Self {
        Self {
            inner,
            aborts: Arc::new(AtomicU32::new(0)),
            outages: Arc::new(AtomicU32::new(0)),
            commits: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the next `n` commits with `TransactionAborted`
    pub fn abort_next(&self, n: u32) {
        self.aborts.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` commits with `StoreUnavailable`
    pub fn fail_next(&self, n: u32) {
        self.outages.store(n, Ordering::SeqCst);
    }

    /// Commits attempted through this wrapper
    pub fn commits(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.inner.keys(pattern).await
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>> {
        self.inner.smembers(key).await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        self.inner.srem(key, member).await
    }

    async fn watch(&self, keys: &[String]) -> Result<Box<dyn Transaction>> {
        let inner = self.inner.watch(keys).await?;
        Ok(Box::new(FlakyTransaction {
            inner,
            keys: keys.to_vec(),
            aborts: Arc::clone(&self.aborts),
            outages: Arc::clone(&self.outages),
            commits: Arc::clone(&self.commits),
        }))
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }
}

struct FlakyTransaction {
    inner: Box<dyn Transaction>,
    keys: Vec<String>,
    aborts: Arc<AtomicU32>,
    outages: Arc<AtomicU32>,
    commits: Arc<AtomicU32>,
}

#[async_trait]
impl Transaction for FlakyTransaction {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn exists(&mut self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn smembers(&mut self, key: &str) -> Result<BTreeSet<String>> {
        self.inner.smembers(key).await
    }

    fn queue(&mut self, op: WriteOp) {
        self.inner.queue(op);
    }

    fn pending(&self) -> &[WriteOp] {
        self.inner.pending()
    }

    async fn commit(&mut self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.aborts) {
            return Err(Error::TransactionAborted {
                keys: self.keys.clone(),
            });
        }
        if take_one(&self.outages) {
            return Err(Error::StoreUnavailable("injected outage".into()));
        }
        self.inner.commit().await
    }
}
