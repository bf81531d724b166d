//! In-Memory Store
//!
//! Process-local `KvStore` used in standalone mode and by tests. All state
//! lives behind one `parking_lot::Mutex` so a transaction commit can check
//! every watched key and apply every buffered write under a single lock.
//!
//! Each key carries a version stamped from a global revision counter on
//! every effective write. Versions survive deletion, which lets a watch
//! detect delete-then-recreate between snapshot and commit.

use crate::domain::ports::{KvStore, Transaction, WriteOp};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// Stored Values
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, Value>,
    versions: HashMap<String, u64>,
    revision: u64,
}

impl Inner {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &str) {
        self.revision += 1;
        self.versions.insert(key.to_string(), self.revision);
    }

    fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(Value::Set(_)) => Err(wrong_type(key)),
        }
    }

    fn members(&self, key: &str) -> Result<BTreeSet<String>> {
        match self.values.get(key) {
            None => Ok(BTreeSet::new()),
            Some(Value::Set(s)) => Ok(s.clone()),
            Some(Value::Str(_)) => Err(wrong_type(key)),
        }
    }

    /// Apply `ops` all-or-nothing
    fn apply(&mut self, ops: &[WriteOp]) -> Result<()> {
        let mut staged: HashMap<String, Option<Value>> = HashMap::new();
        for op in ops {
            let key = op.key();
            let current = match staged.get(key) {
                Some(v) => v.clone(),
                None => self.values.get(key).cloned(),
            };
            let next = match op {
                WriteOp::Set { value, .. } => Some(Value::Str(value.clone())),
                WriteOp::SetNx { value, .. } => match current {
                    None => Some(Value::Str(value.clone())),
                    existing => existing,
                },
                WriteOp::Delete { .. } => None,
                WriteOp::SAdd { member, .. } => match current {
                    None => Some(Value::Set(BTreeSet::from([member.clone()]))),
                    Some(Value::Set(mut set)) => {
                        set.insert(member.clone());
                        Some(Value::Set(set))
                    }
                    Some(Value::Str(_)) => return Err(wrong_type(key)),
                },
                WriteOp::SRem { member, .. } => match current {
                    None => None,
                    Some(Value::Set(mut set)) => {
                        set.remove(member);
                        if set.is_empty() {
                            None
                        } else {
                            Some(Value::Set(set))
                        }
                    }
                    Some(Value::Str(_)) => return Err(wrong_type(key)),
                },
            };
            staged.insert(key.to_string(), next);
        }

        for (key, next) in staged {
            if self.values.get(&key) == next.as_ref() {
                continue;
            }
            match next {
                Some(value) => {
                    self.values.insert(key.clone(), value);
                }
                None => {
                    self.values.remove(&key);
                }
            }
            self.bump(&key);
        }
        Ok(())
    }
}

fn wrong_type(key: &str) -> Error {
    Error::Internal(format!(
        "WRONGTYPE operation against key {} holding the wrong kind of value",
        key
    ))
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-process key/value store with optimistic transactions
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of effective writes applied so far
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    /// Number of keys currently holding a value
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark `key` as modified without changing its value
    ///
    /// Any open transaction watching `key` will abort on commit.
    pub fn touch(&self, key: &str) {
        self.inner.lock().bump(key);
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.lock().get_str(key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.lock().apply(&[WriteOp::Set {
            key: key.to_string(),
            value: value.to_string(),
        }])
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        let existed = inner.values.contains_key(key);
        inner.apply(&[WriteOp::Delete {
            key: key.to_string(),
        }])?;
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().values.contains_key(key))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| Error::Internal(format!("invalid key pattern {}: {}", pattern, e)))?;
        let mut keys: Vec<String> = self
            .inner
            .lock()
            .values
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>> {
        self.inner.lock().members(key)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        self.inner.lock().apply(&[WriteOp::SAdd {
            key: key.to_string(),
            member: member.to_string(),
        }])
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        self.inner.lock().apply(&[WriteOp::SRem {
            key: key.to_string(),
            member: member.to_string(),
        }])
    }

    async fn watch(&self, keys: &[String]) -> Result<Box<dyn Transaction>> {
        let inner = self.inner.lock();
        let watched = keys
            .iter()
            .map(|k| (k.clone(), inner.version(k)))
            .collect();
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            watched,
            pending: Vec::new(),
        }))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

// =============================================================================
// Memory Transaction
// =============================================================================

struct MemoryTransaction {
    inner: Arc<Mutex<Inner>>,
    /// Watched key and its version at watch time
    watched: Vec<(String, u64)>,
    pending: Vec<WriteOp>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.inner.lock().get_str(key)
    }

    async fn exists(&mut self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().values.contains_key(key))
    }

    async fn smembers(&mut self, key: &str) -> Result<BTreeSet<String>> {
        self.inner.lock().members(key)
    }

    fn queue(&mut self, op: WriteOp) {
        self.pending.push(op);
    }

    fn pending(&self) -> &[WriteOp] {
        &self.pending
    }

    async fn commit(&mut self) -> Result<()> {
        let ops = std::mem::take(&mut self.pending);
        let mut inner = self.inner.lock();

        let changed: Vec<String> = self
            .watched
            .iter()
            .filter(|(key, version)| inner.version(key) != *version)
            .map(|(key, _)| key.clone())
            .collect();
        if !changed.is_empty() {
            debug!("Transaction aborted, watched keys changed: {:?}", changed);
            return Err(Error::TransactionAborted { keys: changed });
        }

        inner.apply(&ops)
    }
}

// =============================================================================
// Tests
// =============================================================================
