//! Redis Store
//!
//! `KvStore` backed by Redis. Single-key operations share one multiplexed
//! connection. Each transaction opens its own connection, because `WATCH`
//! state is per connection and must not be observed by concurrent callers;
//! buffered writes are sent as a `MULTI`/`EXEC` pipeline whose nil reply
//! means a watched key changed.

use crate::domain::ports::{KvStore, Transaction, WriteOp};
use crate::error::{Error, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Map transport failures onto `StoreUnavailable`; keep protocol errors as-is
fn store_error(err: RedisError) -> Error {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        Error::StoreUnavailable(err.to_string())
    } else {
        Error::Redis(err)
    }
}

/// Accept both `host:port` and full `redis://` URLs
pub fn redis_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    }
}

// =============================================================================
// Redis Store
// =============================================================================

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to the Redis instance at `address`
    pub async fn connect(address: &str) -> Result<Self> {
        let url = redis_url(address);
        let client = redis::Client::open(url.as_str())?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_error)?;
        info!("Connected to Redis at {}", address);
        Ok(Self { client, conn })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn().get(key).await.map_err(store_error)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().set(key, value).await.map_err(store_error)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed: i64 = self.conn().del(key).await.map_err(store_error)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.conn().exists(key).await.map_err(store_error)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.conn().keys(pattern).await.map_err(store_error)?;
        keys.sort();
        Ok(keys)
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>> {
        self.conn().smembers(key).await.map_err(store_error)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        self.conn().sadd(key, member).await.map_err(store_error)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        self.conn().srem(key, member).await.map_err(store_error)
    }

    async fn watch(&self, keys: &[String]) -> Result<Box<dyn Transaction>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_error)?;
        if !keys.is_empty() {
            redis::cmd("WATCH")
                .arg(keys)
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(store_error)?;
        }
        Ok(Box::new(RedisTransaction {
            conn,
            watched: keys.to_vec(),
            pending: Vec::new(),
        }))
    }

    async fn health_check(&self) -> Result<bool> {
        let pong: String = redis::cmd("PING")
            .query_async(&mut self.conn())
            .await
            .map_err(store_error)?;
        Ok(pong == "PONG")
    }
}

// =============================================================================
// Redis Transaction
// =============================================================================

struct RedisTransaction {
    conn: MultiplexedConnection,
    watched: Vec<String>,
    pending: Vec<WriteOp>,
}

/// Build the `MULTI`/`EXEC` pipeline for `ops`
fn pipeline(ops: &[WriteOp]) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for op in ops {
        match op {
            WriteOp::Set { key, value } => pipe.set(key, value).ignore(),
            WriteOp::SetNx { key, value } => pipe.set_nx(key, value).ignore(),
            WriteOp::Delete { key } => pipe.del(key).ignore(),
            WriteOp::SAdd { key, member } => pipe.sadd(key, member).ignore(),
            WriteOp::SRem { key, member } => pipe.srem(key, member).ignore(),
        };
    }
    pipe
}

#[async_trait]
impl Transaction for RedisTransaction {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.conn.get(key).await.map_err(store_error)
    }

    async fn exists(&mut self, key: &str) -> Result<bool> {
        self.conn.exists(key).await.map_err(store_error)
    }

    async fn smembers(&mut self, key: &str) -> Result<BTreeSet<String>> {
        self.conn.smembers(key).await.map_err(store_error)
    }

    fn queue(&mut self, op: WriteOp) {
        self.pending.push(op);
    }

    fn pending(&self) -> &[WriteOp] {
        &self.pending
    }

    async fn commit(&mut self) -> Result<()> {
        let ops = std::mem::take(&mut self.pending);
        if ops.is_empty() {
            redis::cmd("UNWATCH")
                .query_async::<_, ()>(&mut self.conn)
                .await
                .map_err(store_error)?;
            return Ok(());
        }

        let reply: Option<()> = pipeline(&ops)
            .query_async(&mut self.conn)
            .await
            .map_err(store_error)?;
        match reply {
            Some(()) => Ok(()),
            None => {
                debug!("EXEC returned nil, watched keys changed: {:?}", self.watched);
                Err(Error::TransactionAborted {
                    keys: self.watched.clone(),
                })
            }
        }
    }
}
