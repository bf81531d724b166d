//! Persistence layer
//!
//! The key schema of the containment graph, the two `KvStore` adapters
//! (in-memory and Redis) and the typed DAO built on top of them.

pub mod dao;
pub mod keys;
pub mod memory;
pub mod redis;

pub use dao::Dao;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;
