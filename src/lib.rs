//! Unmanaged Racks Plugin
//!
//! A Redfish plugin that lets operators model rack groups and racks that no
//! BMC reports, and attach existing compute systems or chassis to those
//! racks. The containment graph lives in a shared key-value store and is
//! kept consistent with upstream inventory through resource-removal events.
//!
//! # Architecture
//!
//! ```text
//!         REST (axum)                     Event sink
//!   Chassis CRUD / Managers / Status    POST {EventDestinationPath}
//!              |                                 |
//!       ChassisService                    EventReconciler
//!    (validation + transactions)         (detach removed assets)
//!              |                                 |
//!              +---------------+-----------------+
//!                              |
//!                     Dao (optimistic, retried)
//!                              |
//!                  KvStore: RedisStore | MemoryStore
//!
//!   SubscriptionKeepAlive --POST/poll--> upstream EventService
//!   InventoryClient       --GET-------> upstream Chassis / Systems
//! ```
//!
//! # Modules
//!
//! - [`api`]: REST router and server
//! - [`chassis`]: rack group / rack CRUD
//! - [`events`]: event reconciliation and subscription keep-alive
//! - [`store`]: key schema, DAO and store backends
//! - [`redfish`]: Redfish messages, validation and the upstream client
//! - [`domain`]: resource models and ports

pub mod api;
pub mod chassis;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod plugin;
pub mod redfish;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, RestRouter};
pub use chassis::ChassisService;
pub use config::PluginConfig;
pub use domain::chassis::{Chassis, ChassisType};
pub use domain::ports::{KvStore, KvStoreRef, RedfishTransport, RedfishTransportRef};
pub use error::{Error, Result};
pub use events::{EventReconciler, SubscriptionKeepAlive, SubscriptionState};
pub use metrics::PluginMetrics;
pub use plugin::Plugin;
pub use redfish::HttpRedfishClient;
pub use store::{Dao, MemoryStore, RedisStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Plugin name
pub const NAME: &str = "unmanaged-racks-plugin";
