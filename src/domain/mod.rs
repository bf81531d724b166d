//! Domain layer - Resource models and port definitions
//!
//! This module defines the Redfish resource models the plugin serves and
//! the core traits (ports) that store and transport adapters implement,
//! following hexagonal architecture principles.

pub mod chassis;
pub mod events;
pub mod ports;

pub use chassis::*;
pub use events::*;
pub use ports::*;
