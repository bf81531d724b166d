//! Redfish protocol support
//!
//! Error bodies and registry messages, the request validation framework,
//! URL translation and the southbound HTTP client.

pub mod client;
pub mod messages;
pub mod translation;
pub mod validation;

pub use client::{HttpRedfishClient, InventoryClient};
pub use messages::{CommonError, MsgExtendedInfo};
pub use translation::UrlTranslator;
pub use validation::{Rule, Validator, Violation};
