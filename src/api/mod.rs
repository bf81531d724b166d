//! Northbound API
//!
//! REST endpoints served under the configured base path, plus the
//! unauthenticated event sink.

pub mod rest;
pub mod server;

pub use rest::RestRouter;
pub use server::{ApiServer, ApiServerConfig};
