//! Upstream event handling
//!
//! The reconciler repairs the containment index when the upstream
//! inventory reports removed systems; the keep-alive makes sure the
//! upstream event service keeps delivering those reports.

pub mod reconciler;
pub mod subscriber;

pub use reconciler::{EventReconciler, ReconcileReport, ReconcilerState};
pub use subscriber::{SubscriptionKeepAlive, SubscriptionState, SUBSCRIPTIONS_URI};
