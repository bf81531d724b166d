//! Subscription Keep-Alive
//!
//! Registers the plugin's event sink with the upstream event service and
//! retries until the registration is confirmed:
//!
//! ```text
//! Idle -> Subscribing -> Monitoring -> Subscribed
//!             ^              |
//!             +-- Rejected <-+   (after the retry interval)
//! ```
//!
//! The loop never gives up; it only ends on success or shutdown.

use crate::config::SubscriptionConfig;
use crate::domain::events::SubscriptionRequest;
use crate::domain::ports::RedfishTransportRef;
use crate::error::Result;
use crate::metrics::PluginMetrics;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SUBSCRIPTIONS_URI: &str = "/redfish/v1/EventService/Subscriptions";

/// Name the subscription is registered under
const SUBSCRIPTION_NAME: &str = "URP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubscriptionState {
    Idle,
    Subscribing,
    Monitoring,
    Subscribed,
    Rejected,
}

impl SubscriptionState {
    /// Value exported on the `urp_subscription_state` gauge
    pub fn gauge(self) -> i64 {
        match self {
            SubscriptionState::Idle => 0,
            SubscriptionState::Subscribing => 1,
            SubscriptionState::Monitoring => 2,
            SubscriptionState::Subscribed => 3,
            SubscriptionState::Rejected => 4,
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SubscriptionState::Idle => "Idle",
            SubscriptionState::Subscribing => "Subscribing",
            SubscriptionState::Monitoring => "Monitoring",
            SubscriptionState::Subscribed => "Subscribed",
            SubscriptionState::Rejected => "Rejected",
        };
        write!(f, "{}", name)
    }
}

pub struct SubscriptionKeepAlive {
    transport: RedfishTransportRef,
    destination: String,
    config: SubscriptionConfig,
    metrics: PluginMetrics,
    state: watch::Sender<SubscriptionState>,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl SubscriptionKeepAlive {
    pub fn new(
        transport: RedfishTransportRef,
        destination: String,
        config: SubscriptionConfig,
        metrics: PluginMetrics,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Idle);
        metrics.set_subscription_state(SubscriptionState::Idle.gauge());
        Self {
            transport,
            destination,
            config,
            metrics,
            state,
            started: AtomicBool::new(false),
            cancel,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Receiver observing every state transition
    pub fn subscribe(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Spawn the keep-alive loop unless it is already running
    ///
    /// Returns whether this call started it.
    pub fn start(self: &Arc<Self>) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Subscription keep-alive already running");
            return false;
        }

        let keep_alive = Arc::clone(self);
        tokio::spawn(async move { keep_alive.run().await });
        true
    }

    async fn run(&self) {
        info!("Subscribing to upstream events for {}", self.destination);
        loop {
            if self.attempt().await {
                info!("Upstream event subscription confirmed");
                return;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Subscription keep-alive stopped");
                    return;
                }
                _ = tokio::time::sleep(self.config.retry_interval()) => {}
            }
        }
    }

    /// One subscribe-and-monitor round; true once subscribed
    async fn attempt(&self) -> bool {
        self.transition(SubscriptionState::Subscribing);
        match self.subscribe_once().await {
            Ok(true) => {
                self.transition(SubscriptionState::Subscribed);
                true
            }
            Ok(false) => {
                self.transition(SubscriptionState::Rejected);
                false
            }
            Err(e) => {
                warn!("Event subscription attempt failed: {}", e);
                self.transition(SubscriptionState::Rejected);
                false
            }
        }
    }

    async fn subscribe_once(&self) -> Result<bool> {
        let request = SubscriptionRequest::resource_removed(SUBSCRIPTION_NAME, &self.destination);
        let body = serde_json::to_value(&request)?;
        let response = self.transport.post(SUBSCRIPTIONS_URI, &body).await?;

        if response.status != 202 {
            warn!("Event subscription rejected with status {}", response.status);
            return Ok(false);
        }
        let Some(monitor) = response.location else {
            warn!("Event subscription accepted without a task monitor");
            return Ok(false);
        };

        self.transition(SubscriptionState::Monitoring);
        loop {
            let response = self.transport.get(&monitor).await?;
            match response.status {
                202 => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Ok(false),
                        _ = tokio::time::sleep(self.config.monitor_poll_interval()) => {}
                    }
                }
                200 => return Ok(true),
                409 => {
                    info!("Event subscription already exists upstream");
                    return Ok(true);
                }
                status => {
                    warn!("Event subscription task {} ended with status {}", monitor, status);
                    return Ok(false);
                }
            }
        }
    }

    fn transition(&self, next: SubscriptionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!("Subscription state {} -> {}", previous, next);
        }
        self.metrics.set_subscription_state(next.gauge());
    }
}
