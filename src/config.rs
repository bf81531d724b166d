//! Plugin Configuration
//!
//! `PluginConfig` is read from a YAML file with PascalCase keys, then
//! selectively overridden from the command line / environment before
//! being validated once at startup.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Sections
// =============================================================================

/// String substitutions applied to URIs crossing the plugin boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTranslation {
    /// Applied to responses and events flowing towards the plugin
    #[serde(rename = "NorthBoundURL", default)]
    pub north_bound: BTreeMap<String, String>,
    /// Applied to requests sent to the upstream service
    #[serde(rename = "SouthBoundURL", default)]
    pub south_bound: BTreeMap<String, String>,
}

impl UrlTranslation {
    /// ODIM's standard `redfish` <-> `ODIM` rewrite
    pub fn odim() -> Self {
        Self {
            north_bound: BTreeMap::from([("redfish".to_string(), "ODIM".to_string())]),
            south_bound: BTreeMap::from([("ODIM".to_string(), "redfish".to_string())]),
        }
    }
}

/// Subscription keep-alive timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SubscriptionConfig {
    /// Delay between subscription attempts while not subscribed
    pub retry_interval_secs: u64,
    /// Delay between task monitor polls
    pub monitor_poll_interval_millis: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            retry_interval_secs: 15,
            monitor_poll_interval_millis: 1000,
        }
    }
}

impl SubscriptionConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn monitor_poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_poll_interval_millis)
    }
}

/// Bounded retry of optimistic transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TransactionConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff_millis: u64,
    pub max_backoff_millis: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_millis: 10,
            max_backoff_millis: 200,
        }
    }
}

// =============================================================================
// Plugin Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PluginConfig {
    pub host: String,
    pub port: String,
    #[serde(rename = "RootServiceUUID")]
    pub root_service_uuid: String,
    #[serde(rename = "OdimURL")]
    pub odim_url: String,
    pub odim_user_name: String,
    pub odim_password: String,
    pub firmware_version: String,
    pub log_level: String,
    pub redis_address: String,
    #[serde(rename = "URLTranslation")]
    pub url_translation: UrlTranslation,

    /// Prefix of every plugin route except the event sink
    pub base_path: String,
    /// Route of the inbound event sink
    pub event_destination_path: String,
    /// Full destination URL announced upstream, when the plugin sits behind a proxy
    pub event_destination: Option<String>,
    /// Upstream collections an asset must belong to before it can be racked
    pub inventory_collections: Vec<String>,
    pub subscription: SubscriptionConfig,
    pub transaction: TransactionConfig,
    pub upstream_timeout_secs: u64,
    pub insecure_skip_verify: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: "45003".to_string(),
            root_service_uuid: String::new(),
            odim_url: String::new(),
            odim_user_name: String::new(),
            odim_password: String::new(),
            firmware_version: "1.0".to_string(),
            log_level: "info".to_string(),
            redis_address: String::new(),
            url_translation: UrlTranslation::odim(),
            base_path: "/ODIM/v1".to_string(),
            event_destination_path: "/EventService/Events".to_string(),
            event_destination: None,
            inventory_collections: vec![
                "/redfish/v1/Chassis".to_string(),
                "/redfish/v1/Systems".to_string(),
            ],
            subscription: SubscriptionConfig::default(),
            transaction: TransactionConfig::default(),
            upstream_timeout_secs: 30,
            insecure_skip_verify: false,
        }
    }
}

impl PluginConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Check the configuration is usable
    ///
    /// `standalone` skips checks on collaborators the plugin does not use
    /// when running on the in-memory store.
    pub fn validate(&self, standalone: bool) -> Result<()> {
        if self.odim_url.is_empty() {
            return Err(Error::Configuration("OdimURL has to be specified".into()));
        }
        reqwest::Url::parse(&self.odim_url).map_err(|e| {
            Error::Configuration(format!("OdimURL {} is not a correct URL: {}", self.odim_url, e))
        })?;
        uuid::Uuid::parse_str(&self.root_service_uuid).map_err(|e| {
            Error::Configuration(format!(
                "RootServiceUUID {:?} is not a valid UUID: {}",
                self.root_service_uuid, e
            ))
        })?;
        if self.firmware_version.is_empty() {
            return Err(Error::Configuration("FirmwareVersion has to be specified".into()));
        }
        if self.host.is_empty() {
            return Err(Error::Configuration("Host has to be specified".into()));
        }
        self.port.parse::<u16>().map_err(|e| {
            Error::Configuration(format!("Port {:?} is not a valid port: {}", self.port, e))
        })?;
        if !standalone && self.redis_address.is_empty() {
            return Err(Error::Configuration("RedisAddress has to be specified".into()));
        }
        if self.transaction.max_attempts == 0 {
            return Err(Error::Configuration(
                "Transaction.MaxAttempts must be at least 1".into(),
            ));
        }
        if !self.base_path.starts_with('/') || self.base_path.ends_with('/') {
            return Err(Error::Configuration(format!(
                "BasePath {:?} must start with '/' and not end with one",
                self.base_path
            )));
        }
        if !self.event_destination_path.starts_with('/') {
            return Err(Error::Configuration(format!(
                "EventDestinationPath {:?} must start with '/'",
                self.event_destination_path
            )));
        }
        Ok(())
    }

    /// Address the REST server binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Oid of the plugin's own manager resource
    pub fn manager_oid(&self) -> String {
        format!("{}/Managers/{}", self.base_path, self.root_service_uuid)
    }

    /// URL the upstream event service delivers events to
    pub fn event_destination(&self) -> String {
        match &self.event_destination {
            Some(destination) => destination.clone(),
            None => format!(
                "https://{}:{}{}",
                self.host, self.port, self.event_destination_path
            ),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
