//! Unmanaged Racks Plugin
//!
//! Serves rack groups and racks for a Redfish aggregation plane, backed by
//! Redis (or an in-memory store in standalone mode).

use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use unmanaged_racks_plugin::{
    ApiServer, ApiServerConfig, Error, HttpRedfishClient, KvStoreRef, MemoryStore, Plugin,
    PluginConfig, RedisStore, Result,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Unmanaged Racks Plugin - rack groups and racks for Redfish aggregation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, env = "PLUGIN_CONFIG_FILE_PATH")]
    config: Option<String>,

    /// Redis address (host:port or redis:// URL)
    #[arg(long, env = "REDIS_ADDRESS")]
    redis_address: Option<String>,

    /// Upstream Redfish service URL
    #[arg(long, env = "ODIM_URL")]
    odim_url: Option<String>,

    /// Upstream user name
    #[arg(long, env = "ODIM_USERNAME")]
    odim_username: Option<String>,

    /// Upstream password
    #[arg(long, env = "ODIM_PASSWORD", hide_env_values = true)]
    odim_password: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides LogLevel from the file
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Run on the in-memory store (no Redis)
    #[arg(long, env = "STANDALONE")]
    standalone: bool,

    /// Metrics bind address; metrics are not served when unset
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PluginConfig::load(path)?,
        None => PluginConfig::default(),
    };
    apply_overrides(&mut config, &args);

    init_logging(&config.log_level, args.log_json)?;

    info!("Starting Unmanaged Racks Plugin");
    info!("  Version: {}", unmanaged_racks_plugin::VERSION);
    info!("  Firmware version: {}", config.firmware_version);
    info!("  Upstream: {}", config.odim_url);
    info!("  Standalone mode: {}", args.standalone);

    config.validate(args.standalone)?;

    let store: KvStoreRef = if args.standalone {
        info!("Using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let store = RedisStore::connect(&config.redis_address).await?;
        Arc::new(store)
    };

    let transport = Arc::new(HttpRedfishClient::new(&config)?);
    let shutdown = CancellationToken::new();
    let api_config = ApiServerConfig {
        rest_addr: config.listen_addr(),
        metrics_addr: args.metrics_addr.clone(),
        ..Default::default()
    };

    let plugin = Arc::new(Plugin::new(config, store, transport, shutdown.clone())?);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        signal_token.cancel();
    });

    ApiServer::new(api_config, plugin).run().await?;

    info!("Plugin shutdown complete");
    Ok(())
}

fn apply_overrides(config: &mut PluginConfig, args: &Args) {
    if let Some(address) = &args.redis_address {
        config.redis_address = address.clone();
    }
    if let Some(url) = &args.odim_url {
        config.odim_url = url.clone();
    }
    if let Some(username) = &args.odim_username {
        config.odim_user_name = username.clone();
    }
    if let Some(password) = &args.odim_password {
        config.odim_password = password.clone();
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "tower=warn", "axum=info", "redis=warn"] {
        let directive = directive
            .parse::<tracing_subscriber::filter::Directive>()
            .map_err(|e| Error::Configuration(format!("Invalid log directive {}: {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}
