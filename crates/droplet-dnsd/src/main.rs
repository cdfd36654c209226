// # droplet-dnsd - droplet-dns Daemon
//
// This daemon is a thin integration layer; all resolution and caching logic
// lives in droplet-dns-core.
//
// The droplet-dnsd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering inventory providers
// 4. Loading the inventory once, then serving DNS until a signal arrives
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Provider
// - `DROPLET_DNS_PROVIDER`: Provider type (digitalocean)
// - `DROPLET_DNS_TOKEN`: API token (falls back to `DO_KEY`)
// - `DROPLET_DNS_API_URL`: API base URL
// - `DROPLET_DNS_PAGE_SIZE`: Instances per listing page (1-200)
// - `DROPLET_DNS_FETCH_TIMEOUT_SECS`: Deadline for one full inventory fetch
// - `DROPLET_DNS_REFRESH_INTERVAL_SECS`: Seconds between refreshes
//
// ### DNS
// - `DROPLET_DNS_DOMAIN`: Zone suffix answered (default `droplet-lb.`)
// - `DROPLET_DNS_TTL`: TTL of answer records
// - `DROPLET_DNS_PRIVATE`: Answer with private addresses when true
// - `DROPLET_DNS_BIND`: UDP listen address (default `127.0.0.1:8053`)
// - `DROPLET_DNS_ADDRESS_ERROR_POLICY`: abort or skip
//
// ### Logging
// - `DROPLET_DNS_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export DO_KEY=your_token
// export DROPLET_DNS_BIND=0.0.0.0:53
//
// droplet-dnsd
// dig @127.0.0.1 -p 53 web.droplet-lb. A
// ```

use anyhow::{Context, Result};
use droplet_dns_core::{
    AddressErrorPolicy, AddressFamily, DnsServer, Inventory, ServiceConfig, SourceRegistry,
};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long the server gets to stop after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Startup failure (initial fetch, bind) or runtime error
/// - 2: Missing credential or invalid configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Startup failure or runtime error
    Failure = 1,
    /// Configuration error
    ConfigError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    service: ServiceConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = lookup("DROPLET_DNS_TOKEN")
            .filter(|t| !t.is_empty())
            .or_else(|| lookup("DO_KEY"))
            .filter(|t| !t.is_empty())
            .context(
                "DROPLET_DNS_TOKEN (or DO_KEY) is required. \
                Set it via: export DO_KEY=your_token",
            )?;

        let mut service = ServiceConfig::new(api_token);

        if let Some(provider) = lookup("DROPLET_DNS_PROVIDER") {
            service.provider = provider;
        }
        if let Some(url) = lookup("DROPLET_DNS_API_URL") {
            service.api_base_url = url;
        }
        if let Some(zone) = lookup("DROPLET_DNS_DOMAIN") {
            service.zone = zone;
        }
        if let Some(ttl) = parse_var(&lookup, "DROPLET_DNS_TTL")? {
            service.ttl = ttl;
        }
        if let Some(private) = parse_var::<bool, _>(&lookup, "DROPLET_DNS_PRIVATE")? {
            service.address_family = if private {
                AddressFamily::Private
            } else {
                AddressFamily::Public
            };
        }
        if let Some(bind) = parse_var(&lookup, "DROPLET_DNS_BIND")? {
            service.bind_address = bind;
        }
        if let Some(secs) = parse_var(&lookup, "DROPLET_DNS_REFRESH_INTERVAL_SECS")? {
            service.refresh_interval_secs = secs;
        }
        if let Some(secs) = parse_var(&lookup, "DROPLET_DNS_FETCH_TIMEOUT_SECS")? {
            service.fetch_timeout_secs = secs;
        }
        if let Some(size) = parse_var(&lookup, "DROPLET_DNS_PAGE_SIZE")? {
            service.page_size = size;
        }
        if let Some(policy) = lookup("DROPLET_DNS_ADDRESS_ERROR_POLICY") {
            service.address_error_policy = AddressErrorPolicy::from_str(&policy)?;
        }

        Ok(Self {
            service,
            log_level: lookup("DROPLET_DNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.service.validate()?;
        log_level(&self.log_level)?;
        Ok(())
    }
}

/// Parse an optional variable, failing on values that do not parse
fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
    }
}

/// Map a log level name to a tracing level
fn log_level(name: &str) -> Result<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DROPLET_DNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            name
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    let level = log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::Failure.into();
    }

    info!("Starting droplet-dnsd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::Failure.into();
        }
    };

    rt.block_on(run_daemon(config.service)).into()
}

/// Run the daemon until a shutdown signal
async fn run_daemon(config: ServiceConfig) -> DaemonExitCode {
    let registry = SourceRegistry::new();

    #[cfg(feature = "digitalocean")]
    {
        info!("Registering DigitalOcean inventory source");
        droplet_dns_provider_digitalocean::register(&registry);
    }

    run_with_registry(&registry, config).await
}

/// Build the inventory from the registry, serve, and map the outcome to an exit code
async fn run_with_registry(registry: &SourceRegistry, config: ServiceConfig) -> DaemonExitCode {
    let source = match registry.create_source(&config) {
        Ok(source) => source,
        Err(e) => {
            error!(
                "Failed to create inventory source '{}': {}. Registered: {:?}",
                config.provider,
                e,
                registry.list_sources()
            );
            return DaemonExitCode::ConfigError;
        }
    };

    let inventory = Arc::new(Inventory::new(source, &config));
    info!(provider = inventory.source_name(), "Fetching initial inventory");
    if let Err(e) = inventory.refresh().await {
        error!("Initial inventory fetch failed: {}", e);
        return DaemonExitCode::Failure;
    }

    let (server, mut events) = match DnsServer::bind(Arc::clone(&inventory), &config).await {
        Ok(bound) => bound,
        Err(e) => {
            error!("Failed to bind {}: {}", config.bind_address, e);
            return DaemonExitCode::Failure;
        }
    };

    // Drain events so the bounded channel never fills
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Server event");
        }
    });

    info!(
        "Starting DNS server on {} for zone {} ({} droplets, {} addresses)",
        server.local_addr(),
        server.handler().zone(),
        inventory.len(),
        config.address_family
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mut server_task =
        tokio::spawn(async move { server.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::select! {
        signal = wait_for_shutdown() => {
            match signal {
                Ok(name) => info!("Received shutdown signal: {}", name),
                Err(e) => {
                    error!("Shutdown error: {}", e);
                    return DaemonExitCode::Failure;
                }
            }
        }
        result = &mut server_task => {
            error!("DNS server exited unexpectedly: {:?}", result);
            return DaemonExitCode::Failure;
        }
    }

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task).await {
        Ok(Ok(Ok(()))) => {
            info!("Shutting down daemon");
            DaemonExitCode::CleanShutdown
        }
        Ok(Ok(Err(e))) => {
            error!("Daemon error: {}", e);
            DaemonExitCode::Failure
        }
        Ok(Err(e)) => {
            error!("DNS server task failed: {}", e);
            DaemonExitCode::Failure
        }
        Err(_) => {
            error!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT);
            DaemonExitCode::Failure
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
