//! `routemux run`: start the proxy server.
//!
//! Loads the routing config, starts the Axum HTTP server with graceful
//! shutdown, and spawns a background loop that swaps in a new routing
//! table whenever the config file changes.

use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{LogLevel, RunArgs};
use crate::config::sources::FileSource;
use crate::config::ConfigSource;
use crate::error::RoutemuxError;
use crate::logging;
use crate::proxy::forward::{ForwardOptions, Forwarder};
use crate::proxy::headers::HeaderValues;
use crate::proxy::routing::RoutingTable;
use crate::server::{self, AppState, LoadedTable};

/// Files tried, in order, when `--config` is not given.
pub const CONFIG_CANDIDATES: &[&str] = &[
    "routemux.yaml",
    "routemux.yml",
    "routemux.json",
    "routemux.toml",
    "config.yaml",
];

pub async fn execute(args: RunArgs) -> Result<(), RoutemuxError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    let level = effective_log_level(&args.log_level, std::env::var_os("DEBUG").as_deref());
    logging::init(&level, log_format);

    let source = resolve_config_source(args.config.as_deref()).await?;
    let (config, version) = source.load().await?;

    let configured_port = config.listen_port;
    let listen_port = args.port.unwrap_or(configured_port);
    let server_count = config.servers.len();
    let default_port = config.default_port;

    check_upstream_host(&args.upstream_host)?;

    let forwarder = Forwarder::new(ForwardOptions {
        upstream_host: args.upstream_host.clone(),
        timeout: Duration::from_millis(args.timeout),
        max_response_body: args.max_response_body,
        header_values: if args.forward_all_header_values {
            HeaderValues::All
        } else {
            HeaderValues::First
        },
    });

    let state = Arc::new(AppState::new(
        LoadedTable::new(RoutingTable::from_config(&config), version, source.name()),
        forwarder,
    ));

    // Shutdown signal: sending on shutdown_tx stops the refresh loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let refresh_state = state.clone();
    let poll_interval = args.poll_interval;
    let refresh_handle = tokio::spawn(async move {
        config_refresh_loop(
            refresh_state,
            source,
            configured_port,
            poll_interval,
            shutdown_rx,
        )
        .await;
    });

    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, listen_port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        servers = server_count,
        default_port,
        upstream_host = %args.upstream_host,
        "routemux started"
    );

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    // Wait for the config refresh task to finish (catches panics)
    if let Err(e) = refresh_handle.await {
        tracing::error!(error = %e, "config refresh task failed");
    }

    tracing::info!("routemux stopped");
    Ok(())
}

/// Backend targets are built from this host, so reject it before serving.
fn check_upstream_host(host: &str) -> Result<(), RoutemuxError> {
    format!("http://{host}:1/")
        .parse::<axum::http::Uri>()
        .map(|_| ())
        .map_err(|source| RoutemuxError::InvalidUpstreamHost {
            host: host.to_string(),
            source,
        })
}

/// A non-empty `DEBUG` environment variable forces debug logging.
fn effective_log_level(requested: &LogLevel, debug_env: Option<&OsStr>) -> LogLevel {
    match debug_env {
        Some(v) if !v.is_empty() => LogLevel::Debug,
        _ => requested.clone(),
    }
}

async fn resolve_config_source(
    explicit: Option<&Path>,
) -> Result<Box<dyn ConfigSource>, RoutemuxError> {
    if let Some(path) = explicit {
        return Ok(Box::new(FileSource::for_path(path)?));
    }

    for name in CONFIG_CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return Ok(Box::new(FileSource::for_path(&path)?));
        }
    }

    Err(RoutemuxError::NoConfigSource {
        hint: format!(
            "Provide --config <file> or create one of: {}.\n  \
             Run 'routemux init' to create a config file.",
            CONFIG_CANDIDATES.join(", ")
        ),
    })
}

async fn config_refresh_loop(
    state: Arc<AppState>,
    source: Box<dyn ConfigSource>,
    configured_port: u16,
    interval_secs: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("config refresh loop shutting down");
                return;
            }
        }

        let current_version = state.routes.load().version.clone();

        match source.has_changed(&current_version).await {
            Ok(true) => {
                tracing::info!(source = source.name(), "config change detected, reloading");
                match source.load().await {
                    Ok((config, version)) => {
                        if config.listen_port != configured_port {
                            tracing::warn!(
                                configured = config.listen_port,
                                previous = configured_port,
                                "listen_port changed, restart to apply"
                            );
                        }
                        let servers = config.servers.len();
                        let short = version.short().to_string();
                        let previous = state.routes.load_full();
                        server::publish(
                            &state,
                            LoadedTable::new(
                                RoutingTable::from_config(&config),
                                version,
                                source.name(),
                            ),
                        );
                        tracing::info!(
                            servers,
                            version = %short,
                            previous_source = %previous.source_name,
                            previous_age_secs = previous.loaded_at.elapsed().as_secs(),
                            "routing table reloaded"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "config reload failed, keeping current routing table");
                    }
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "config change check failed");
            }
        }
    }
}
