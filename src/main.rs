//! # Hash Server Binary
//!
//! Parses configuration, sets up logging, builds the Tokio runtime and runs
//! the server until SIGINT, SIGTERM or `POST /shutdown`.
//!
//! ## Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:8080
//! hash-server
//!
//! # Custom configuration
//! hash-server --bind 127.0.0.1:9000 --log-level debug --enable-metrics
//!
//! # With environment variables
//! export HASH_SERVER_BIND_ADDR=0.0.0.0:8080
//! export LOG_LEVEL=info
//! hash-server
//! ```
//!
//! ## Exit Codes
//! - 0: Clean shutdown
//! - 1: Configuration, logging or runtime setup error
//! - 2: Critical server error
//! - 3: Other runtime error

use hash_server::{HashServer, ServerConfig, ShutdownHandle};
use std::process;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let config = ServerConfig::from_args();

    if let Err(e) = setup_logging(&config) {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    info!("Starting Hash Server v{}", hash_server::VERSION);
    info!("Configuration: {:?}", config);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e.internal_message());
        process::exit(1);
    }

    let worker_threads = config.get_worker_threads();
    info!("Using {} worker threads", worker_threads);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .thread_name("hash-server-worker")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build Tokio runtime: {}", e);
            process::exit(1);
        }
    };

    let exit_code = runtime.block_on(run(config));
    process::exit(exit_code);
}

/// Run the server to completion and map the outcome to an exit code
async fn run(config: ServerConfig) -> i32 {
    let server = match HashServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to initialize server: {}", e.internal_message());
            return 1;
        }
    };

    tokio::spawn(shutdown_on_signal(server.shutdown_handle()));

    match server.start().await {
        Ok(()) => {
            info!("Server shut down cleanly");
            0
        }
        Err(e) => {
            error!("Server error: {}", e.internal_message());
            if e.is_critical() {
                2
            } else {
                3
            }
        }
    }
}

/// Setup structured logging based on configuration
///
/// JSON output when `ENVIRONMENT=production`, pretty output otherwise.
/// `RUST_LOG` overrides the configured level.
fn setup_logging(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let is_production = std::env::var("ENVIRONMENT")
        .map(|env| env.eq_ignore_ascii_case("production"))
        .unwrap_or(false);

    let env_filter = EnvFilter::builder()
        .with_default_directive(config.log_level.inner().into())
        .from_env()?
        .add_directive("hyper=info".parse()?)
        .add_directive("tokio=info".parse()?)
        .add_directive("mio=warn".parse()?);

    if is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;

        info!("Initialized structured JSON logging for production");
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?;

        info!("Initialized pretty-printed logging for development");
    }

    Ok(())
}

/// Trigger `shutdown` on SIGINT or SIGTERM
async fn shutdown_on_signal(shutdown: ShutdownHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        },
        () = terminate => {
            info!("Received SIGTERM");
        },
    }

    shutdown.trigger();
}
