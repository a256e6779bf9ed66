//! kallax binary entry point.

use clap::Parser;
use kallax::{app, telemetry, Config, DnsServer, DockerClient};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// DNS service discovery for Docker Swarm.
#[derive(Parser, Debug)]
#[command(name = "kallax")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Missing files are ignored.
    #[arg(short, long, default_value = "kallax.toml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Docker Engine API URL, overrides `docker.host`.
    #[arg(long)]
    docker: Option<String>,
}

/// Resolve once SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()).required(false))
        .add_source(
            config::Environment::with_prefix("KALLAX")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    if args.debug {
        config.telemetry.debug = true;
    }
    if let Some(host) = args.docker {
        config.docker.host = host;
    }
    config.validate()?;

    // Initialize telemetry
    telemetry::init_tracing(&config.telemetry)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        base_domain = %config.dns.base_domain,
        docker_host = %config.docker.host,
        "Starting kallax"
    );

    let docker = Arc::new(DockerClient::new(&config.docker)?);
    let socket = DnsServer::bind(config.dns.listen_addr).await?;

    // Setup graceful shutdown
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("received SIGINT / SIGTERM, shutting down");
            shutdown.cancel();
        }
    });

    if let Err(e) = app::serve(config, docker, socket, shutdown).await {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("kallax shutdown complete");
    Ok(())
}
