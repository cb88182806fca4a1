#![forbid(unsafe_code)]

use clap::Parser;
use dashboard_governor_lib::config::{load_from_path, Config};
use dashboard_governor_lib::telemetry::{
    init_metrics, init_tracing_with_otel, start_observability_server,
};
use dashboard_governor_lib::{
    run, ClientPool, ConnectionPoolOptimizer, HeaderIdentity, ProxyState, RequestGovernor,
    SystemMemoryProbe,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Admission control and prioritization for dashboard APIs")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", env = "DASHBOARD_GOVERNOR_CONFIG")]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing_with_otel(&cfg.logging, &cfg.telemetry) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cfg.runtime.max_workers)
        .thread_name("dashboard-api")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            error!(%err, "failed to build runtime");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(serve(cfg)) {
        error!(%err, "dashboard governor exited with error");
        std::process::exit(1);
    }
}

async fn serve(cfg: Config) -> Result<(), BoxError> {
    info!(
        listen = ?cfg.listen,
        downstream = %cfg.downstream.address,
        workers = cfg.runtime.max_workers,
        "configuration loaded"
    );

    let (metrics, registry) = init_metrics()?;

    let governor = Arc::new(
        RequestGovernor::new(cfg.governor.clone(), Arc::new(SystemMemoryProbe::new()))
            .with_metrics(metrics.clone()),
    );
    let pool = Arc::new(ClientPool::new(cfg.downstream.clone()));
    let identity = Arc::new(HeaderIdentity::new(&cfg.identity.header)?);

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    if let Some(port) = cfg.telemetry.metrics_port {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        let governor = governor.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) =
                start_observability_server(listener, registry, governor, shutdown).await
            {
                warn!(error = %e, "observability server exited with error");
            }
        });
    }

    let optimizer = Arc::new(
        ConnectionPoolOptimizer::new(cfg.optimizer.clone(), governor.clone())
            .with_pool(pool.clone())
            .with_metrics(metrics.clone()),
    )
    .spawn();

    let state = Arc::new(ProxyState { governor, identity, pool, metrics: Some(metrics) });
    let listener = TcpListener::bind(cfg.listen).await?;
    let result = run(
        listener,
        state,
        Duration::from_secs(cfg.timeout.shutdown_secs),
        shutdown.clone(),
    )
    .await;

    shutdown.cancel();
    optimizer.shutdown().await?;
    result?;
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to setup SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Received SIGINT, initiating graceful shutdown"),
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGINT");
                return;
            }
        },
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}
