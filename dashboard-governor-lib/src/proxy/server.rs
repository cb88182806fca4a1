use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::proxy::connection::ConnectionGuard;
use crate::proxy::handler::{handle_request, ProxyState};
use crate::telemetry::metrics::values;

/// Accept loop of the governed front server
///
/// Stops accepting when `shutdown` is cancelled, then waits up to
/// `shutdown_timeout` for in-flight connections to finish.
pub async fn run(
    listener: TcpListener,
    state: Arc<ProxyState>,
    shutdown_timeout: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    let builder = ConnBuilder::new(TokioExecutor::new());
    let active_connections = Arc::new(AtomicUsize::new(0));

    info!(?addr, downstream = state.pool.address(), "starting dashboard governor");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                if let Some(m) = &state.metrics {
                    m.connections_total.add(1, &[]);
                }
                let guard = ConnectionGuard::new(
                    active_connections.clone(),
                    state.metrics.as_ref().map(|m| m.connections_active.clone()),
                );

                let builder = builder.clone();
                let metrics = state.metrics.clone();
                let state = state.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let state = state.clone();
                        async move { Ok::<_, hyper::Error>(handle_request(req, &state).await) }
                    });

                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "serve_connection error");
                        if let Some(m) = &metrics {
                            m.record_error(values::ERROR_CONNECTION);
                        }
                    }
                });
            }
        }
    }

    info!(
        "Waiting for active connections to finish (timeout: {}s)",
        shutdown_timeout.as_secs()
    );
    let start = Instant::now();

    loop {
        let active = active_connections.load(Ordering::Relaxed);
        if active == 0 {
            info!("All connections closed, shutdown complete");
            break;
        }

        if start.elapsed() >= shutdown_timeout {
            warn!(active_connections = active, "Shutdown timeout reached, {active} connections still active");
            break;
        }

        sleep(Duration::from_millis(100)).await;
    }

    info!("Dashboard governor stopped");
    Ok(())
}
