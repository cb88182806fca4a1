use arc_swap::ArcSwap;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::DownstreamConfig;
use crate::error::Result;
use crate::optimizer::IdlePool;

pub type HttpClient = Client<HttpConnector, Incoming>;

/// Shared HTTP/1.1 client pool for downstream connections
///
/// hyper keeps idle connections inside the client and only closes them after
/// `pool_idle_timeout`. To release them on demand the pool swaps in a fresh
/// client; in-flight requests keep their handle to the old one, and its idle
/// connections are closed once the last handle is dropped.
pub struct ClientPool {
    name: String,
    client: ArcSwap<HttpClient>,
    config: DownstreamConfig,
    generation: AtomicU64,
}

impl ClientPool {
    pub fn new(config: DownstreamConfig) -> Self {
        let client = Self::create_client(&config);
        Self {
            name: format!("downstream:{}", config.address),
            client: ArcSwap::from_pointee(client),
            config,
            generation: AtomicU64::new(0),
        }
    }

    fn create_client(config: &DownstreamConfig) -> HttpClient {
        let connector = HttpConnector::new();

        let mut builder = Client::builder(TokioExecutor::new());
        builder.pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs));

        if config.pool_max_idle_per_host > 0 {
            builder.pool_max_idle_per_host(config.pool_max_idle_per_host);
        }

        builder.build(connector)
    }

    /// Current pooled client
    pub fn client(&self) -> Arc<HttpClient> {
        self.client.load_full()
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// How many times the pool has been rebuilt
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}

impl IdlePool for ClientPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn reclaim_idle(&self) -> Result<()> {
        self.client.store(Arc::new(Self::create_client(&self.config)));
        let generation = self.generation.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        debug!(pool = %self.name, generation, "Downstream client pool rebuilt");
        Ok(())
    }
}
