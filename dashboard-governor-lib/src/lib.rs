#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod governor;
pub mod optimizer;
pub mod proxy;
pub mod telemetry;

pub use config::{load_from_path, load_from_str, Config, GovernorConfig, OptimizerConfig};
pub use error::{GovernorError, Result};
pub use governor::{
    Endpoint, MemoryProbe, Outcome, Rejection, RequestGovernor, RequestMetadata,
    SystemMemoryProbe, UserId,
};
pub use optimizer::{ConnectionPoolOptimizer, IdlePool, OptimizerHandle};
pub use proxy::{run, ClientPool, HeaderIdentity, IdentityProvider, ProxyState};
