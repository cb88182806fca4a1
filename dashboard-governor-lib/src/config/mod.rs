mod downstream;
mod governor;
mod loader;
mod optimizer;
mod root;
mod telemetry;
mod timeout;
mod validator;

pub use downstream::{DownstreamConfig, IdentityConfig, RuntimeConfig};
pub use governor::GovernorConfig;
pub use loader::{load_from_path, load_from_str};
pub use optimizer::OptimizerConfig;
pub use root::Config;
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use timeout::TimeoutConfig;
pub use validator::validate;
