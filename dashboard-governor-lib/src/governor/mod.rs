pub mod admission;
pub mod endpoint;
pub mod estimator;
pub mod memory;
pub mod rate_limit;
pub mod recorder;
pub mod response;

pub use admission::{
    AdmissionGuard, Completion, GovernorSnapshot, Outcome, ReclaimStats, Rejection,
    RequestGovernor, RequestMetadata,
};
pub use endpoint::{resolve_endpoint, Endpoint, EndpointKey, UserId};
pub use estimator::{DurationEstimator, PriorityEstimator};
pub use memory::{MemoryProbe, SystemMemoryProbe};
pub use rate_limit::{RateLimitResult, RateLimiter};
pub use recorder::{MemoryTrend, MetricsRecorder, RequestSample};
