pub mod client_pool;
pub mod connection;
pub mod forwarding;
pub mod handler;
pub mod http_result;
pub mod identity;
pub mod server;
pub mod synthetic_response;

pub use client_pool::ClientPool;
pub use handler::{handle_request, ProxyState};
pub use http_result::HttpError;
pub use identity::{HeaderIdentity, IdentityProvider};
pub use server::run;
