use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use std::sync::Arc;
use tracing::error;

use crate::governor::RequestGovernor;
use crate::proxy::client_pool::ClientPool;
use crate::proxy::forwarding::forward;
use crate::proxy::identity::IdentityProvider;
use crate::proxy::synthetic_response::synthetic_error_response;
use crate::telemetry::Metrics;

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Everything a connection task needs to serve requests
pub struct ProxyState {
    pub governor: Arc<RequestGovernor>,
    pub identity: Arc<dyn IdentityProvider>,
    pub pool: Arc<ClientPool>,
    pub metrics: Option<Arc<Metrics>>,
}

/// Govern a request and forward it downstream when admitted
///
/// Downstream failures were already recorded by the governor; here they are
/// turned into the usual synthetic error response.
pub async fn handle_request(req: Request<Incoming>, state: &ProxyState) -> Response<RespBody> {
    let user = state.identity.identify(req.headers());
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let result = state
        .governor
        .govern(req, user, |req| forward(req, &state.pool))
        .await;

    match result {
        Ok(resp) => resp,
        Err(e) => {
            error!(%method, path, error = %e, "Downstream request failed");
            if let Some(m) = &state.metrics {
                m.record_error(e.error_type());
            }
            synthetic_error_response(StatusCode::from(e))
        }
    }
}
