use http::{Request, Response};
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::{Bytes, Incoming};
use tokio::time::Instant;
use tracing::debug;

use crate::proxy::client_pool::ClientPool;
use crate::proxy::http_result::{HttpError, HttpResult};

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Rewrite the request URI to target `address`, keeping path and query.
pub fn downstream_uri(address: &str, req_uri: &http::Uri) -> HttpResult<http::Uri> {
    let pq = req_uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("http://{address}{pq}")
        .parse::<http::Uri>()
        .map_err(|e| HttpError::InvalidUri(e.to_string()))
}

/// Forward a request to the downstream dashboard service through the shared pool
pub async fn forward(req: Request<Incoming>, pool: &ClientPool) -> HttpResult<Response<RespBody>> {
    let start = Instant::now();
    let (mut parts, body) = req.into_parts();
    parts.uri = downstream_uri(pool.address(), &parts.uri)?;
    // The downstream pool speaks HTTP/1.1 only
    parts.version = http::Version::HTTP_11;

    let client = pool.client();
    match client.request(Request::from_parts(parts, body)).await {
        Ok(resp) => {
            debug!(
                status = resp.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis(),
                "Downstream response"
            );
            Ok(resp.map(|b| b.boxed()))
        }
        Err(e) => Err(HttpError::FailedToGetResponseFromDownstream(e.to_string())),
    }
}
