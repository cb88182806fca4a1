use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use prometheus::{Encoder, Registry, TextEncoder};

use super::health::buffered_response;
use crate::error::{GovernorError, Result};

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Prometheus text exposition of every instrument in `registry`.
pub fn handle_metrics(registry: &Registry) -> Result<Response<RespBody>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| GovernorError::Http(format!("Failed to encode metrics: {e}")))?;

    buffered_response(StatusCode::OK, encoder.format_type(), buffer)
}
