use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::error::{GovernorError, Result};
use crate::governor::RequestGovernor;

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Build a response with a fully buffered body.
pub(crate) fn buffered_response(
    status: StatusCode,
    content_type: &str,
    body: Vec<u8>,
) -> Result<Response<RespBody>> {
    let body = Full::new(Bytes::from(body)).map_err(|never| match never {}).boxed();

    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, content_type)
        .body(body)
        .map_err(|e| GovernorError::Http(format!("Failed to build response: {e}")))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<RespBody>> {
    let body = serde_json::to_vec(body)
        .map_err(|e| GovernorError::Http(format!("Failed to serialize response: {e}")))?;
    buffered_response(status, "application/json", body)
}

/// Health check response - always returns 200 if process is running
pub fn health_check_response() -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, &json!({"status": "healthy"}))
}

/// Readiness check - the governor would currently admit dashboard traffic
///
/// Returns 503 while memory utilization is above the overload threshold.
/// A failing probe does not make the service unready, matching admission.
pub fn ready_check_response(governor: &RequestGovernor) -> Result<Response<RespBody>> {
    let threshold = governor.config().overload_memory_percent;
    match governor.memory_probe().memory_percent() {
        Ok(percent) if percent > threshold => json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &json!({
                "status": "not_ready",
                "reason": "memory_overloaded",
                "memory_usage": percent,
            }),
        ),
        _ => json_response(StatusCode::OK, &json!({"status": "ready"})),
    }
}

/// Liveness check - always returns 200 if process is running
pub fn live_check_response() -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, &json!({"status": "alive"}))
}

/// Point-in-time view of the governor's per-key and memory metrics
pub fn governor_snapshot_response(governor: &RequestGovernor) -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, &governor.snapshot())
}
