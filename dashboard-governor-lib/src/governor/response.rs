use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use serde_json::json;

use super::admission::{Completion, Rejection, RequestMetadata};

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Header names written by the governor
pub mod names {
    /// Wall time of a governed request, seconds with three decimals (e.g. "0.123s")
    pub const DURATION: &str = "x-dashboard-duration";

    /// Priority assigned at admission (lower = more urgent)
    pub const PRIORITY: &str = "x-dashboard-priority";

    /// Marker present on every governed response
    pub const OPTIMIZED: &str = "x-dashboard-optimized";

    /// Set when a request ran well past its estimate
    pub const RECOMMENDATION: &str = "x-dashboard-recommendation";

    /// Canonical endpoint name, forwarded downstream
    pub const ENDPOINT: &str = "x-dashboard-endpoint";

    /// "true" when the downstream service may defer the work
    pub const ASYNC: &str = "x-dashboard-async";

    /// Estimated duration in seconds, forwarded downstream
    pub const ESTIMATED_DURATION: &str = "x-dashboard-estimated-duration";

    pub const RATE_LIMIT_LIMIT: &str = "x-rate-limit-limit";
    pub const RATE_LIMIT_REMAINING: &str = "x-rate-limit-remaining";
    pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
}

pub const RECOMMENDATION_TEXT: &str = "Consider caching or optimization";

fn full_body(bytes: impl Into<Bytes>) -> RespBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed()
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// Build the client-facing response for a rejected request.
///
/// Rate-limited requests get 429 with `{error, retry_after, endpoint}`,
/// overloaded ones 503 with `{error, retry_after, memory_usage}`.
pub fn rejection_response(rejection: &Rejection) -> Response<RespBody> {
    let body = match rejection {
        Rejection::RateLimited { endpoint, retry_after, .. } => json!({
            "error": rejection.to_string(),
            "retry_after": retry_after,
            "endpoint": endpoint,
        }),
        Rejection::Overloaded { memory_percent, retry_after } => json!({
            "error": rejection.to_string(),
            "retry_after": retry_after,
            "memory_usage": memory_percent,
        }),
    };

    let (body, content_type) = match serde_json::to_vec(&body) {
        Ok(bytes) => (full_body(bytes), "application/json"),
        Err(_) => (full_body(rejection.to_string()), "text/plain"),
    };

    let mut resp = Response::new(body);
    *resp.status_mut() = rejection.status();
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(RETRY_AFTER, HeaderValue::from(rejection.retry_after()));

    if let Rejection::RateLimited { limit, reset_after, .. } = rejection {
        headers.insert(HeaderName::from_static(names::RATE_LIMIT_LIMIT), HeaderValue::from(*limit));
        headers.insert(
            HeaderName::from_static(names::RATE_LIMIT_REMAINING),
            HeaderValue::from_static("0"),
        );
        headers.insert(
            HeaderName::from_static(names::RATE_LIMIT_RESET),
            HeaderValue::from(reset_after.as_secs()),
        );
    }

    resp
}

/// Annotate a downstream response with the outcome of a governed request.
pub fn annotate_response(headers: &mut HeaderMap, completion: &Completion) {
    insert(headers, names::DURATION, &format!("{:.3}s", completion.elapsed.as_secs_f64()));
    headers.insert(HeaderName::from_static(names::PRIORITY), HeaderValue::from(completion.priority));
    headers.insert(HeaderName::from_static(names::OPTIMIZED), HeaderValue::from_static("true"));
    if let Some(recommendation) = completion.recommendation {
        insert(headers, names::RECOMMENDATION, recommendation);
    }
}

/// Expose admission metadata to the downstream service.
pub fn apply_downstream_hints(headers: &mut HeaderMap, metadata: &RequestMetadata) {
    insert(headers, names::ENDPOINT, metadata.endpoint.as_str());
    headers.insert(HeaderName::from_static(names::PRIORITY), HeaderValue::from(metadata.priority));
    insert(headers, names::ASYNC, if metadata.should_process_async { "true" } else { "false" });
    insert(headers, names::ESTIMATED_DURATION, &format!("{:.3}", metadata.estimated_duration));
}
