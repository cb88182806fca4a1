use http::StatusCode;
use thiserror::Error;

/// HTTP result type, T is typically a hyper::Response
/// HttpError is used to generate a synthetic error response
pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// Describes things that can go wrong while forwarding to the downstream service
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Failed to get response from downstream: {0}")]
    FailedToGetResponseFromDownstream(String),
}

impl HttpError {
    pub fn error_type(&self) -> &'static str {
        match self {
            HttpError::InvalidUri(_) => "invalid_uri",
            HttpError::FailedToGetResponseFromDownstream(_) => "downstream_unreachable",
        }
    }
}

impl From<HttpError> for StatusCode {
    fn from(e: HttpError) -> StatusCode {
        match e {
            HttpError::InvalidUri(_) => StatusCode::BAD_REQUEST,
            HttpError::FailedToGetResponseFromDownstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_types_and_statuses() {
        let invalid = HttpError::InvalidUri("bad host".into());
        let unreachable = HttpError::FailedToGetResponseFromDownstream("refused".into());

        assert_eq!(invalid.error_type(), "invalid_uri");
        assert_eq!(unreachable.error_type(), "downstream_unreachable");
        assert_eq!(StatusCode::from(invalid), StatusCode::BAD_REQUEST);
        assert_eq!(StatusCode::from(unreachable), StatusCode::BAD_GATEWAY);
    }
}
