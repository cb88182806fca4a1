use http::header::HeaderName;
use http::HeaderMap;

use crate::error::{GovernorError, Result};
use crate::governor::UserId;

/// Yields the authenticated user for a request, if any.
///
/// Authentication itself happens upstream; implementations only read the
/// identity the authentication layer attached.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, headers: &HeaderMap) -> Option<UserId>;
}

/// Reads the user id from a fixed request header
#[derive(Debug, Clone)]
pub struct HeaderIdentity {
    header: HeaderName,
}

impl HeaderIdentity {
    pub fn new(header: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| GovernorError::Config(format!("invalid identity header '{header}': {e}")))?;
        Ok(Self { header })
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl IdentityProvider for HeaderIdentity {
    fn identify(&self, headers: &HeaderMap) -> Option<UserId> {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(UserId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn reads_configured_header() {
        let identity = HeaderIdentity::new("x-user-id").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("42"));
        assert_eq!(identity.identify(&headers), Some(UserId::from("42")));
    }

    #[test]
    fn missing_or_blank_is_unauthenticated() {
        let identity = HeaderIdentity::new("x-user-id").unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(identity.identify(&headers), None);

        headers.insert("x-user-id", HeaderValue::from_static("  "));
        assert_eq!(identity.identify(&headers), None);
    }

    #[test]
    fn rejects_invalid_header_name() {
        assert!(HeaderIdentity::new("bad header").is_err());
    }
}
