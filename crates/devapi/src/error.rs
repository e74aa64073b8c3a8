use reqwest::StatusCode;
use thiserror::Error;

/// Failure classification feeding the orchestrator's retry policy.
#[derive(Debug, Error)]
pub enum DevApiError {
    /// Timeouts, rate-limit signals and server errors; worth retrying.
    #[error("transient api failure: {0}")]
    Transient(String),
    /// Authorization or malformed-payload failures; retrying cannot help.
    #[error("permanent api failure: {0}")]
    Permanent(String),
    /// The object already exists (HTTP 409); callers decide whether this
    /// is acceptable (it is for accounts and rev-users).
    #[error("object already exists: {0}")]
    Conflict(String),
    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

impl DevApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DevApiError::Transient(_))
    }

    pub fn from_status(status: StatusCode, context: &str) -> Self {
        if status == StatusCode::CONFLICT {
            DevApiError::Conflict(context.to_string())
        } else if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            DevApiError::Transient(format!("{context}: HTTP {status}"))
        } else {
            DevApiError::Permanent(format!("{context}: HTTP {status}"))
        }
    }

    pub fn from_reqwest(err: reqwest::Error, context: &str) -> Self {
        if err.is_timeout() || err.is_connect() {
            DevApiError::Transient(format!("{context}: {err}"))
        } else if let Some(status) = err.status() {
            Self::from_status(status, context)
        } else {
            DevApiError::Permanent(format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert!(DevApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "x").is_transient());
        assert!(DevApiError::from_status(StatusCode::BAD_GATEWAY, "x").is_transient());
        assert!(DevApiError::from_status(StatusCode::REQUEST_TIMEOUT, "x").is_transient());
    }

    #[test]
    fn auth_and_validation_errors_are_permanent() {
        assert!(!DevApiError::from_status(StatusCode::UNAUTHORIZED, "x").is_transient());
        assert!(!DevApiError::from_status(StatusCode::BAD_REQUEST, "x").is_transient());
    }

    #[test]
    fn conflict_is_its_own_class() {
        assert!(matches!(
            DevApiError::from_status(StatusCode::CONFLICT, "accounts.create"),
            DevApiError::Conflict(_)
        ));
    }
}
