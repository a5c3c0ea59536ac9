//! Client error types

use medicat_core::CoreError;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request, usually a validation failure
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Credential store failure
    #[error("Credential storage error: {0}")]
    Storage(#[from] CoreError),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// HTTP status of the failed response, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(err) => err.status().map(|status| status.as_u16()),
            Self::ServerError { status, .. } => Some(*status),
            Self::AuthenticationFailed(_) => Some(401),
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Forbidden(_) => Some(403),
            Self::Serialization(_) | Self::Configuration(_) | Self::Storage(_) => None,
        }
    }

    /// Whether the error means the access credential was rejected
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_codes_map_to_variants() {
        let unauthorized = ClientError::from_status(StatusCode::UNAUTHORIZED, "expired".into());
        assert!(unauthorized.is_auth_expired());
        assert_eq!(unauthorized.status(), Some(401));

        assert!(matches!(
            ClientError::from_status(StatusCode::NOT_FOUND, "gone".into()),
            ClientError::NotFound(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::CONFLICT, "duplicate".into()),
            ClientError::ServerError { status: 409, .. }
        ));
        assert_eq!(
            ClientError::Configuration("bad".into()).status(),
            None
        );
    }
}
