//! Error taxonomy shared by the client engine.

use thiserror::Error;

/// API error type for client-side use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    /// Remote-unavailable class: transport failures, gateway outages, and a
    /// missing backend schema all degrade to the local fallback path.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Http { status, body } => {
                matches!(status, 502 | 503 | 504)
                    || body.contains("PGRST205")
                    || body.contains("does not exist")
            }
            ApiError::Deserialize(_) => false,
        }
    }

    /// Transient-overload class, retried by the AI caller.
    pub fn is_overloaded(&self) -> bool {
        match self {
            ApiError::Http { status, body } => *status == 503 || body.contains("overloaded"),
            ApiError::Network(msg) => msg.contains("503") || msg.contains("overloaded"),
            ApiError::Deserialize(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_schema_counts_as_unavailable() {
        let err = ApiError::Http {
            status: 404,
            body: r#"{"code":"PGRST205","message":"Could not find the table"}"#.to_string(),
        };
        assert!(err.is_unavailable());
        assert!(!err.is_overloaded());
    }

    #[test]
    fn overload_is_not_conflated_with_plain_client_errors() {
        let overloaded = ApiError::Http { status: 503, body: "overloaded".to_string() };
        assert!(overloaded.is_overloaded());

        let denied = ApiError::Http { status: 401, body: "bad token".to_string() };
        assert!(!denied.is_overloaded());
        assert!(!denied.is_unavailable());
    }
}
