use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("invalid response: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Builds the error for a non-success response from its status and raw body.
    ///
    /// The server reports failures as `{"error": "..."}`; any other body falls
    /// back to the status line's reason phrase.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized { message }
        } else {
            ApiError::Status { status, message }
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Transport(err) => err.to_string(),
            ApiError::Unauthorized { message } | ApiError::Status { message, .. } => {
                message.clone()
            }
            ApiError::Decode { message } => format!("invalid response: {}", message),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("token storage: {0}")]
    Storage(#[from] std::io::Error),

    #[error("keyring: {0}")]
    Keyring(#[from] keyring::Error),
}

#[derive(Debug, Error)]
pub enum UpsellError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("checkout session did not include a redirect url")]
    MissingUrl,

    #[error("could not open browser: {0}")]
    Browser(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_message_is_used() {
        let err = ApiError::from_response(StatusCode::NOT_FOUND, r#"{"error":"task not found"}"#);
        assert_eq!(err.message(), "task not found");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_non_json_body_falls_back_to_status_text() {
        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, "<html>upstream</html>");
        assert_eq!(err.message(), "Bad Gateway");
    }

    #[test]
    fn test_json_without_error_field_falls_back_to_status_text() {
        let err = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail":"x"}"#);
        assert_eq!(err.message(), "Internal Server Error");
    }

    #[test]
    fn test_unauthorized_is_tagged() {
        let err = ApiError::from_response(StatusCode::UNAUTHORIZED, r#"{"error":"invalid token"}"#);
        assert!(err.is_unauthorized());
        assert_eq!(err.message(), "invalid token");
    }
}
