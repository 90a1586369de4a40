use serde::Deserialize;
use thiserror::Error;

/// XRPC error code the server sends when the access token has expired.
const EXPIRED_TOKEN: &str = "ExpiredToken";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session is not active, log in first")]
    Inactive,

    /// The server answered with a non-success status.
    #[error("HTTP error {status}: {message}")]
    Xrpc {
        status: u16,
        error: Option<String>,
        message: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    /// True when retrying after a token refresh could succeed.
    pub fn is_expired_token(&self) -> bool {
        match self {
            ApiError::Xrpc {
                error: Some(code), ..
            } => code.contains(EXPIRED_TOKEN),
            _ => false,
        }
    }

    /// Build an error from a failed response's status and raw body.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let parsed: XrpcErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .or_else(|| parsed.error.clone())
            .unwrap_or_else(|| format!("request failed with status {}", status));

        ApiError::Xrpc {
            status,
            error: parsed.error,
            message,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct XrpcErrorBody {
    error: Option<String>,
    message: Option<String>,
}
