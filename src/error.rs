//! Error types for the AstroLake SDK

use thiserror::Error;

/// Main error type for the AstroLake SDK
#[derive(Error, Debug)]
pub enum AstroLakeError {
    /// No usable access token; the caller must log in first
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated, but not entitled to the requested service
    #[error("Not authorized for service '{service}': {message}")]
    Unauthorized {
        /// Audience identifier of the service that rejected the exchange
        service: String,
        /// Detail reported by the IAM
        message: String,
    },

    /// Device login polling exhausted its attempt budget
    #[error("Login timed out after {attempts} poll attempts")]
    LoginTimedOut {
        /// Number of token-endpoint polls performed before giving up
        attempts: u32,
    },

    /// The user rejected the authorization request
    #[error("Login denied: {0}")]
    LoginDenied(String),

    /// The user aborted an interactive login
    #[error("Login cancelled by user")]
    LoginCancelled,

    /// The IAM rejected a token grant or exchange.
    ///
    /// Also raised when a login is initiated while a still-valid access
    /// token exists; the IAM answers with a server error in that case and
    /// the caller must wait for the current token to expire.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Dataset metadata carries a data product type without a handler
    #[error("Unsupported data product type: {0}")]
    UnsupportedDataProductType(String),

    /// A replica URL uses a scheme the downloader cannot speak
    #[error("Unsupported access protocol: {0}")]
    UnsupportedAccessProtocol(String),

    /// The server response was missing required fields or unparseable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for AstroLake SDK operations
pub type Result<T> = std::result::Result<T, AstroLakeError>;

impl AstroLakeError {
    /// Create an unauthenticated error with a helpful message
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    /// Create an unauthenticated error pointing the caller at `login()`
    #[must_use]
    pub fn login_required() -> Self {
        Self::Unauthenticated(
            "no access token available and no refresh token to renew one; call login()"
                .to_string(),
        )
    }

    /// Create an unauthorized error for a specific service
    pub fn unauthorized(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a token exchange error
    pub fn token_exchange(msg: impl Into<String>) -> Self {
        Self::TokenExchangeFailed(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a login denied error
    pub fn login_denied(msg: impl Into<String>) -> Self {
        Self::LoginDenied(msg.into())
    }

    /// True for errors that indicate the caller holds no usable credential
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated(_))
    }
}
