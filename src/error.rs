//! Error taxonomy shared by every component
//!
//! `AuthError` is the boundary error for sessions, cookies, CSRF and the OAuth connect flow.
//! It renders as a JSON error body through `ResponseError`; the OAuth callback handler turns
//! it into a redirect flag instead, since the browser is mid-navigation there.

use crate::utils::responses::ResponseBuilder;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No session, or the session token is unsigned, tampered or expired
    #[error("authentication required")]
    Unauthenticated,

    /// Refresh could not reach the session store; retry on the next cycle
    #[error("session refresh temporarily unavailable: {0}")]
    SessionExpiredTransient(String),

    /// CSRF token missing, expired or bound to another session
    #[error("CSRF token mismatch")]
    CsrfMismatch,

    /// OAuth state nonce unknown, expired, already consumed or owned by another session
    #[error("OAuth state validation failed")]
    StateValidationFailed,

    /// Authorization code rejected by the provider (reused or expired)
    #[error("authorization grant rejected by provider")]
    InvalidGrant,

    /// Provider reported an error or the token endpoint failed
    #[error("OAuth provider error: {0}")]
    ProviderError(String),

    #[error("unsupported OAuth provider: {0}")]
    UnsupportedProvider(String),

    #[error("unsupported host: {0}")]
    UnsupportedHost(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable snake_case code used in JSON bodies and redirect error flags
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::SessionExpiredTransient(_) => "session_refresh_unavailable",
            Self::CsrfMismatch => "csrf_mismatch",
            Self::StateValidationFailed => "state_validation_failed",
            Self::InvalidGrant => "invalid_grant",
            Self::ProviderError(_) => "provider_error",
            Self::UnsupportedProvider(_) => "unsupported_provider",
            Self::UnsupportedHost(_) => "unsupported_host",
            Self::Internal(_) => "server_error",
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::SessionExpiredTransient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::CsrfMismatch => StatusCode::FORBIDDEN,
            Self::StateValidationFailed
            | Self::InvalidGrant
            | Self::UnsupportedProvider(_)
            | Self::UnsupportedHost(_) => StatusCode::BAD_REQUEST,
            Self::ProviderError(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal details stay in the logs
        let message = match self {
            Self::Internal(_) => "An internal server error occurred".to_string(),
            Self::ProviderError(_) => "The OAuth provider request failed".to_string(),
            other => other.to_string(),
        };
        ResponseBuilder::error(self.status_code())
            .with_error_code(self.code())
            .with_message(&message)
            .build()
    }
}
