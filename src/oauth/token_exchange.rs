// Authorization code exchange against a provider token endpoint
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::AuthError;
use crate::oauth::providers::OAuthProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// `None` when the provider omits `expires_in` or sends one out of range
    #[must_use]
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
    }
}

/// RFC 6749 section 5.2 error body
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Exchange an authorization code for tokens
///
/// # Errors
///
/// - `AuthError::InvalidGrant` when the provider rejects the code (reused or expired)
/// - `AuthError::ProviderError` for network failures and any other upstream error
pub async fn exchange_code(
    client: &reqwest::Client,
    provider: &OAuthProvider,
    code: &str,
    redirect_uri: &str,
    code_verifier: Option<&str>,
) -> Result<TokenResponse, AuthError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "authorization_code");
    params.insert("code", code);
    params.insert("redirect_uri", redirect_uri);
    params.insert("client_id", provider.client_id.as_str());
    params.insert("client_secret", provider.client_secret.as_str());
    if let Some(verifier) = code_verifier {
        params.insert("code_verifier", verifier);
    }

    log::debug!("Exchanging authorization code with {}", provider.name);
    let response = client
        .post(&provider.token_endpoint)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&params)
        .send()
        .await
        .map_err(|e| AuthError::ProviderError(format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_token_error(status, &body));
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::ProviderError(format!("invalid token response: {e}")))?;

    log::info!(
        "Token exchange with {} succeeded (access token {} chars, refresh token {})",
        provider.name,
        tokens.access_token.len(),
        if tokens.refresh_token.is_some() {
            "present"
        } else {
            "absent"
        }
    );
    Ok(tokens)
}

fn classify_token_error(status: StatusCode, body: &str) -> AuthError {
    let parsed = serde_json::from_str::<TokenErrorResponse>(body).ok();

    match parsed {
        Some(err)
            if err.error == "invalid_grant"
                && matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) =>
        {
            log::warn!(
                "Authorization code rejected: {}",
                err.error_description.as_deref().unwrap_or("invalid_grant")
            );
            AuthError::InvalidGrant
        }
        Some(err) => {
            AuthError::ProviderError(format!("token endpoint returned {status}: {}", err.error))
        }
        None => AuthError::ProviderError(format!("token endpoint returned {status}")),
    }
}
