//! Account linking handlers
//!
//! `GET /connect/{provider}` starts the flow, the provider redirects the browser back to
//! `GET /callback`, and `DELETE /connect/{provider}` unlinks. The callback always answers with
//! a redirect into the application, carrying either `connected=<provider>` or `error=<code>`.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use super::extractors::CsrfProtected;
use crate::error::AuthError;
use crate::oauth::{ConnectFlow, OAuthCallback};
use crate::session::SessionManager;
use crate::settings::AppSettings;
use crate::utils::responses::ResponseBuilder;

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub provider: String,
    pub disconnected: bool,
}

/// `GET /connect/{provider}`
///
/// # Errors
///
/// - `AuthError::Unauthenticated` (401) without a session
/// - `AuthError::UnsupportedProvider` (400) for unknown providers
pub async fn connect_provider(
    req: HttpRequest,
    provider: web::Path<String>,
    sessions: web::Data<SessionManager>,
    flow: web::Data<ConnectFlow>,
) -> Result<HttpResponse, AuthError> {
    let identity = sessions.resolve_identity(&req);
    let authorization_url = flow.initiate(identity.as_ref(), &provider).await?;

    log::info!("Redirecting to {provider} for account linking");
    Ok(ResponseBuilder::redirect(&authorization_url).build())
}

/// `GET /callback`
pub async fn oauth_callback(
    req: HttpRequest,
    query: web::Query<OAuthCallback>,
    sessions: web::Data<SessionManager>,
    flow: web::Data<ConnectFlow>,
    settings: web::Data<AppSettings>,
) -> HttpResponse {
    let identity = sessions.resolve_identity(&req);

    match flow.callback(identity.as_ref(), &query).await {
        Ok(linked) => {
            log::info!(
                "Linked {} for user {}",
                linked.provider,
                linked.account.user_id
            );
            ResponseBuilder::redirect(&settings.oauth.success_path)
                .with_query("connected", &linked.provider)
                .build()
        }
        Err(e) => {
            log::debug!("OAuth callback redirecting with error flag {}", e.code());
            ResponseBuilder::redirect(&settings.oauth.error_path)
                .with_error(e.code())
                .build()
        }
    }
}

/// `DELETE /connect/{provider}`
///
/// # Errors
///
/// - `AuthError::Unauthenticated` (401) without a session
/// - `AuthError::CsrfMismatch` (403) without a valid CSRF token
/// - `AuthError::UnsupportedProvider` (400) for unknown providers
pub async fn disconnect_provider(
    csrf: CsrfProtected,
    provider: web::Path<String>,
    flow: web::Data<ConnectFlow>,
) -> Result<HttpResponse, AuthError> {
    let identity = csrf.into_inner();
    let provider = provider.into_inner();
    let disconnected = flow.disconnect(Some(&identity), &provider).await?;

    Ok(ResponseBuilder::ok().json(&DisconnectResponse {
        provider,
        disconnected,
    }))
}
