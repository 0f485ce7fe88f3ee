//! Request extractors
//!
//! [`CsrfProtected`] guards state-changing routes: the request must carry a valid session and
//! a CSRF token for that same session in the configured header (`X-CSRF-Token` by default).

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};

use crate::error::AuthError;
use crate::models::UserIdentity;
use crate::session::SessionManager;
use crate::settings::AppSettings;

const DEFAULT_CSRF_HEADER: &str = "X-CSRF-Token";

/// Identity of a request that passed the CSRF check
#[derive(Debug, Clone)]
pub struct CsrfProtected(pub UserIdentity);

impl CsrfProtected {
    #[must_use]
    pub fn into_inner(self) -> UserIdentity {
        self.0
    }

    fn extract(req: &HttpRequest) -> Result<Self, AuthError> {
        let sessions = req
            .app_data::<web::Data<SessionManager>>()
            .ok_or_else(|| AuthError::Internal("session manager not configured".into()))?;
        let header_name = req
            .app_data::<web::Data<AppSettings>>()
            .map_or(DEFAULT_CSRF_HEADER, |s| s.csrf.header_name.as_str());

        let identity = sessions.require_identity(req)?;
        let token = req
            .headers()
            .get(header_name)
            .and_then(|value| value.to_str().ok());

        if let Err(e) = sessions.validate_csrf(&identity, token) {
            log::warn!(
                "CSRF check failed for {} {} (session {})",
                req.method(),
                req.path(),
                identity.session_id
            );
            return Err(e);
        }
        Ok(Self(identity))
    }
}

impl FromRequest for CsrfProtected {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::extract(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestFixtures;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    async fn signed_in() -> (SessionManager, String, UserIdentity) {
        let sessions = TestFixtures::session_manager();
        let session = sessions.issue("user-1").await.unwrap();
        let identity = UserIdentity::from(&session.claims);
        (sessions, session.token, identity)
    }

    #[actix_web::test]
    async fn test_valid_token_passes() {
        let (sessions, token, identity) = signed_in().await;
        let csrf = sessions.issue_csrf(&identity);

        let req = TestRequest::delete()
            .app_data(web::Data::new(sessions.clone()))
            .cookie(Cookie::new(sessions.cookie_name().to_string(), token))
            .insert_header((DEFAULT_CSRF_HEADER, csrf.value))
            .to_http_request();
        let extracted = CsrfProtected::extract(&req).unwrap();
        assert_eq!(extracted.into_inner(), identity);
    }

    #[actix_web::test]
    async fn test_missing_token_is_rejected() {
        let (sessions, token, _) = signed_in().await;
        let req = TestRequest::delete()
            .app_data(web::Data::new(sessions.clone()))
            .cookie(Cookie::new(sessions.cookie_name().to_string(), token))
            .to_http_request();
        assert_eq!(
            CsrfProtected::extract(&req).unwrap_err(),
            AuthError::CsrfMismatch
        );
    }

    #[actix_web::test]
    async fn test_missing_session_is_unauthenticated() {
        let (sessions, _, identity) = signed_in().await;
        let csrf = sessions.issue_csrf(&identity);
        let req = TestRequest::delete()
            .app_data(web::Data::new(sessions))
            .insert_header((DEFAULT_CSRF_HEADER, csrf.value))
            .to_http_request();
        assert_eq!(
            CsrfProtected::extract(&req).unwrap_err(),
            AuthError::Unauthenticated
        );
    }

    #[actix_web::test]
    async fn test_configured_header_name() {
        let (sessions, token, identity) = signed_in().await;
        let csrf = sessions.issue_csrf(&identity);
        let mut settings = TestFixtures::settings();
        settings.csrf.header_name = "X-Anti-Forgery".into();

        let req = TestRequest::delete()
            .app_data(web::Data::new(sessions.clone()))
            .app_data(web::Data::new(settings))
            .cookie(Cookie::new(sessions.cookie_name().to_string(), token))
            .insert_header(("X-Anti-Forgery", csrf.value))
            .to_http_request();
        assert!(CsrfProtected::extract(&req).is_ok());
    }
}
