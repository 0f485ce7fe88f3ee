// Session lifecycle handlers: refresh, logout and CSRF token issuance
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::request_host;
use crate::error::AuthError;
use crate::session::SessionManager;
use crate::utils::responses::ResponseBuilder;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// `POST /refresh`
///
/// Reissues the current session with a new validity window. A 401 tells the client to treat
/// the session as gone and clears the cookie with the attributes it was set with.
pub async fn refresh_session(
    req: HttpRequest,
    sessions: web::Data<SessionManager>,
) -> HttpResponse {
    let host = request_host(&req);

    let result = match sessions.session_token(&req) {
        Some(token) => sessions.refresh(&token).await,
        None => Err(AuthError::Unauthenticated),
    };

    match result {
        Ok(session) => match sessions.session_cookie(&session, &host) {
            Ok(cookie) => ResponseBuilder::ok().with_cookie(cookie).json(&RefreshResponse {
                issued_at: session.issued_at(),
                expires_at: session.expires_at(),
            }),
            Err(e) => e.error_response(),
        },
        Err(AuthError::Unauthenticated) => {
            log::info!("Refresh rejected; clearing session cookie for {host}");
            let mut response = ResponseBuilder::unauthorized();
            if let Ok(clear) = sessions.clear_session_cookie(&host) {
                response = response.with_cookie(clear);
            }
            response.build()
        }
        Err(e) => {
            log::warn!("Session refresh failed: {e}");
            e.error_response()
        }
    }
}

/// `POST /logout`
///
/// # Errors
///
/// Returns `AuthError::UnsupportedHost` if the cookie scope for the host cannot be computed
pub async fn logout(
    req: HttpRequest,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AuthError> {
    let host = request_host(&req);
    let clear = sessions.clear_session_cookie(&host)?;

    if let Some(identity) = sessions.resolve_identity(&req) {
        log::info!(
            "User {} signed out (session {})",
            identity.user_id,
            identity.session_id
        );
    }

    Ok(ResponseBuilder::ok()
        .with_cookie(clear)
        .json(&serde_json::json!({ "logged_out": true })))
}

/// `GET /csrf-token`
///
/// # Errors
///
/// Returns `AuthError::Unauthenticated` without a valid session
pub async fn csrf_token(
    req: HttpRequest,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AuthError> {
    let identity = sessions.require_identity(&req)?;
    let token = sessions.issue_csrf(&identity);
    Ok(ResponseBuilder::ok().json(&token))
}

#[cfg(test)]
mod tests {
    use crate::testing::{RequestBuilder, TestServices};
    use actix_web::cookie::time::OffsetDateTime;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use serde_json::Value;

    fn set_cookie_headers(resp: &actix_web::dev::ServiceResponse) -> Vec<String> {
        resp.headers()
            .get_all(header::SET_COOKIE)
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    #[actix_web::test]
    async fn test_refresh_sets_new_cookie() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;
        let session = services.sign_in("user-1").await;

        let req = RequestBuilder::post("/refresh")
            .host("www.example.com")
            .with_session(&services.sessions, &session)
            .build()
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let cookies = set_cookie_headers(&resp);
        assert_eq!(cookies.len(), 1);
        let cookie = actix_web::cookie::Cookie::parse(cookies[0].clone()).unwrap();
        assert_eq!(cookie.name(), "continuity_session");
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));

        let refreshed = services.sessions.verify(cookie.value()).unwrap();
        assert_eq!(refreshed.session_id, session.session_id());

        let body: Value = test::read_body_json(resp).await;
        assert!(body["issued_at"].is_string());
        assert!(body["expires_at"].is_string());
    }

    #[actix_web::test]
    async fn test_refresh_without_session_clears_cookie() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;

        let req = RequestBuilder::post("/refresh")
            .with_cookie(actix_web::cookie::Cookie::new("continuity_session", "garbage"))
            .build()
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let cookies = set_cookie_headers(&resp);
        assert_eq!(cookies.len(), 1);
        let cleared = actix_web::cookie::Cookie::parse(cookies[0].clone()).unwrap();
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.domain(), Some("example.com"));
        assert_eq!(cleared.max_age(), Some(actix_web::cookie::time::Duration::ZERO));
        assert!(cleared
            .expires_datetime()
            .is_some_and(|at| at < OffsetDateTime::now_utc()));
    }

    #[actix_web::test]
    async fn test_refresh_for_deleted_user_is_unauthorized() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;
        let session = services.sign_in("user-2").await;
        services.connect.users.remove("user-2");

        let req = RequestBuilder::post("/refresh")
            .with_session(&services.sessions, &session)
            .build()
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_logout_on_loopback_host_has_no_domain() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;
        let session = services.sign_in("user-1").await;

        let req = RequestBuilder::post("/logout")
            .host("localhost:3000")
            .with_session(&services.sessions, &session)
            .build()
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let cookies = set_cookie_headers(&resp);
        let cleared = actix_web::cookie::Cookie::parse(cookies[0].clone()).unwrap();
        assert_eq!(cleared.name(), "continuity_session");
        assert_eq!(cleared.domain(), None);
        assert_eq!(cleared.path(), Some("/"));
        assert_eq!(cleared.max_age(), Some(actix_web::cookie::time::Duration::ZERO));
    }

    #[actix_web::test]
    async fn test_logout_on_foreign_host_is_rejected() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;

        let req = RequestBuilder::post("/logout")
            .host("evil.test")
            .build()
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_csrf_token_requires_session() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;

        let resp = test::call_service(&app, RequestBuilder::get("/csrf-token").build().to_request())
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let session = services.sign_in("user-1").await;
        let req = RequestBuilder::get("/csrf-token")
            .with_session(&services.sessions, &session)
            .build()
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        let token = body["token"].as_str().unwrap();
        let identity = crate::models::UserIdentity::from(&session.claims);
        assert!(services.sessions.validate_csrf(&identity, Some(token)).is_ok());
        assert!(body.get("session_id").is_none());
    }
}
