use actix_web::{web, HttpRequest, HttpResponse};

use crate::pwa::{InstallSignals, PwaDetector};
use crate::session::SessionManager;
use crate::utils::responses::ResponseBuilder;

/// `GET /pwa/install-state`
///
/// Works with or without a session; without one, reinstallation is never inferred.
pub async fn install_state(
    req: HttpRequest,
    signals: web::Query<InstallSignals>,
    sessions: web::Data<SessionManager>,
    detector: web::Data<PwaDetector>,
) -> HttpResponse {
    let identity = sessions.resolve_identity(&req);
    let state = detector.detect(&signals, identity.as_ref()).await;
    ResponseBuilder::ok().json(&state)
}

#[cfg(test)]
mod tests {
    use crate::testing::{RequestBuilder, TestServices};
    use actix_web::{test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_first_install_is_not_reinstall() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;
        let session = services.sign_in("user-2").await;

        let req = RequestBuilder::get("/pwa/install-state?display_mode=standalone&install_marker=false")
            .with_session(&services.sessions, &session)
            .build()
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["is_pwa"], true);
        assert_eq!(body["is_pwa_reinstallation"], false);
        assert!(body["notice"].is_null());
    }

    #[actix_web::test]
    async fn test_reinstall_detected_for_known_user() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;
        // Earlier install: its session is in the history but its cookie is gone
        services.sign_in("user-1").await;
        let session = services.sign_in("user-1").await;

        let req = RequestBuilder::get("/pwa/install-state?display_mode=standalone&install_marker=false")
            .with_session(&services.sessions, &session)
            .build()
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["is_pwa"], true);
        assert_eq!(body["is_pwa_reinstallation"], true);
        assert_eq!(body["notice"]["auto_hide_ms"], 5000);
        assert_eq!(body["requires_reauthentication"], false);
    }

    #[actix_web::test]
    async fn test_marker_or_browser_context_is_not_reinstall() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;
        let session = services.sign_in("user-1").await;

        for uri in [
            "/pwa/install-state?display_mode=standalone&install_marker=true",
            "/pwa/install-state?display_mode=browser",
        ] {
            let req = RequestBuilder::get(uri)
                .with_session(&services.sessions, &session)
                .build()
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["is_pwa_reinstallation"], false, "{uri}");
            assert!(body["notice"].is_null());
        }
    }

    #[actix_web::test]
    async fn test_anonymous_request() {
        let services = TestServices::new("https://oauth.example.test");
        let app = test::init_service(App::new().configure(|cfg| services.configure(cfg))).await;

        let req = RequestBuilder::get("/pwa/install-state?source=pwa")
            .build()
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["is_pwa"], true);
        assert_eq!(body["is_pwa_reinstallation"], false);
    }
}
