// HTTP request handlers
pub mod connect;
pub mod extractors;
pub mod health;
pub mod pwa;
pub mod session;

pub use connect::{connect_provider, disconnect_provider, oauth_callback};
pub use extractors::CsrfProtected;
pub use health::health;
pub use pwa::install_state;
pub use session::{csrf_token, logout, refresh_session};

use actix_web::{web, HttpRequest};

/// Register every route on an app or scope
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg
        // Session lifecycle
        .route("/refresh", web::post().to(refresh_session))
        .route("/logout", web::post().to(logout))
        .route("/csrf-token", web::get().to(csrf_token))
        // Account linking
        .route("/connect/{provider}", web::get().to(connect_provider))
        .route("/connect/{provider}", web::delete().to(disconnect_provider))
        .route("/callback", web::get().to(oauth_callback))
        // Installed-app context
        .route("/pwa/install-state", web::get().to(install_state))
        .route("/ping", web::get().to(health));
}

/// Host the browser addressed, as seen through any forwarding proxy
pub(crate) fn request_host(req: &HttpRequest) -> String {
    req.connection_info().host().to_string()
}
