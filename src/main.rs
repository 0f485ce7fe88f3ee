#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use continuity::{
    configure_services,
    oauth::{ConnectFlow, InMemoryStateStore},
    pwa::{InMemoryDeviceHistory, PwaDetector},
    session::SessionManager,
    settings::AppSettings,
    store::{InMemoryLinkedAccountStore, InMemoryUserDirectory},
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = AppSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    start_server(settings).await
}

/// Wire the stores and services, then serve until shutdown
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(settings: AppSettings) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let users = Arc::new(InMemoryUserDirectory::default());
    let device_history = Arc::new(InMemoryDeviceHistory::default());
    let session_manager = SessionManager::from_settings(&settings)
        .with_user_directory(users.clone())
        .with_device_history(device_history.clone());
    let connect_flow = web::Data::new(ConnectFlow::from_settings(
        &settings,
        Arc::new(InMemoryStateStore::default()),
        Arc::new(InMemoryLinkedAccountStore::default()),
        users,
    ));
    let pwa_detector = PwaDetector::new(device_history, &settings.pwa);

    // Credentialed CORS for the application's own origins
    let cors_origins = settings.get_cors_origins();
    let csrf_header = settings.csrf.header_name.clone();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Content-Type", "Accept", csrf_header.as_str()])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(settings.clone()))
            .app_data(web::Data::new(session_manager.clone()))
            .app_data(connect_flow.clone())
            .app_data(web::Data::new(pwa_detector.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &AppSettings) {
    println!("Starting Continuity session service on http://{bind_address}");
    println!();
    println!("Session endpoints:");
    println!("  POST   /refresh            - Reissue the session cookie");
    println!("  POST   /logout             - Clear the session cookie");
    println!("  GET    /csrf-token         - CSRF token bound to the current session");
    println!();
    println!("Account linking endpoints:");
    println!("  GET    /connect/{{provider}} - Start linking a provider");
    println!("  DELETE /connect/{{provider}} - Unlink a provider (CSRF protected)");
    println!("  GET    /callback           - OAuth redirect target");
    println!();
    println!("OAuth callback URL for providers:");
    println!("  {}", settings.redirect_uri());
    println!();
    println!("System endpoints:");
    println!("  GET    /pwa/install-state  - Installed-app context");
    println!("  GET    /ping               - Health check");
}
