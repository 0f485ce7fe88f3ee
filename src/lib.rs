#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Session continuity and multi-domain authentication
//!
//! Keeps users signed in across the application's domains and installed-app contexts:
//! encrypted session cookies scoped to the right registrable domain, session-bound CSRF
//! tokens, an idle-aware client refresh scheduler, PWA reinstall detection and OAuth account
//! linking for third-party integrations.

/// Version of the continuity service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod client;
pub mod error;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod pwa;
pub mod session;
pub mod settings;
pub mod store;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use client::{HttpSessionRefresher, RefreshScheduler, RefreshSchedulerConfig};
pub use error::AuthError;
pub use handlers::configure_services;
pub use models::{LinkedAccount, Session, SessionClaims, UserIdentity};
pub use oauth::{ConnectFlow, ProviderRegistry};
pub use pwa::PwaDetector;
pub use session::{CookieManager, SessionManager};
pub use settings::AppSettings;
