//! Shared testing utilities
//!
//! Compiled for unit tests and for integration tests through the `testing` feature.
//!
//! - [`fixtures`] - pre-built settings, identities, linked accounts and service harnesses
//! - [`requests`] - request builder for driving handlers through `actix_web::test`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use continuity::testing::{RequestBuilder, TestServices};
//!
//! let services = TestServices::new("https://oauth.example.test");
//! let app = actix_web::test::init_service(
//!     actix_web::App::new().configure(|cfg| services.configure(cfg)),
//! )
//! .await;
//! let session = services.sign_in("user-1").await;
//! let req = RequestBuilder::post("/refresh")
//!     .with_session(&services.sessions, &session)
//!     .build()
//!     .to_request();
//! ```

pub mod fixtures;
pub mod requests;

pub use fixtures::{ConnectHarness, TestFixtures, TestServices};
pub use requests::RequestBuilder;

/// Common test constants
pub mod constants {
    /// Host under the registrable test domain
    pub const TEST_HOST: &str = "app.example.com";

    /// Registrable domain the test cookie manager scopes cookies to
    pub const TEST_REGISTRABLE_DOMAIN: &str = "example.com";

    /// Public suffix that only gets host-only cookies
    pub const TEST_HOST_ONLY_SUFFIX: &str = "vercel.app";

    /// Test session secret (at least 32 bytes)
    pub const TEST_SESSION_SECRET: &str = "test_session_secret_32_bytes_long_for_tests";

    /// Users present in the test user directory
    pub const TEST_USERS: &[&str] = &["user-1", "user-2"];

    /// Provider registered by the connect harness
    pub const TEST_PROVIDER: &str = "google";
}
