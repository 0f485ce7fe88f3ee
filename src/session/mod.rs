//! Session Management Module
//!
//! # Modules
//!
//! - [`manager`] - Session issue, verification and refresh
//! - [`cookie`] - Host-aware cookie scoping
//! - [`csrf`] - Anti-forgery tokens bound to a session

pub mod cookie;
pub mod csrf;
pub mod manager;

// Re-export commonly used items for convenience
pub use cookie::{CookieManager, CookieOptions, CookieSpec, HostClass};
pub use csrf::{CsrfToken, CsrfTokens};
pub use manager::SessionManager;
