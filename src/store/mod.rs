//! Persistence seams consumed by the session and OAuth components
//!
//! Each store is an async trait so a database-backed implementation can replace the in-memory
//! one used by the binary and tests.

pub mod accounts;
pub mod users;

pub use accounts::{InMemoryLinkedAccountStore, LinkedAccountStore};
pub use users::{InMemoryUserDirectory, UserDirectory};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a store mutex, recovering the data if a writer panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
