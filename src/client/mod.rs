//! Client-side session keep-alive
//!
//! - [`scheduler`] - periodic and idle-triggered refresh with single-flight semantics
//! - [`refresher`] - `SessionRefresher` backed by `POST /refresh`
//! - [`error`] - refresh and scheduler lifecycle errors

pub mod error;
pub mod refresher;
pub mod scheduler;

pub use error::{RefreshError, SchedulerError, SchedulerResult};
pub use refresher::HttpSessionRefresher;
pub use scheduler::{
    RefreshOutcome, RefreshScheduler, RefreshSchedulerConfig, SchedulerState, SessionRefresher,
};
