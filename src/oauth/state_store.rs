use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use super::OAuthState;
use crate::error::AuthError;
use crate::store::lock;

/// Server-side store of pending authorization requests
///
/// Correctness rests on key uniqueness: inserting an existing nonce fails and `take` removes
/// the record, so a nonce can be consumed at most once.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the nonce already exists or the store fails
    async fn put(&self, state: OAuthState) -> Result<(), AuthError>;

    /// Remove and return the state for `nonce`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails
    async fn take(&self, nonce: &str) -> Result<Option<OAuthState>, AuthError>;
}

#[derive(Default)]
pub struct InMemoryStateStore {
    states: Mutex<HashMap<String, OAuthState>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.states).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn put(&self, state: OAuthState) -> Result<(), AuthError> {
        let mut states = lock(&self.states);

        // Abandoned flows never reach the callback
        let now = Utc::now();
        states.retain(|_, s| !s.is_expired_at(now));

        if states.contains_key(&state.nonce) {
            return Err(AuthError::Internal("duplicate OAuth state nonce".into()));
        }
        states.insert(state.nonce.clone(), state);
        Ok(())
    }

    async fn take(&self, nonce: &str) -> Result<Option<OAuthState>, AuthError> {
        Ok(lock(&self.states).remove(nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn state(nonce: &str, ttl: Duration) -> OAuthState {
        let now = Utc::now();
        OAuthState {
            nonce: nonce.into(),
            user_id: "user-1".into(),
            session_id: "session-1".into(),
            provider: "google".into(),
            code_verifier: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[tokio::test]
    async fn test_take_consumes_once() {
        let store = InMemoryStateStore::default();
        store.put(state("n1", Duration::minutes(10))).await.unwrap();

        assert!(store.take("n1").await.unwrap().is_some());
        assert!(store.take("n1").await.unwrap().is_none());
        assert!(store.take("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_nonce_rejected() {
        let store = InMemoryStateStore::default();
        store.put(state("n1", Duration::minutes(10))).await.unwrap();
        assert!(store.put(state("n1", Duration::minutes(10))).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_states_pruned_on_put() {
        let store = InMemoryStateStore::default();
        store.put(state("old", Duration::seconds(-1))).await.unwrap();
        store.put(state("new", Duration::minutes(10))).await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.take("old").await.unwrap().is_none());
    }
}
