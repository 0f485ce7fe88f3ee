use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;
use crate::error::AuthError;
use crate::models::LinkedAccount;

/// Linked third-party accounts, keyed by (`user_id`, `provider`)
#[async_trait]
pub trait LinkedAccountStore: Send + Sync {
    /// Insert or replace the link for (`user_id`, `provider`)
    ///
    /// A missing refresh token in `account` keeps the stored one. Returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written
    async fn upsert(&self, account: LinkedAccount) -> Result<LinkedAccount, AuthError>;

    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read
    async fn get(&self, user_id: &str, provider: &str) -> Result<Option<LinkedAccount>, AuthError>;

    /// Remove a link; returns whether one existed
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written
    async fn remove(&self, user_id: &str, provider: &str) -> Result<bool, AuthError>;
}

#[derive(Default)]
pub struct InMemoryLinkedAccountStore {
    accounts: Mutex<HashMap<(String, String), LinkedAccount>>,
}

impl InMemoryLinkedAccountStore {
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.accounts).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LinkedAccountStore for InMemoryLinkedAccountStore {
    async fn upsert(&self, account: LinkedAccount) -> Result<LinkedAccount, AuthError> {
        let key = (account.user_id.clone(), account.provider.clone());
        let mut accounts = lock(&self.accounts);
        let merged = account.merged_with(accounts.get(&key));
        accounts.insert(key, merged.clone());
        Ok(merged)
    }

    async fn get(&self, user_id: &str, provider: &str) -> Result<Option<LinkedAccount>, AuthError> {
        Ok(lock(&self.accounts)
            .get(&(user_id.to_string(), provider.to_string()))
            .cloned())
    }

    async fn remove(&self, user_id: &str, provider: &str) -> Result<bool, AuthError> {
        Ok(lock(&self.accounts)
            .remove(&(user_id.to_string(), provider.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestFixtures;

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = InMemoryLinkedAccountStore::default();
        let account = TestFixtures::linked_account("user-1", "google", Some("refresh-1"));

        store.upsert(account.clone()).await.unwrap();
        store.upsert(account.clone()).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("user-1", "google").await.unwrap(),
            Some(account)
        );
    }

    #[tokio::test]
    async fn test_relink_without_refresh_token_keeps_stored_one() {
        let store = InMemoryLinkedAccountStore::default();
        store
            .upsert(TestFixtures::linked_account("user-1", "google", Some("refresh-1")))
            .await
            .unwrap();

        let mut relink = TestFixtures::linked_account("user-1", "google", None);
        relink.access_token = "access-2".into();
        let stored = store.upsert(relink).await.unwrap();

        assert_eq!(stored.access_token, "access-2");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_links_are_per_user_and_provider() {
        let store = InMemoryLinkedAccountStore::default();
        store
            .upsert(TestFixtures::linked_account("user-1", "google", None))
            .await
            .unwrap();
        store
            .upsert(TestFixtures::linked_account("user-2", "google", None))
            .await
            .unwrap();
        store
            .upsert(TestFixtures::linked_account("user-1", "microsoft", None))
            .await
            .unwrap();
        assert_eq!(store.len(), 3);

        assert!(store.remove("user-1", "google").await.unwrap());
        assert!(!store.remove("user-1", "google").await.unwrap());
        assert!(store.get("user-2", "google").await.unwrap().is_some());
    }
}
