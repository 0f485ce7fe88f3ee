use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;
use crate::error::AuthError;
use crate::models::User;

/// Read-only view of the application's user records
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user; `Ok(None)` means the user does not exist (any more)
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be reached
    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError>;
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn insert(&self, user: User) {
        lock(&self.users).insert(user.id.clone(), user);
    }

    pub fn remove(&self, user_id: &str) -> Option<User> {
        lock(&self.users).remove(user_id)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        Ok(lock(&self.users).get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup() {
        let directory = InMemoryUserDirectory::default();
        directory.insert(User {
            id: "user-1".into(),
            email: Some("ada@example.com".into()),
            name: None,
        });

        let user = directory.get_user_by_id("user-1").await.unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert!(directory.get_user_by_id("user-2").await.unwrap().is_none());

        directory.remove("user-1");
        assert!(directory.get_user_by_id("user-1").await.unwrap().is_none());
    }
}
