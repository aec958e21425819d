//! User lookup abstraction.
//!
//! The authorization flow only ever needs a handful of lookups, so the
//! directory is a small async trait. [`MemoryDirectory`] is the in-process
//! implementation; a database-backed one would implement the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::User;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn create(&self, user: User) -> Result<User>;
    async fn record_login(&self, id: Uuid) -> Result<()>;
    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<()>;
}

/// In-process directory backed by a `RwLock`ed map
#[derive(Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AuthError::InvalidRequest(
                "email is already registered".to_string(),
            ));
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(AuthError::InvalidRequest(
                "username is already taken".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn record_login(&self, id: Uuid) -> Result<()> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.last_login_at = Some(Utc::now());
                Ok(())
            }
            None => Err(AuthError::ServerError(format!(
                "login recorded for unknown user {id}"
            ))),
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<()> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash;
                Ok(())
            }
            None => Err(AuthError::ServerError(format!(
                "password update for unknown user {id}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::test_user;

    #[tokio::test]
    async fn test_create_and_find() {
        let directory = MemoryDirectory::new();
        let user = directory
            .create(test_user("alice@example.com", "alice"))
            .await
            .unwrap();

        let by_id = directory.find_by_id(user.id).await.unwrap();
        assert_eq!(by_id.as_ref().map(|u| u.id), Some(user.id));

        // Email lookup is case-insensitive, username lookup is exact
        let by_email = directory.find_by_email("ALICE@example.com").await.unwrap();
        assert!(by_email.is_some());
        let by_username = directory.find_by_username("Alice").await.unwrap();
        assert!(by_username.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let directory = MemoryDirectory::new();
        directory
            .create(test_user("alice@example.com", "alice"))
            .await
            .unwrap();

        let result = directory
            .create(test_user("Alice@Example.com", "alice2"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_record_login_sets_timestamp() {
        let directory = MemoryDirectory::new();
        let user = directory
            .create(test_user("alice@example.com", "alice"))
            .await
            .unwrap();
        assert!(user.last_login_at.is_none());

        directory.record_login(user.id).await.unwrap();
        let reloaded = directory.find_by_id(user.id).await.unwrap().unwrap();
        assert!(reloaded.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_update_password_replaces_hash() {
        let directory = MemoryDirectory::new();
        let user = directory
            .create(test_user("alice@example.com", "alice"))
            .await
            .unwrap();

        directory
            .update_password(user.id, "$2b$04$newhash".to_string())
            .await
            .unwrap();
        let reloaded = directory.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "$2b$04$newhash");

        let result = directory
            .update_password(Uuid::new_v4(), "$2b$04$other".to_string())
            .await;
        assert!(matches!(result, Err(AuthError::ServerError(_))));
    }

    #[tokio::test]
    async fn test_record_login_unknown_user() {
        let directory = MemoryDirectory::new();
        let result = directory.record_login(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AuthError::ServerError(_))));
    }
}
