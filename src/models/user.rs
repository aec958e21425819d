use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A user record as the external directory stores it.
///
/// The flow layer only ever reads these; the single write it may request is
/// a last-login timestamp update, delegated to the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub name: String,
    pub tags: BTreeSet<String>,
    pub is_active: bool,
    /// bcrypt PHC string; never serialized into tokens or responses
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Token claims carry tags as a plain array
    pub fn tag_list(&self) -> Vec<String> {
        self.tags.iter().cloned().collect()
    }
}

/// Payload for creating a user in the directory
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub name: String,
    pub tags: BTreeSet<String>,
    pub password_hash: String,
}

impl NewUser {
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            username: self.username,
            name: self.name,
            tags: self.tags,
            is_active: true,
            password_hash: self.password_hash,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_user(email: &str, username: &str) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        username: username.to_string(),
        name: format!("{username} Test"),
        tags: BTreeSet::from(["member".to_string()]),
        is_active: true,
        password_hash: String::new(),
        created_at: Utc::now(),
        last_login_at: None,
    }
}
