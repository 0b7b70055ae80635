use chrono::{DateTime, Utc};

use crate::{statement::UserId, store::StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn into_user(self, id: UserId, created_at: DateTime<Utc>) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            created_at,
        }
    }
}

/// Lookup of registered users. Emails are unique and compared exactly.
pub trait UserDirectory: Send + Sync {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::EmailTaken`] when the email is already registered.
    fn create(&self, user: NewUser) -> Result<User, StoreError>;
}
