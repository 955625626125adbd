use crate::domain::{NewUser, User, UserId};
use crate::library::BoxedError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Error raised by a [`UserStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// A user with the same email address exists already
    #[error("user with the same email exists")]
    Duplicate,
    /// The storage backend failed
    #[error("user storage failed")]
    Backend(#[source] BoxedError),
}

/// Persistence for user accounts
#[async_trait]
pub trait UserStore {
    /// Stores a new account and assigns its id, fails with [`StoreError::Duplicate`] if the email is taken
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Looks up an account by its email address
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Looks up an account by its id
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

/// [`UserStore`] keeping accounts in the memory of the current process
///
/// Cloning yields another handle to the same accounts.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    inner: Arc<Mutex<MemoryUsers>>,
}

#[derive(Default)]
struct MemoryUsers {
    last_id: UserId,
    users: HashMap<UserId, User>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }

        inner.last_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.last_id,
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };

        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.users.get(&id).cloned())
    }
}
