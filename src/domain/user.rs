use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of a user account
pub type UserId = u64;

/// Registered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier assigned by the store
    pub id: UserId,
    /// Address used to log in, unique across all accounts
    pub email: String,
    /// Display name
    pub name: String,
    /// PHC formatted password hash, never leaves the user service
    #[serde(skip)]
    pub password_hash: String,
    #[allow(missing_docs)]
    pub created_at: DateTime<Utc>,
    #[allow(missing_docs)]
    pub updated_at: DateTime<Utc>,
}

/// Account that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Address used to log in
    pub email: String,
    /// Display name
    pub name: String,
    /// PHC formatted password hash
    pub password_hash: String,
}

/// Authenticated session of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token identifying the session
    pub id: String,
    /// Owner of the session
    pub user_id: UserId,
    #[allow(missing_docs)]
    pub created_at: DateTime<Utc>,
    /// Point in time after which the session is no longer valid
    pub expires_at: DateTime<Utc>,
}

/// Parameters of the [`register`](super::Action::Register) action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[allow(missing_docs)]
    pub email: String,
    #[allow(missing_docs)]
    pub password: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub name: String,
}

/// Parameters of the [`login`](super::Action::Login) action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[allow(missing_docs)]
    pub email: String,
    #[allow(missing_docs)]
    pub password: String,
}

/// Parameters of the [`get_profile`](super::Action::GetProfile) and [`logout`](super::Action::Logout) actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Token handed out on login
    pub token: String,
}

/// Result of a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[allow(missing_docs)]
    pub user: User,
    #[allow(missing_docs)]
    pub message: String,
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[allow(missing_docs)]
    pub session: Session,
    /// Same as the session id, to be passed as bearer token
    pub token: String,
    #[allow(missing_docs)]
    pub message: String,
}

/// Result of a profile lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[allow(missing_docs)]
    pub user: User,
}

/// Result of a logout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    #[allow(missing_docs)]
    pub message: String,
}
