use super::{SessionStore, StoreError, UserStore};
use crate::domain::{
    LoginRequest, LoginResponse, LogoutResponse, NewUser, ProfileResponse, RegisterRequest,
    RegisterResponse, Session, SessionRequest,
};
use crate::library::BoxedError;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use rand::RngCore;
use std::time::Duration;
use thiserror::Error;
use tokio::task::spawn_blocking;
use tracing::{debug, instrument};

const MIN_PASSWORD_LENGTH: usize = 8;
const SESSION_KEY_PREFIX: &str = "session:";

/// Reasons why an account operation has been refused
#[derive(Debug, Error)]
pub enum AccountError {
    /// Parameters of the request could not be decoded
    #[error("invalid request format")]
    MalformedRequest(#[source] serde_json::Error),
    /// Email address lacks a local part or domain
    #[error("invalid email format")]
    InvalidEmail,
    /// Password is too short
    #[error("invalid password format")]
    InvalidPassword,
    /// Another account uses the email address
    #[error("email already registered")]
    EmailTaken,
    /// Email or password do not match an account
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Token does not belong to an active session
    #[error("invalid session")]
    InvalidSession,
    /// Session refers to an account that no longer exists
    #[error("user not found")]
    UserNotFound,
    /// Unexpected failure of a collaborator
    #[error("internal server error")]
    Internal(#[source] BoxedError),
}

impl AccountError {
    /// HTTP-style status code describing the error
    pub fn status_code(&self) -> u16 {
        match self {
            AccountError::MalformedRequest(_)
            | AccountError::InvalidEmail
            | AccountError::InvalidPassword => 400,
            AccountError::InvalidCredentials | AccountError::InvalidSession => 401,
            AccountError::UserNotFound => 404,
            AccountError::EmailTaken => 409,
            AccountError::Internal(_) => 500,
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Duplicate => AccountError::EmailTaken,
            StoreError::Backend(e) => AccountError::Internal(e),
        }
    }
}

/// Business rules for user accounts and their sessions
#[derive(Clone)]
pub struct Accounts<U, S> {
    users: U,
    sessions: S,
    session_ttl: Duration,
}

impl<U, S> Accounts<U, S>
where
    U: UserStore + Send + Sync,
    S: SessionStore + Send + Sync,
{
    /// Creates a new instance handing out sessions valid for `session_ttl`
    pub fn new(users: U, sessions: S, session_ttl: Duration) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    /// Store holding the sessions, e.g. for health checks
    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    /// Creates a new account
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AccountError> {
        let email = normalize_email(&request.email)?;

        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AccountError::InvalidPassword);
        }

        let password_hash = hash_password(request.password).await?;
        let user = self
            .users
            .create_user(NewUser {
                email,
                name: request.name.trim().to_owned(),
                password_hash,
            })
            .await?;

        debug!(user_id = user.id, "Registered user");

        Ok(RegisterResponse {
            user,
            message: "user registered successfully".into(),
        })
    }

    /// Verifies the credentials and opens a new session
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AccountError> {
        let email = request.email.trim().to_lowercase();
        let user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(request.password, user.password_hash.clone()).await? {
            return Err(AccountError::InvalidCredentials);
        }

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.session_ttl)
            .map_err(|e| AccountError::Internal(e.into()))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AccountError::Internal("session lifetime out of range".into()))?;
        let session = Session {
            id: generate_token(),
            user_id: user.id,
            created_at: now,
            expires_at,
        };

        let value = serde_json::to_string(&session).map_err(|e| AccountError::Internal(e.into()))?;
        self.sessions
            .set(&session_key(&session.id), &value, self.session_ttl)
            .await
            .map_err(AccountError::Internal)?;

        debug!(user_id = user.id, "Opened session");

        Ok(LoginResponse {
            token: session.id.clone(),
            session,
            message: "login successful".into(),
        })
    }

    /// Looks up the account owning a session
    #[instrument(skip(self, request))]
    pub async fn profile(&self, request: SessionRequest) -> Result<ProfileResponse, AccountError> {
        let session = self.session(&request.token).await?;

        let user = self
            .users
            .find_user_by_id(session.user_id)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        Ok(ProfileResponse { user })
    }

    /// Closes a session, regardless of whether it exists
    #[instrument(skip(self, request))]
    pub async fn logout(&self, request: SessionRequest) -> Result<LogoutResponse, AccountError> {
        self.sessions
            .delete(&session_key(&request.token))
            .await
            .map_err(AccountError::Internal)?;

        Ok(LogoutResponse {
            message: "logged out successfully".into(),
        })
    }

    async fn session(&self, token: &str) -> Result<Session, AccountError> {
        if token.is_empty() {
            return Err(AccountError::InvalidSession);
        }

        let value = self
            .sessions
            .get(&session_key(token))
            .await
            .map_err(AccountError::Internal)?
            .ok_or(AccountError::InvalidSession)?;

        let session: Session =
            serde_json::from_str(&value).map_err(|e| AccountError::Internal(e.into()))?;

        if session.expires_at <= Utc::now() {
            return Err(AccountError::InvalidSession);
        }

        Ok(session)
    }
}

fn session_key(token: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, token)
}

fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    let mut parts = email.split('@');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AccountError::InvalidEmail),
    }
}

/// 128 bit random token, hex encoded
fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

async fn hash_password(password: String) -> Result<String, AccountError> {
    spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| BoxedError::from(e.to_string()))
    })
    .await
    .map_err(|e| AccountError::Internal(e.into()))?
    .map_err(AccountError::Internal)
}

async fn verify_password(password: String, hash: String) -> Result<bool, AccountError> {
    spawn_blocking(move || -> Result<bool, BoxedError> {
        let parsed = PasswordHash::new(&hash).map_err(|e| BoxedError::from(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AccountError::Internal(e.into()))?
    .map_err(AccountError::Internal)
}
