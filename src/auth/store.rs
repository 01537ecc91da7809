//! Account store: registration, password login, bearer-token authentication.
//!
//! Accounts live in the backend's account map; each registration also
//! writes an empty list for the new user. The two writes are independent,
//! so a crash between them leaves an account whose list is created lazily
//! on first access.

use super::password::PasswordHasher;
use super::token::{Claims, TokenError, TokenSigner};
use crate::storage::{AccountRecord, Storage, StorageError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from account operations.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingCredentials,

    #[error("user already exists")]
    UsernameTaken,

    #[error("user not found")]
    UserNotFound,

    #[error("wrong password")]
    WrongPassword,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A registered account (without its credential).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
    pub username: String,
    /// Expiry as Unix seconds.
    pub expires_at: u64,
}

/// Account registry backed by a [`Storage`] account map.
pub struct AccountStore {
    storage: Arc<dyn Storage>,
    hasher: Arc<dyn PasswordHasher>,
    signer: Arc<dyn TokenSigner>,
    token_ttl: Duration,
    register_lock: Mutex<()>,
    /// Checked against when the account does not exist, so a missing
    /// user costs the same hashing work as a wrong password.
    dummy_credential: String,
}

impl AccountStore {
    pub fn new(
        storage: Arc<dyn Storage>,
        hasher: Arc<dyn PasswordHasher>,
        signer: Arc<dyn TokenSigner>,
        token_ttl: Duration,
    ) -> Self {
        let dummy_credential = hasher.hash("");
        Self {
            storage,
            hasher,
            signer,
            token_ttl,
            register_lock: Mutex::new(()),
            dummy_credential,
        }
    }

    // ── Registration ────────────────────────────────────────────────

    /// Register a new user and create their empty list.
    pub fn register(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let _guard = self.register_lock.lock();
        let mut accounts = self.storage.load_accounts()?;
        if accounts.contains_key(username) {
            return Err(AuthError::UsernameTaken);
        }

        let record = AccountRecord {
            password_hash: self.hasher.hash(password),
            created_at: Utc::now(),
        };
        let created_at = record.created_at;
        accounts.insert(username.to_owned(), record);
        self.storage.save_accounts(&accounts)?;
        self.storage.save_list(username, &[])?;

        tracing::info!(username, "User registered");
        Ok(Account {
            username: username.to_owned(),
            created_at,
        })
    }

    // ── Login ───────────────────────────────────────────────────────

    /// Check a username/password pair and issue a signed token.
    pub fn verify(&self, username: &str, password: &str) -> Result<AuthToken, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let accounts = self.storage.load_accounts()?;
        let Some(record) = accounts.get(username) else {
            // Burn the same hashing work as a real check
            let _ = self.hasher.verify(password, &self.dummy_credential);
            tracing::debug!(username, "Login for unknown user");
            return Err(AuthError::UserNotFound);
        };

        if !self.hasher.verify(password, &record.password_hash) {
            tracing::warn!(username, "Login with wrong password");
            return Err(AuthError::WrongPassword);
        }

        let claims = Claims::new(username, self.token_ttl);
        let token = self.signer.sign(&claims)?;

        tracing::info!(username, "User logged in");
        Ok(AuthToken {
            token,
            username: claims.sub,
            expires_at: claims.exp,
        })
    }

    // ── Token Authentication ────────────────────────────────────────

    /// Resolve a bearer token to the username it binds.
    pub fn authenticate(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.signer.verify(token)?;
        Ok(claims.sub)
    }

    /// Count registered users.
    pub fn user_count(&self) -> Result<usize, AuthError> {
        Ok(self.storage.load_accounts()?.len())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
