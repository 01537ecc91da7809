//! User authentication.
//!
//! Provides:
//! - Registration with username/password (iterated SHA-256, 100k rounds + per-user salt)
//! - Login issuing HMAC-signed bearer tokens (7-day expiry by default)
//! - Token verification resolving a bearer token to its username
//!
//! ## Design Decisions
//! - Tokens are stateless: the signed claims carry the username and expiry,
//!   so nothing besides the account map is persisted.
//! - Hashing and signing sit behind [`PasswordHasher`] and [`TokenSigner`];
//!   the store never touches a digest or MAC directly.

pub mod password;
pub mod store;
pub mod token;

pub use password::{PasswordHasher, Sha256Hasher, DEFAULT_HASH_ITERATIONS};
pub use store::{Account, AccountStore, AuthError, AuthToken};
pub use token::{Claims, HmacTokenSigner, TokenError, TokenSigner, DEFAULT_TOKEN_TTL_SECS};
