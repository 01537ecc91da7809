//! Password credentials: per-user salt + iterated SHA-256.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Default number of SHA-256 iterations for password stretching.
pub const DEFAULT_HASH_ITERATIONS: u32 = 100_000;

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Derive a salted credential for storage.
    fn hash(&self, password: &str) -> String;

    /// Whether `password` matches `credential`. Malformed credentials never match.
    fn verify(&self, password: &str, credential: &str) -> bool;
}

/// Iterated SHA-256 with a random per-credential salt.
///
/// Credentials are stored as `<iterations>$<salt_hex>$<hash_hex>`. The
/// configured count only applies to new hashes; verification uses the
/// count recorded in the credential, so changing it never locks out
/// existing accounts.
#[derive(Debug, Clone)]
pub struct Sha256Hasher {
    iterations: u32,
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self::with_iterations(DEFAULT_HASH_ITERATIONS)
    }

    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for Sha256Hasher {
    fn hash(&self, password: &str) -> String {
        let salt = generate_salt();
        let digest = stretch(password, &salt, self.iterations);
        format!("{}${salt}${digest}", self.iterations)
    }

    fn verify(&self, password: &str, credential: &str) -> bool {
        let mut parts = credential.splitn(3, '$');
        let (Some(iterations), Some(salt), Some(stored)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        if iterations == 0 || salt.is_empty() {
            return false;
        }
        let attempt = stretch(password, salt, iterations);
        constant_time_eq(stored.as_bytes(), attempt.as_bytes())
    }
}

/// Generate a random salt (hex-encoded).
fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn stretch(password: &str, salt: &str, iterations: u32) -> String {
    let mut hash = Sha256::new();
    hash.update(salt.as_bytes());
    hash.update(password.as_bytes());
    let mut result = hash.finalize();

    for _ in 1..iterations {
        let mut h = Sha256::new();
        h.update(result);
        h.update(salt.as_bytes());
        result = h.finalize();
    }

    hex::encode(result)
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
