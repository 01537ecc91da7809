//! Signed bearer tokens.
//!
//! ## Token Format
//!
//! `<claims>.<signature>`, both base64url without padding:
//! - claims: JSON `{"sub": username, "iat": secs, "exp": secs}`
//! - signature: HMAC-SHA256 over the encoded claims segment
//!
//! Nothing is stored server-side; a token is valid while its signature
//! checks out and `exp` lies in the future.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime: 7 days (seconds).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 3600;

/// Length of secrets generated by [`HmacTokenSigner::random`].
const RANDOM_SECRET_BYTES: usize = 32;

/// Token verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("bad signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("failed to encode claims: {0}")]
    Encode(String),
}

/// What a token asserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Bound username.
    pub sub: String,
    /// Issued at (Unix seconds).
    pub iat: u64,
    /// Expires at (Unix seconds).
    pub exp: u64,
}

impl Claims {
    /// Claims for `username`, valid for `ttl` from now.
    pub fn new(username: impl Into<String>, ttl: Duration) -> Self {
        let iat = epoch_secs();
        Self {
            sub: username.into(),
            iat,
            exp: iat.saturating_add(ttl.as_secs()),
        }
    }
}

/// Issues and checks bearer tokens.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, claims: &Claims) -> Result<String, TokenError>;

    /// Check signature and expiry, returning the claims on success.
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;
}

/// HMAC-SHA256 signer with a shared secret.
#[derive(Clone)]
pub struct HmacTokenSigner {
    secret: Vec<u8>,
}

impl HmacTokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signer with a fresh random secret. Tokens die with the process.
    pub fn random() -> Self {
        let mut secret = vec![0u8; RANDOM_SECRET_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self { secret }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }
}

impl TokenSigner for HmacTokenSigner {
    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let json = serde_json::to_vec(claims).map_err(|e| TokenError::Encode(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        if payload.is_empty() || signature.contains('.') {
            return Err(TokenError::Malformed);
        }
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;

        if epoch_secs() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> HmacTokenSigner {
        HmacTokenSigner::new(b"test-secret-key-32-bytes-long!!".to_vec())
    }

    fn week() -> Duration {
        Duration::from_secs(DEFAULT_TOKEN_TTL_SECS)
    }

    #[test]
    fn sign_and_verify() {
        let signer = signer();
        let token = signer.sign(&Claims::new("alice", week())).unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, DEFAULT_TOKEN_TTL_SECS);
    }

    #[test]
    fn token_is_url_safe() {
        let token = signer().sign(&Claims::new("a/b+c", week())).unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
        assert_eq!(token.matches('.').count(), 1);
    }

    #[test]
    fn reject_tampered_signature() {
        let signer = signer();
        let token = signer.sign(&Claims::new("alice", week())).unwrap();
        let (payload, _) = token.split_once('.').unwrap();
        let forged = format!("{payload}.{}", URL_SAFE_NO_PAD.encode([0u8; 32]));
        assert_eq!(signer.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn reject_swapped_claims() {
        let signer = signer();
        let token = signer.sign(&Claims::new("alice", week())).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let other = serde_json::to_vec(&Claims::new("mallory", week())).unwrap();
        let forged = format!("{}.{signature}", URL_SAFE_NO_PAD.encode(other));
        assert_eq!(signer.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn reject_foreign_secret() {
        let token = signer().sign(&Claims::new("alice", week())).unwrap();
        let other = HmacTokenSigner::new(b"another-secret".to_vec());
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn reject_expired_token() {
        let signer = signer();
        let token = signer.sign(&Claims::new("alice", Duration::ZERO)).unwrap();
        assert_eq!(signer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn reject_malformed_tokens() {
        let signer = signer();
        for token in ["", "nodot", ".sig", "a.b.c", "abc.!!!"] {
            assert_eq!(signer.verify(token), Err(TokenError::Malformed), "{token}");
        }
    }

    #[test]
    fn random_signers_do_not_share_secrets() {
        let a = HmacTokenSigner::random();
        let b = HmacTokenSigner::random();
        let token = a.sign(&Claims::new("alice", week())).unwrap();
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }
}
