//! Salted, verifiable digests of credential material.
//!
//! Credentials travel in two stages: the client (or an upstream layer) sends
//! the fast SHA-256 digest of the plaintext, and this module applies bcrypt on
//! top of it. What a store holds is therefore always
//! `bcrypt(sha256(plaintext))`. There is no shortcut that compares a fast
//! digest directly against a stored value.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// bcrypt work factor, the lowest the algorithm accepts.
///
/// Raise it when login latency allows; existing digests stay verifiable
/// because the cost is encoded in each digest.
pub const DIGEST_COST: u32 = 4;

/// Shortest value accepted as a credential digest (an MD5 hex string).
pub const MIN_DIGEST_LEN: usize = 32;

const EMPTY_STRING_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
const EMPTY_STRING_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DigestError {
    #[error("failed to compute salted digest: {0}")]
    Hashing(String),
}

/// Compute a salted digest of `secret`.
///
/// The salt is drawn fresh on every call, so two digests of the same secret
/// differ while both verify.
pub fn digest(secret: &str) -> Result<String, DigestError> {
    bcrypt::hash(secret, DIGEST_COST).map_err(|e| DigestError::Hashing(e.to_string()))
}

/// Check `candidate` against a stored salted digest.
///
/// Never fails: a corrupted `stored` value is a non-match. The comparison
/// inside bcrypt does not short-circuit on the first differing byte.
pub fn verify(stored: &str, candidate: &str) -> bool {
    match bcrypt::verify(candidate, stored) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "stored credential digest could not be parsed");
            false
        }
    }
}

/// Fast fixed-length digest of a plaintext, as lowercase hex SHA-256.
pub fn fast_digest(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// Cheap structural guard applied to submitted digests before storing them.
///
/// Rejects values shorter than an MD5 hex string and the digests of the
/// empty string. This is not a cryptographic check.
pub fn looks_like_valid_digest(s: &str) -> bool {
    if s.len() < MIN_DIGEST_LEN {
        return false;
    }
    !(s == EMPTY_STRING_MD5 || s == EMPTY_STRING_SHA256)
}
