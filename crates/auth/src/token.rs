//! Stateless mint/verify of bearer tokens.
//!
//! Wire format: `header.payload.signature`, each segment base64url, signed
//! with HMAC-SHA512 under a single process-wide key. There is no key rotation
//! and no server-side token storage.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{ClaimSet, ClaimsWindowError, validate_window};

/// Signing algorithm written into every token header.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS512;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not match")]
    BadSignature,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,

    #[error("token could not be signed: {0}")]
    Signing(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("signing key must not be empty")]
pub struct EmptySigningKey;

/// Signs claim sets into bearer tokens and verifies them back.
///
/// Holds the symmetric key; build it once at startup and share it read-only.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(signing_key: &[u8]) -> Result<Self, EmptySigningKey> {
        if signing_key.is_empty() {
            return Err(EmptySigningKey);
        }

        // Expiry lives in our own `expiresAt` claim and is checked after
        // decoding, so the registered-claim checks are switched off.
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Ok(Self {
            encoding: EncodingKey::from_secret(signing_key),
            decoding: DecodingKey::from_secret(signing_key),
            validation,
        })
    }

    pub fn mint(&self, claims: &ClaimSet) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(TOKEN_ALGORITHM), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<ClaimSet, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify `token` as of `now`.
    ///
    /// Checks run in order and the first failure wins: segment structure,
    /// signature (constant-time), payload decoding, validity window.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimSet, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(TokenError::Malformed(
                "expected three non-empty segments".to_string(),
            ));
        }

        let data = jsonwebtoken::decode::<ClaimSet>(token, &self.decoding, &self.validation)
            .map_err(map_decode_error)?;

        validate_window(&data.claims, now).map_err(|e| match e {
            ClaimsWindowError::Expired => TokenError::Expired,
            other => TokenError::Malformed(other.to_string()),
        })?;

        Ok(data.claims)
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::Json(e) => TokenError::Malformed(format!("payload: {e}")),
        ErrorKind::Base64(e) => TokenError::Malformed(format!("encoding: {e}")),
        ErrorKind::InvalidAlgorithm => TokenError::Malformed("unexpected algorithm".to_string()),
        _ => TokenError::Malformed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    use usergroup_core::UserId;

    const KEY: &[u8] = b"test-signing-key";

    fn claims_at(now: DateTime<Utc>, validity: Duration) -> ClaimSet {
        let issued_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap();
        ClaimSet {
            subject_id: UserId::new(7),
            login_name: "cgil".to_string(),
            display_name: "Carlos GIL".to_string(),
            email: "c@gil.town".to_string(),
            is_admin: true,
            issued_at,
            expires_at: issued_at + validity,
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(KEY).unwrap()
    }

    #[test]
    fn empty_key_is_refused() {
        assert!(TokenCodec::new(b"").is_err());
    }

    #[test]
    fn mint_then_verify_returns_same_claims() {
        let claims = claims_at(Utc::now(), Duration::minutes(60));
        let token = codec().mint(&claims).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec().verify(&token).unwrap(), claims);
    }

    #[test]
    fn header_names_the_algorithm() {
        let token = codec().mint(&claims_at(Utc::now(), Duration::minutes(1))).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS512);
    }

    #[test]
    fn past_expiry_yields_expired() {
        let claims = claims_at(Utc::now() - Duration::hours(2), Duration::minutes(60));
        let token = codec().mint(&claims).unwrap();
        assert_eq!(codec().verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn expiry_is_judged_at_the_given_instant() {
        let now = Utc::now();
        let token = codec().mint(&claims_at(now, Duration::minutes(10))).unwrap();

        assert!(codec().verify_at(&token, now + Duration::minutes(9)).is_ok());
        assert_eq!(
            codec().verify_at(&token, now + Duration::minutes(11)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn other_key_is_bad_signature() {
        let token = codec().mint(&claims_at(Utc::now(), Duration::minutes(5))).unwrap();
        let other = TokenCodec::new(b"another-key").unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn signature_is_checked_before_expiry() {
        let claims = claims_at(Utc::now() - Duration::hours(2), Duration::minutes(1));
        let token = codec().mint(&claims).unwrap();
        let other = TokenCodec::new(b"another-key").unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn structural_garbage_is_malformed() {
        for token in ["", "abc", "a.b", "a..c", "a.b.c.d"] {
            assert!(
                matches!(codec().verify(token), Err(TokenError::Malformed(_))),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn signed_payload_of_wrong_shape_is_malformed() {
        let token = jsonwebtoken::encode(
            &Header::new(TOKEN_ALGORITHM),
            &serde_json::json!({ "sub": "someone" }),
            &EncodingKey::from_secret(KEY),
        )
        .unwrap();
        assert!(matches!(codec().verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn other_algorithm_is_rejected() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims_at(Utc::now(), Duration::minutes(5)),
            &EncodingKey::from_secret(KEY),
        )
        .unwrap();
        assert!(codec().verify(&token).is_err());
    }

    fn flip(token: &str, segment: usize, pos: usize) -> String {
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[segment] = flip_char(parts[segment].as_bytes(), pos);
        parts.join(".")
    }

    // Swap one base64url character for a different one of the same alphabet.
    fn flip_char(segment: &[u8], pos: usize) -> String {
        let mut out = segment.to_vec();
        let i = pos % out.len();
        out[i] = if out[i] == b'A' { b'B' } else { b'A' };
        String::from_utf8(out).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn tampering_never_verifies(segment in 1usize..3, pos in 0usize..512) {
            let token = codec().mint(&claims_at(Utc::now(), Duration::minutes(5))).unwrap();
            let tampered = flip(&token, segment, pos);
            prop_assume!(tampered != token);

            match codec().verify(&tampered) {
                Err(TokenError::BadSignature) | Err(TokenError::Malformed(_)) => {}
                other => prop_assert!(false, "tampered token accepted: {:?}", other),
            }
        }
    }
}
