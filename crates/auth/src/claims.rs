use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use usergroup_core::UserId;

use crate::credentials::AuthRecord;

/// Identity and authorization attributes carried inside a bearer token.
///
/// Minted once per login and reconstructed from the token on every request;
/// never mutated. Timestamps are whole seconds so a minted token decodes back
/// to an identical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSet {
    pub subject_id: UserId,
    pub login_name: String,
    pub display_name: String,
    pub email: String,
    pub is_admin: bool,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl ClaimSet {
    /// Build the claims for a freshly authenticated account.
    pub fn issue(record: &AuthRecord, now: DateTime<Utc>, validity: Duration) -> Self {
        let issued_at = now.trunc_subsecs(0);
        Self {
            subject_id: record.id,
            login_name: record.login_name.clone(),
            display_name: record.display_name.clone(),
            email: record.email.clone(),
            is_admin: record.is_admin,
            issued_at,
            expires_at: issued_at + validity,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsWindowError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Clock skew tolerated between the minting and the verifying process.
pub const ISSUED_AT_LEEWAY_SECS: i64 = 30;

/// Check the validity window of decoded claims against `now`.
///
/// Signature verification happens before this, in the token codec.
pub fn validate_window(claims: &ClaimSet, now: DateTime<Utc>) -> Result<(), ClaimsWindowError> {
    if claims.expires_at <= claims.issued_at {
        return Err(ClaimsWindowError::InvalidTimeWindow);
    }
    if now + Duration::seconds(ISSUED_AT_LEEWAY_SECS) < claims.issued_at {
        return Err(ClaimsWindowError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(ClaimsWindowError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AuthRecord {
        AuthRecord {
            id: UserId::new(12),
            login_name: "cgil".to_string(),
            display_name: "Carlos GIL".to_string(),
            email: "c@gil.town".to_string(),
            credential_digest: "irrelevant".to_string(),
            is_admin: false,
            is_locked: false,
            is_active: true,
            bad_credential_count: 0,
        }
    }

    #[test]
    fn issue_copies_identity_and_sets_window() {
        let now = Utc::now();
        let claims = ClaimSet::issue(&record(), now, Duration::minutes(60));

        assert_eq!(claims.subject_id, UserId::new(12));
        assert_eq!(claims.login_name, "cgil");
        assert_eq!(claims.expires_at - claims.issued_at, Duration::minutes(60));
        assert!(claims.issued_at <= now);
        assert_eq!(claims.issued_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn payload_uses_flat_camel_case_keys() {
        let claims = ClaimSet::issue(&record(), Utc::now(), Duration::minutes(5));
        let json = serde_json::to_value(&claims).unwrap();

        for key in [
            "subjectId",
            "loginName",
            "displayName",
            "email",
            "isAdmin",
            "issuedAt",
            "expiresAt",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert!(json["expiresAt"].is_i64());
    }

    #[test]
    fn window_checks() {
        let now = Utc::now();
        let claims = ClaimSet::issue(&record(), now, Duration::minutes(1));

        assert_eq!(validate_window(&claims, now), Ok(()));
        assert_eq!(
            validate_window(&claims, now + Duration::minutes(2)),
            Err(ClaimsWindowError::Expired)
        );
        assert_eq!(
            validate_window(&claims, now - Duration::minutes(5)),
            Err(ClaimsWindowError::NotYetValid)
        );

        let inverted = ClaimSet {
            expires_at: claims.issued_at,
            ..claims
        };
        assert_eq!(
            validate_window(&inverted, now),
            Err(ClaimsWindowError::InvalidTimeWindow)
        );
    }
}
