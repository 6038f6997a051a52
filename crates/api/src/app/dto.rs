//! Request/response bodies that are not plain domain records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "loginName", alias = "username")]
    pub login_name: String,
    #[serde(rename = "credentialDigest", alias = "password_hash")]
    pub credential_digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    /// Required when the caller is not an administrator.
    #[serde(rename = "oldCredentialDigest", alias = "old_password_hash", default)]
    pub old_credential_digest: Option<String>,
    #[serde(rename = "newCredentialDigest", alias = "password_hash")]
    pub new_credential_digest: String,
}

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// `(offset, limit)` with defaults applied, or a message for the 400 body.
    pub fn resolve(self) -> Result<(i64, i64), String> {
        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if offset < 0 {
            return Err(format!("offset must not be negative, got {offset}"));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(format!("limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"));
        }
        Ok((offset, limit))
    }
}
