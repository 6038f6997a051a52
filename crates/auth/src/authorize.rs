use thiserror::Error;

use usergroup_core::{BOOTSTRAP_ADMIN_ID, UserId};

use crate::claims::ClaimSet;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Allow only administrators.
///
/// Decisions read `isAdmin` from the verified claims. No IO, no panics.
pub fn require_admin(claims: &ClaimSet) -> Result<(), AuthzError> {
    if claims.is_admin {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("administrator role required".to_string()))
    }
}

/// Allow administrators, or the user acting on their own record.
pub fn require_self_or_admin(claims: &ClaimSet, target: UserId) -> Result<(), AuthzError> {
    if claims.is_admin || claims.subject_id == target {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(format!(
            "user {} may not act on user {target}",
            claims.subject_id
        )))
    }
}

/// Deletion rules: the bootstrap administrator can never be deleted, by anyone.
/// Otherwise the usual self-or-admin rule applies.
pub fn authorize_user_deletion(claims: &ClaimSet, target: UserId) -> Result<(), AuthzError> {
    if target == BOOTSTRAP_ADMIN_ID {
        return Err(AuthzError::Forbidden(
            "the bootstrap administrator cannot be deleted".to_string(),
        ));
    }
    require_self_or_admin(claims, target)
}
