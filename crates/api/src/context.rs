use usergroup_auth::ClaimSet;
use usergroup_core::UserId;

/// Authenticated caller for a request.
///
/// Inserted by the session middleware after the token and the live account
/// state were both checked. Present on every `/api` route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    claims: ClaimSet,
}

impl SessionContext {
    pub fn new(claims: ClaimSet) -> Self {
        Self { claims }
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn user_id(&self) -> UserId {
        self.claims.subject_id
    }

    pub fn is_admin(&self) -> bool {
        self.claims.is_admin
    }
}
