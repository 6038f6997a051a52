//! `usergroup-auth`: credential digests, bearer tokens and access decisions.
//!
//! This crate is decoupled from HTTP and storage. Persistence is reached only
//! through the [`CredentialStore`] trait.

pub mod authorize;
pub mod claims;
pub mod credentials;
pub mod login;
pub mod password;
pub mod session;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use authorize::{AuthzError, authorize_user_deletion, require_admin, require_self_or_admin};
pub use claims::{ClaimSet, ClaimsWindowError, validate_window};
pub use credentials::{AccountState, AuthRecord, CredentialStore};
pub use login::{Authenticator, IssuedToken, LoginError};
pub use password::DigestError;
pub use session::{SessionError, SessionGuard};
pub use token::{EmptySigningKey, TokenCodec, TokenError};
