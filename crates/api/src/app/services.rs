//! Shared handler dependencies, built once at startup.

use std::sync::Arc;

use usergroup_auth::{Authenticator, CredentialStore};
use usergroup_infra::{GroupStore, UserStore};

pub struct AppServices {
    pub users: Arc<dyn UserStore>,
    pub groups: Arc<dyn GroupStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub authenticator: Authenticator,
}
