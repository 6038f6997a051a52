//! User records and the validation rules applied before they reach a store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{GroupId, UserId};

/// Minimum length of a display name (trimmed, in characters).
pub const MIN_NAME_LEN: usize = 5;
/// Minimum length of a login name (trimmed, in characters).
pub const MIN_LOGIN_NAME_LEN: usize = 3;
/// Minimum length of an email address (trimmed, in characters).
pub const MIN_EMAIL_LEN: usize = 4;

/// Full user record as returned by the API.
///
/// The credential digest is deliberately absent: it only ever travels inside
/// the authentication projection owned by the auth crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub username: String,
    pub external_id: Option<i32>,
    pub orgunit_id: Option<i32>,
    pub groups_id: Vec<GroupId>,
    pub phone: Option<String>,
    pub is_locked: bool,
    pub is_admin: bool,
    pub create_time: DateTime<Utc>,
    pub creator: UserId,
    pub last_modification_time: Option<DateTime<Utc>>,
    pub last_modification_user: Option<UserId>,
    pub is_active: bool,
    pub inactivation_time: Option<DateTime<Utc>>,
    pub inactivation_reason: Option<String>,
    pub comment: Option<String>,
    pub bad_password_count: i32,
}

/// Compact projection used by list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub username: String,
    pub creator: UserId,
    pub create_time: DateTime<Utc>,
    pub is_admin: bool,
    pub is_locked: bool,
    pub is_active: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            creator: user.creator,
            create_time: user.create_time,
            is_admin: user.is_admin,
            is_locked: user.is_locked,
            is_active: user.is_active,
        }
    }
}

/// Payload for creating a user.
///
/// `password_hash` is the client-side fast digest of the plaintext; the API
/// replaces it with the salted digest before handing the record to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(alias = "loginName")]
    pub username: String,
    #[serde(alias = "credentialDigest")]
    pub password_hash: String,
    #[serde(default)]
    pub external_id: Option<i32>,
    #[serde(default)]
    pub orgunit_id: Option<i32>,
    #[serde(default)]
    pub groups_id: Vec<GroupId>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

impl NewUser {
    /// Check the identity fields. The digest is checked by the auth layer.
    pub fn validate(&self) -> DomainResult<()> {
        validate_identity(&self.name, &self.email, &self.username)
    }
}

/// Payload for an administrative update of a user.
///
/// The credential is not part of an update; it changes only through a
/// password reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(alias = "loginName")]
    pub username: String,
    #[serde(default)]
    pub external_id: Option<i32>,
    #[serde(default)]
    pub orgunit_id: Option<i32>,
    #[serde(default)]
    pub groups_id: Vec<GroupId>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub inactivation_reason: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl UserUpdate {
    /// Validate fields and refuse a body that targets another id than the path.
    pub fn validate_for(&self, target: UserId) -> DomainResult<()> {
        if self.id != target {
            return Err(DomainError::invariant(format!(
                "path id [{}] and body id [{}] cannot differ",
                target, self.id
            )));
        }
        validate_identity(&self.name, &self.email, &self.username)
    }

    /// Fields only an administrator may change, named when they differ from `current`.
    ///
    /// Account flags, group membership and organisational links. A user
    /// editing their own record keeps these as stored.
    pub fn administrative_changes(&self, current: &User) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.is_admin != current.is_admin {
            changed.push("is_admin");
        }
        if self.is_locked != current.is_locked {
            changed.push("is_locked");
        }
        if self.is_active != current.is_active {
            changed.push("is_active");
        }
        let mut wanted = self.groups_id.clone();
        let mut stored = current.groups_id.clone();
        wanted.sort();
        wanted.dedup();
        stored.sort();
        stored.dedup();
        if wanted != stored {
            changed.push("groups_id");
        }
        if self.orgunit_id != current.orgunit_id {
            changed.push("orgunit_id");
        }
        if self.external_id != current.external_id {
            changed.push("external_id");
        }
        changed
    }
}

fn default_true() -> bool {
    true
}

fn validate_identity(name: &str, email: &str, username: &str) -> DomainResult<()> {
    check_min_len("name", name, MIN_NAME_LEN)?;
    check_min_len("username", username, MIN_LOGIN_NAME_LEN)?;
    check_min_len("email", email, MIN_EMAIL_LEN)?;
    if !email.contains('@') {
        return Err(DomainError::validation("email must contain '@'"));
    }
    Ok(())
}

pub(crate) fn check_min_len(field: &str, value: &str, min: usize) -> DomainResult<()> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if len < min {
        return Err(DomainError::validation(format!(
            "{field} minLength is {min} not ({len})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            name: "Carlos GIL".to_string(),
            email: "c@gil.town".to_string(),
            username: "cgil".to_string(),
            password_hash: "4acf0b39d9c4766709a3689f553ac01ab550545ffa4544dfc0b2cea82fba02a3"
                .to_string(),
            external_id: None,
            orgunit_id: None,
            groups_id: vec![],
            phone: None,
            is_admin: false,
            comment: None,
        }
    }

    #[test]
    fn accepts_short_but_valid_login_name() {
        assert!(new_user().validate().is_ok());
    }

    #[test]
    fn rejects_two_char_login_name() {
        let mut u = new_user();
        u.username = "cg".to_string();
        assert!(matches!(u.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn rejects_blank_name_and_bad_email() {
        let mut u = new_user();
        u.name = "    ".to_string();
        assert!(u.validate().unwrap_err().to_string().contains("cannot be empty"));

        let mut u = new_user();
        u.email = "nowhere".to_string();
        assert!(u.validate().is_err());
    }

    #[test]
    fn accepts_login_name_alias_in_json() {
        let u: NewUser = serde_json::from_value(serde_json::json!({
            "name": "Carlos GIL",
            "email": "c@gil.town",
            "loginName": "cgil",
            "credentialDigest": "abc",
        }))
        .unwrap();
        assert_eq!(u.username, "cgil");
        assert_eq!(u.password_hash, "abc");
        assert!(!u.is_admin);
    }

    fn stored_user() -> User {
        User {
            id: UserId::new(3),
            name: "Carlos GIL".to_string(),
            email: "c@gil.town".to_string(),
            username: "cgil".to_string(),
            external_id: None,
            orgunit_id: Some(7),
            groups_id: vec![GroupId::new(2), GroupId::new(1)],
            phone: None,
            is_locked: false,
            is_admin: false,
            create_time: chrono::Utc::now(),
            creator: UserId::new(1),
            last_modification_time: None,
            last_modification_user: None,
            is_active: true,
            inactivation_time: None,
            inactivation_reason: None,
            comment: None,
            bad_password_count: 4,
        }
    }

    fn update_matching(user: &User) -> UserUpdate {
        UserUpdate {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            external_id: user.external_id,
            orgunit_id: user.orgunit_id,
            groups_id: user.groups_id.clone(),
            phone: user.phone.clone(),
            is_locked: user.is_locked,
            is_admin: user.is_admin,
            is_active: user.is_active,
            inactivation_reason: None,
            comment: None,
        }
    }

    #[test]
    fn profile_edits_are_not_administrative() {
        let current = stored_user();
        let mut update = update_matching(&current);
        update.name = "Carlos GIL-2".to_string();
        update.phone = Some("+41 21 000 00 00".to_string());
        update.groups_id = vec![GroupId::new(1), GroupId::new(2)];
        assert!(update.administrative_changes(&current).is_empty());
    }

    #[test]
    fn group_membership_and_flags_are_administrative() {
        let current = stored_user();
        let mut update = update_matching(&current);
        update.groups_id = vec![GroupId::new(1), GroupId::new(2), GroupId::new(3)];
        update.is_admin = true;
        update.orgunit_id = None;
        assert_eq!(
            update.administrative_changes(&current),
            ["is_admin", "groups_id", "orgunit_id"]
        );
    }

    #[test]
    fn update_refuses_mismatched_id() {
        let update = UserUpdate {
            id: UserId::new(3),
            name: "Carlos GIL".to_string(),
            email: "c@gil.town".to_string(),
            username: "cgil".to_string(),
            external_id: None,
            orgunit_id: None,
            groups_id: vec![],
            phone: None,
            is_locked: false,
            is_admin: false,
            is_active: true,
            inactivation_reason: None,
            comment: None,
        };
        assert!(update.validate_for(UserId::new(3)).is_ok());
        assert!(matches!(
            update.validate_for(UserId::new(4)),
            Err(DomainError::InvariantViolation(_))
        ));
    }
}
