//! Group records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainResult;
use crate::id::{GroupId, UserId};
use crate::user::check_min_len;

/// Minimum length of a group name (trimmed, in characters).
pub const MIN_GROUP_NAME_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub create_time: DateTime<Utc>,
    pub creator: UserId,
    pub last_modification_time: Option<DateTime<Utc>>,
    pub last_modification_user: Option<UserId>,
    pub is_active: bool,
    pub inactivation_time: Option<DateTime<Utc>>,
    pub inactivation_reason: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl NewGroup {
    pub fn validate(&self) -> DomainResult<()> {
        check_min_len("name", &self.name, MIN_GROUP_NAME_LEN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub inactivation_reason: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl GroupUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        check_min_len("name", &self.name, MIN_GROUP_NAME_LEN)
    }
}

fn default_true() -> bool {
    true
}
