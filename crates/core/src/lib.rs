//! `usergroup-core`: user/group domain building blocks.
//!
//! This crate contains **pure domain** types (no infrastructure concerns).

pub mod error;
pub mod group;
pub mod id;
pub mod user;

pub use error::{DomainError, DomainResult, StoreError};
pub use group::{Group, GroupUpdate, NewGroup};
pub use id::{BOOTSTRAP_ADMIN_ID, GroupId, UserId};
pub use user::{NewUser, User, UserSummary, UserUpdate};
