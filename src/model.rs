//! Relational records backing the directory.
//!
//! `User` deliberately carries no password material: the only way to reach a
//! stored hash is [`Credential`], which is returned by the credential lookup and
//! never handed to the entry synthesizer.

use chrono::{DateTime, Utc};
use secrecy::SecretString;

/// Offset applied to a user's database id to get both its `uidNumber` and the
/// `gidNumber` of its private group.
pub const USER_ID_OFFSET: i64 = 1000;

/// Offset applied to a standalone group's database id to get its `gidNumber`.
pub const GROUP_ID_OFFSET: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    /// Unique and immutable once created.
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_set_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
    pub disabled: bool,
    /// Group names, in association-table order.
    pub groups: Vec<String>,
}

impl User {
    /// Full name, LDAP `cn`.
    #[must_use]
    pub fn common_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    #[must_use]
    pub const fn unix_user_id(&self) -> i64 {
        self.id + USER_ID_OFFSET
    }

    /// Every user owns a private group with the same numeric id.
    #[must_use]
    pub const fn unix_group_id(&self) -> i64 {
        self.id + USER_ID_OFFSET
    }

    #[must_use]
    pub fn home_directory(&self) -> String {
        format!("/home/{}", self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Usernames, in association-table order.
    pub members: Vec<String>,
}

impl Group {
    #[must_use]
    pub const fn unix_group_id(&self) -> i64 {
        self.id + GROUP_ID_OFFSET
    }
}

/// One row of the user/group association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub user_id: i64,
    pub group_id: i64,
}

/// What a bind needs to know about an account.
#[derive(Debug)]
pub struct Credential {
    pub password_hash: SecretString,
    pub disabled: bool,
}
