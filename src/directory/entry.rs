//! Projection of relational records into directory entries.
//!
//! The mapping is pure: the same record and configuration always produce the
//! same entry, attribute order included. No credential field exists on the
//! input types, so none can reach an entry.

use super::config::DirectoryConfig;
use crate::model::{Group, User};

pub const USER_OBJECT_CLASSES: [&str; 3] = ["top", "posixAccount", "inetOrgPerson"];
pub const GROUP_OBJECT_CLASSES: [&str; 3] = ["top", "posixGroup", "groupOfNames"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: &'static str,
    pub values: Vec<String>,
}

impl Attribute {
    fn single(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            values: vec![value.into()],
        }
    }

    fn many<I, S>(name: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: Vec<Attribute>,
}

impl DirectoryEntry {
    /// Values of an attribute, matched case-insensitively.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
            .map(|attribute| attribute.values.as_slice())
    }
}

#[must_use]
pub fn user_to_entry(user: &User, config: &DirectoryConfig) -> DirectoryEntry {
    DirectoryEntry {
        dn: config.user_dn(&user.username),
        attributes: vec![
            Attribute::single("uid", &user.username),
            Attribute::single("cn", user.common_name()),
            Attribute::single("sn", &user.last_name),
            Attribute::single("givenName", &user.first_name),
            Attribute::single("uidNumber", user.unix_user_id().to_string()),
            Attribute::single("gidNumber", user.unix_group_id().to_string()),
            Attribute::single("mail", &user.email),
            Attribute::single("homeDirectory", user.home_directory()),
            Attribute::many("objectClass", USER_OBJECT_CLASSES),
            Attribute::many("memberOf", &user.groups),
        ],
    }
}

#[must_use]
pub fn group_to_entry(group: &Group, config: &DirectoryConfig) -> DirectoryEntry {
    DirectoryEntry {
        dn: config.group_dn(&group.name),
        attributes: vec![
            Attribute::single("cn", &group.name),
            Attribute::single("gidNumber", group.unix_group_id().to_string()),
            Attribute::single("description", &group.description),
            Attribute::many("objectClass", GROUP_OBJECT_CLASSES),
            Attribute::many("member", &group.members),
        ],
    }
}
