//! Bind identity grammar.
//!
//! ```text
//! bind-dn  = "uid=" username "," rest
//! username = 1*(any character except ",")
//! rest     = 1*(any character)
//! ```
//!
//! `rest` is not compared with the configured OU and base DN: the username is
//! the only part used to look up the account.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DnError {
    #[error("bind DN does not start with \"uid=\"")]
    MissingUidPrefix,

    #[error("bind DN has an empty username")]
    EmptyUsername,

    #[error("bind DN has no container after the username")]
    MissingContainer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindIdentity<'a> {
    pub username: &'a str,
    pub container: &'a str,
}

/// Split a bind DN into the username and the remaining container DN.
///
/// # Errors
/// Returns a [`DnError`] describing why `dn` does not match the grammar.
pub fn parse_bind_dn(dn: &str) -> Result<BindIdentity<'_>, DnError> {
    let rdn_and_rest = dn.strip_prefix("uid=").ok_or(DnError::MissingUidPrefix)?;
    let (username, container) = rdn_and_rest
        .split_once(',')
        .ok_or(DnError::MissingContainer)?;

    if username.is_empty() {
        return Err(DnError::EmptyUsername);
    }
    if container.is_empty() {
        return Err(DnError::MissingContainer);
    }

    Ok(BindIdentity {
        username,
        container,
    })
}
