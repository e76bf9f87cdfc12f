//! Directory naming configuration.
//!
//! DNs are built by plain concatenation: `uid=<username>,<user_ou><base_dn>`
//! and `cn=<name>,<group_ou><base_dn>`, so both OUs carry their trailing comma.

use regex::Regex;
use thiserror::Error;

pub const DEFAULT_USER_OU: &str = "ou=People,";
pub const DEFAULT_GROUP_OU: &str = "ou=Group,";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base DN is required (e.g. dc=example,dc=com)")]
    MissingBaseDn,

    #[error("invalid {field}: {value:?}")]
    InvalidDn { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    base_dn: String,
    user_ou: String,
    group_ou: String,
}

fn valid_dn(dn: &str) -> bool {
    Regex::new(r"^[A-Za-z][A-Za-z0-9-]*=[^,=]+(,\s*[A-Za-z][A-Za-z0-9-]*=[^,=]+)*$")
        .is_ok_and(|re| re.is_match(dn))
}

/// Empty means default; a missing trailing comma is added.
fn normalize_ou(
    field: &'static str,
    value: Option<&str>,
    default: &str,
) -> Result<String, ConfigError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Ok(default.to_string());
    }

    let ou = value.trim_end_matches(',');
    if !valid_dn(ou) {
        return Err(ConfigError::InvalidDn {
            field,
            value: value.to_string(),
        });
    }

    Ok(format!("{ou},"))
}

impl DirectoryConfig {
    /// # Errors
    /// Returns an error if the base DN is empty or any component is not a DN.
    pub fn new(
        base_dn: &str,
        user_ou: Option<&str>,
        group_ou: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let base_dn = base_dn.trim();
        if base_dn.is_empty() {
            return Err(ConfigError::MissingBaseDn);
        }
        if !valid_dn(base_dn) {
            return Err(ConfigError::InvalidDn {
                field: "base DN",
                value: base_dn.to_string(),
            });
        }

        Ok(Self {
            base_dn: base_dn.to_string(),
            user_ou: normalize_ou("user OU", user_ou, DEFAULT_USER_OU)?,
            group_ou: normalize_ou("group OU", group_ou, DEFAULT_GROUP_OU)?,
        })
    }

    #[must_use]
    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    #[must_use]
    pub fn user_ou(&self) -> &str {
        &self.user_ou
    }

    #[must_use]
    pub fn group_ou(&self) -> &str {
        &self.group_ou
    }

    #[must_use]
    pub fn user_dn(&self, username: &str) -> String {
        format!("uid={username},{}{}", self.user_ou, self.base_dn)
    }

    #[must_use]
    pub fn group_dn(&self, name: &str) -> String {
        format!("cn={name},{}{}", self.group_ou, self.base_dn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DirectoryConfig::new("dc=example,dc=com", None, Some("")).unwrap();
        assert_eq!(config.user_ou(), "ou=People,");
        assert_eq!(config.group_ou(), "ou=Group,");
        assert_eq!(
            config.user_dn("alice"),
            "uid=alice,ou=People,dc=example,dc=com"
        );
        assert_eq!(config.group_dn("admin"), "cn=admin,ou=Group,dc=example,dc=com");
    }

    #[test]
    fn test_custom_ou_gets_trailing_comma() {
        let config =
            DirectoryConfig::new("dc=example,dc=com", Some("ou=users"), Some("ou=teams,")).unwrap();
        assert_eq!(config.user_ou(), "ou=users,");
        assert_eq!(config.group_ou(), "ou=teams,");
        assert_eq!(config.user_dn("bob"), "uid=bob,ou=users,dc=example,dc=com");
    }

    #[test]
    fn test_base_dn_required() {
        assert_eq!(
            DirectoryConfig::new("  ", None, None),
            Err(ConfigError::MissingBaseDn)
        );
    }

    #[test]
    fn test_invalid_dns() {
        for base in ["example.com", "dc=example,", "=example", "dc=example,,dc=com"] {
            assert!(
                matches!(
                    DirectoryConfig::new(base, None, None),
                    Err(ConfigError::InvalidDn { .. })
                ),
                "{base}"
            );
        }
        assert!(matches!(
            DirectoryConfig::new("dc=example,dc=com", Some("people"), None),
            Err(ConfigError::InvalidDn {
                field: "user OU",
                ..
            })
        ));
    }
}
