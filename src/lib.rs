//! # ldapgate
//!
//! An LDAP front-end for a relational user and group store. Clients bind and
//! search over LDAP; every answer is computed from the database on the spot.
//!
//! ## Directory layout
//!
//! ```text
//! <base_dn>
//! ├── <user_ou>   uid=<username>   top, posixAccount, inetOrgPerson
//! └── <group_ou>  cn=<group>       top, posixGroup, groupOfNames
//! ```
//!
//! Numeric ids are derived from database ids: a user gets `uidNumber` and a
//! private `gidNumber` of `id + 1000`, a standalone group gets `id + 100`.
//!
//! ## Passwords
//!
//! Hashes are verified with bcrypt. Legacy `{MD5}`, `{SHA}` and `{SSHA}`
//! hashes still authenticate and are replaced with bcrypt on the next
//! successful bind.
//!
//! The reference schema lives in `sql/schema.sql`.

pub mod cli;
pub mod directory;
pub mod health;
pub mod ldap;
pub mod model;
pub mod password;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use anyhow::{ensure, Context, Result};
    use std::{fs, path::PathBuf};

    // Normalize SQL to avoid brittle formatting checks in schema tests.
    fn canonical_sql() -> Result<String> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sql/schema.sql");
        let sql = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read SQL file at {}", path.display()))?;
        Ok(sql
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| ch.to_ascii_lowercase())
            .collect())
    }

    #[test]
    fn schema_sql_has_directory_tables() -> Result<()> {
        let canonical = canonical_sql()?;
        for table in ["createtableusers(", "createtable`groups`(", "createtableuser2group("] {
            ensure!(canonical.contains(table), "missing {table} in sql/schema.sql");
        }
        ensure!(
            canonical.contains("usernamevarchar(64)notnullunique"),
            "Users.Username must be unique"
        );
        Ok(())
    }

    #[test]
    fn schema_sql_matches_store_queries() -> Result<()> {
        let canonical = canonical_sql()?;
        for column in [
            "passwordhash",
            "passwordset",
            "lastlogin",
            "disabled",
            "firstname",
            "lastname",
            "email",
            "description",
            "userid",
            "groupid",
        ] {
            ensure!(canonical.contains(column), "missing column {column}");
        }
        Ok(())
    }

    #[test]
    fn git_commit_hash_is_set() {
        assert!(!super::GIT_COMMIT_HASH.is_empty());
    }
}
