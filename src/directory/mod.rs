//! Directory emulation over the relational store.
//!
//! [`Directory`] is the single [`Backend`] implementation: it answers binds
//! against stored hashes and searches with entries synthesized from a fresh
//! snapshot of users, groups and memberships.

pub mod backend;
mod bind;
pub mod config;
pub mod dn;
pub mod entry;
mod search;

use crate::{password::Hasher, store::Store};
use async_trait::async_trait;
use ldap3_proto::proto::LdapSearchRequest;
use secrecy::SecretString;
use std::{io, sync::Arc};
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub use self::backend::{Backend, Connection, ResultCode, SearchResult};
pub use self::config::{ConfigError, DirectoryConfig};
pub use self::entry::{Attribute, DirectoryEntry};

#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn Store>,
    config: DirectoryConfig,
    hasher: Hasher,
}

impl Directory {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: DirectoryConfig, hasher: Hasher) -> Self {
        Self {
            store,
            config,
            hasher,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl Backend for Directory {
    async fn bind(&self, identity: &str, credential: SecretString) -> ResultCode {
        bind::bind(self.store.as_ref(), self.hasher, identity, credential).await
    }

    async fn search(&self, bound_identity: &str, request: &LdapSearchRequest) -> SearchResult {
        search::search(self.store.as_ref(), &self.config, bound_identity, request).await
    }

    async fn close(&self, bound_identity: &str, connection: &mut Connection) -> io::Result<()> {
        debug!(bound = bound_identity, "closing connection");
        match connection.shutdown().await {
            // peer already gone
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::{Group, User}, store::MemoryStore};
    use chrono::{DateTime, Utc};
    use ldap3_proto::proto::{LdapDerefAliases, LdapFilter, LdapSearchScope};
    use tokio::io::{duplex, AsyncReadExt};

    fn directory(store: &MemoryStore) -> Directory {
        Directory::new(
            Arc::new(store.clone()),
            DirectoryConfig::new("dc=example,dc=com", None, None).unwrap(),
            Hasher::new(4).unwrap(),
        )
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let hash = Hasher::new(4)
            .unwrap()
            .hash(&SecretString::from("secret".to_string()))
            .unwrap();
        store
            .insert_user(
                User {
                    id: 5,
                    username: "alice".to_string(),
                    first_name: "Alice".to_string(),
                    last_name: "Liddell".to_string(),
                    email: "alice@example.com".to_string(),
                    password_set_at: DateTime::<Utc>::default(),
                    last_login_at: DateTime::<Utc>::default(),
                    disabled: false,
                    groups: vec![],
                },
                &hash,
            )
            .unwrap();
        store
            .insert_group(Group {
                id: 1,
                name: "admin".to_string(),
                description: "Administrators".to_string(),
                members: vec![],
            })
            .unwrap();
        store.add_membership(5, 1).unwrap();
        store
    }

    #[tokio::test]
    async fn test_alice_scenario() {
        let store = seeded();
        let directory = directory(&store);

        let code = directory
            .bind(
                "uid=alice,ou=People,dc=example,dc=com",
                SecretString::from("secret".to_string()),
            )
            .await;
        assert_eq!(code, ResultCode::Success);

        let request = LdapSearchRequest {
            base: "dc=example,dc=com".to_string(),
            scope: LdapSearchScope::Subtree,
            aliases: LdapDerefAliases::Never,
            sizelimit: 0,
            timelimit: 0,
            typesonly: false,
            filter: LdapFilter::Present("objectClass".to_string()),
            attrs: vec![],
        };
        let result = directory
            .search("uid=alice,ou=People,dc=example,dc=com", &request)
            .await;
        assert_eq!(result.code, ResultCode::Success);
        assert_eq!(result.entries.len(), 2);

        let alice = &result.entries[0];
        assert_eq!(alice.dn, "uid=alice,ou=People,dc=example,dc=com");
        assert_eq!(alice.values("uidNumber").unwrap(), ["1005"]);
        assert_eq!(alice.values("gidNumber").unwrap(), ["1005"]);
        assert_eq!(alice.values("memberOf").unwrap(), ["admin"]);

        let admin = &result.entries[1];
        assert_eq!(admin.dn, "cn=admin,ou=Group,dc=example,dc=com");
        assert_eq!(admin.values("gidNumber").unwrap(), ["101"]);
        assert_eq!(admin.values("member").unwrap(), ["alice"]);

        for entry in &result.entries {
            for attribute in &entry.attributes {
                assert!(attribute.values.iter().all(|value| !value.starts_with("$2")));
            }
        }
    }

    #[tokio::test]
    async fn test_close_shuts_down_the_transport() {
        let directory = directory(&MemoryStore::new());
        let (mut server, mut client) = duplex(64);

        directory.close("", &mut server).await.unwrap();

        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).await.unwrap(), 0);

        // closing twice is harmless
        directory.close("", &mut server).await.unwrap();
    }
}
