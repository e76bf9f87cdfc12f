//! In-process store.
//!
//! Writes are buffered per transaction and only applied on commit, so a
//! rolled-back or failed bind leaves the data untouched, the same way the
//! relational store behaves. Faults can be injected to exercise the
//! infrastructure-error paths.

use super::{Store, StoreError, Transaction};
use crate::model::{Credential, Group, Membership, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<i64, StoredUser>,
    groups: BTreeMap<i64, Group>,
    memberships: BTreeSet<(i64, i64)>,
}

impl State {
    fn user_mut(&mut self, username: &str) -> Option<&mut StoredUser> {
        self.users
            .values_mut()
            .find(|stored| stored.user.username == username)
    }

    fn user(&self, username: &str) -> Option<&StoredUser> {
        self.users
            .values()
            .find(|stored| stored.user.username == username)
    }
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    ping: AtomicBool,
    query: AtomicBool,
    record_login: AtomicBool,
    upgrade_hash: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Faults>,
    commits: Arc<AtomicUsize>,
}

fn lock(state: &Mutex<State>) -> Result<MutexGuard<'_, State>, StoreError> {
    state
        .lock()
        .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
}

fn injected(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        return Err(StoreError::Unavailable(format!("injected {what} failure")));
    }
    Ok(())
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user. `user.groups` is ignored; use [`Self::add_membership`].
    ///
    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn insert_user(&self, user: User, password_hash: &str) -> Result<(), StoreError> {
        let mut state = lock(&self.state)?;
        state.users.insert(
            user.id,
            StoredUser {
                user: User {
                    groups: Vec::new(),
                    ..user
                },
                password_hash: password_hash.to_string(),
            },
        );
        Ok(())
    }

    /// Insert or replace a group. `group.members` is ignored.
    ///
    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn insert_group(&self, group: Group) -> Result<(), StoreError> {
        let mut state = lock(&self.state)?;
        state.groups.insert(
            group.id,
            Group {
                members: Vec::new(),
                ..group
            },
        );
        Ok(())
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn add_membership(&self, user_id: i64, group_id: i64) -> Result<(), StoreError> {
        lock(&self.state)?.memberships.insert((user_id, group_id));
        Ok(())
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn remove_membership(&self, user_id: i64, group_id: i64) -> Result<(), StoreError> {
        lock(&self.state)?.memberships.remove(&(user_id, group_id));
        Ok(())
    }

    /// Committed state of a user, `groups` left empty.
    #[must_use]
    pub fn user(&self, username: &str) -> Option<User> {
        let state = lock(&self.state).ok()?;
        state.user(username).map(|stored| stored.user.clone())
    }

    /// Committed password hash of a user.
    #[must_use]
    pub fn password_hash(&self, username: &str) -> Option<String> {
        let state = lock(&self.state).ok()?;
        state
            .user(username)
            .map(|stored| stored.password_hash.clone())
    }

    /// Number of transactions committed so far.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn fail_begin(&self, fail: bool) {
        self.faults.begin.store(fail, Ordering::SeqCst);
    }

    pub fn fail_ping(&self, fail: bool) {
        self.faults.ping.store(fail, Ordering::SeqCst);
    }

    /// Fail every read and write issued inside a transaction.
    pub fn fail_queries(&self, fail: bool) {
        self.faults.query.store(fail, Ordering::SeqCst);
    }

    pub fn fail_record_login(&self, fail: bool) {
        self.faults.record_login.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upgrade_hash(&self, fail: bool) {
        self.faults.upgrade_hash.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commit(&self, fail: bool) {
        self.faults.commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self, fail: bool) {
        self.faults.rollback.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        injected(&self.faults.begin, "begin")?;

        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            pending: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        injected(&self.faults.ping, "ping")?;
        lock(&self.state).map(|_| ())
    }
}

#[derive(Debug)]
enum Write {
    LastLogin {
        username: String,
        at: DateTime<Utc>,
    },
    PasswordHash {
        username: String,
        hash: String,
        at: DateTime<Utc>,
    },
}

pub struct MemoryTransaction {
    store: MemoryStore,
    pending: Vec<Write>,
}

impl MemoryTransaction {
    fn read(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        injected(&self.store.faults.query, "query")?;
        lock(&self.store.state)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn credential(&mut self, username: &str) -> Result<Credential, StoreError> {
        let state = self.read()?;
        let stored = state.user(username).ok_or(StoreError::NotFound)?;

        Ok(Credential {
            password_hash: SecretString::from(stored.password_hash.clone()),
            disabled: stored.user.disabled,
        })
    }

    async fn record_login(&mut self, username: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        injected(&self.store.faults.query, "query")?;
        injected(&self.store.faults.record_login, "record login")?;
        self.pending.push(Write::LastLogin {
            username: username.to_string(),
            at,
        });
        Ok(())
    }

    async fn upgrade_hash(
        &mut self,
        username: &str,
        hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        injected(&self.store.faults.query, "query")?;
        injected(&self.store.faults.upgrade_hash, "upgrade hash")?;
        self.pending.push(Write::PasswordHash {
            username: username.to_string(),
            hash: hash.to_string(),
            at,
        });
        Ok(())
    }

    async fn users(&mut self) -> Result<Vec<User>, StoreError> {
        let state = self.read()?;
        Ok(state.users.values().map(|stored| stored.user.clone()).collect())
    }

    async fn groups(&mut self) -> Result<Vec<Group>, StoreError> {
        let state = self.read()?;
        Ok(state.groups.values().cloned().collect())
    }

    async fn memberships(&mut self) -> Result<Vec<Membership>, StoreError> {
        let state = self.read()?;
        Ok(state
            .memberships
            .iter()
            .map(|&(user_id, group_id)| Membership { user_id, group_id })
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self { store, pending } = *self;
        injected(&store.faults.commit, "commit")?;

        let mut state = lock(&store.state)?;
        for write in pending {
            match write {
                Write::LastLogin { username, at } => {
                    if let Some(stored) = state.user_mut(&username) {
                        stored.user.last_login_at = at;
                    }
                }
                Write::PasswordHash { username, hash, at } => {
                    if let Some(stored) = state.user_mut(&username) {
                        stored.password_hash = hash;
                        stored.user.password_set_at = at;
                    }
                }
            }
        }
        store.commits.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        injected(&self.store.faults.rollback, "rollback")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, username: &str) -> User {
        User {
            id,
            username: username.to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            email: format!("{username}@example.com"),
            password_set_at: DateTime::<Utc>::default(),
            last_login_at: DateTime::<Utc>::default(),
            disabled: false,
            groups: vec![],
        }
    }

    #[tokio::test]
    async fn test_writes_apply_only_on_commit() {
        let store = MemoryStore::new();
        store.insert_user(user(1, "bob"), "{SHA}old").unwrap();
        let now = Utc::now();

        let mut tx = store.begin().await.unwrap();
        tx.record_login("bob", now).await.unwrap();
        tx.upgrade_hash("bob", "$2a$04$new", now).await.unwrap();
        assert_eq!(store.password_hash("bob").as_deref(), Some("{SHA}old"));
        tx.rollback().await.unwrap();
        assert_eq!(store.password_hash("bob").as_deref(), Some("{SHA}old"));
        assert_eq!(store.commits(), 0);

        let mut tx = store.begin().await.unwrap();
        tx.record_login("bob", now).await.unwrap();
        tx.upgrade_hash("bob", "$2a$04$new", now).await.unwrap();
        tx.commit().await.unwrap();

        let bob = store.user("bob").unwrap();
        assert_eq!(bob.last_login_at, now);
        assert_eq!(bob.password_set_at, now);
        assert_eq!(store.password_hash("bob").as_deref(), Some("$2a$04$new"));
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn test_credential_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.credential("nobody").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryStore::new();

        store.fail_begin(true);
        assert!(store.begin().await.is_err());
        assert!(store.ping().await.is_ok());
        store.fail_begin(false);

        store.fail_ping(true);
        assert!(store.ping().await.is_err());
        assert!(store.begin().await.is_ok());
        store.fail_ping(false);

        store.fail_record_login(true);
        store.fail_upgrade_hash(true);
        let mut tx = store.begin().await.unwrap();
        assert!(tx.record_login("bob", Utc::now()).await.is_err());
        assert!(tx.upgrade_hash("bob", "$2a$04$new", Utc::now()).await.is_err());
        assert!(tx.users().await.is_ok());
        tx.rollback().await.unwrap();
        store.fail_record_login(false);
        store.fail_upgrade_hash(false);

        store.fail_queries(true);
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.users().await,
            Err(StoreError::Unavailable(_))
        ));
        store.fail_queries(false);

        store.fail_commit(true);
        assert!(tx.commit().await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_ordering() {
        let store = MemoryStore::new();
        store.insert_user(user(2, "zed"), "-").unwrap();
        store.insert_user(user(1, "amy"), "-").unwrap();
        store.add_membership(2, 7).unwrap();
        store.add_membership(1, 9).unwrap();
        store.add_membership(1, 3).unwrap();

        let mut tx = store.begin().await.unwrap();
        let users = tx.users().await.unwrap();
        assert_eq!(users[0].username, "amy");
        assert_eq!(users[1].username, "zed");

        let pairs: Vec<(i64, i64)> = tx
            .memberships()
            .await
            .unwrap()
            .into_iter()
            .map(|m| (m.user_id, m.group_id))
            .collect();
        assert_eq!(pairs, vec![(1, 3), (1, 9), (2, 7)]);
    }
}
