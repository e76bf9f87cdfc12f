//! Bind (authentication) handling.
//!
//! ```text
//! empty identity + empty credential ----------------------------> Success
//! otherwise parse "uid=<username>,<container>" -- malformed ----> InvalidCredentials
//!   begin transaction ----------------------------- failure ----> OperationsError
//!   credential lookup -- not found ---------------------------+
//!                    \-- store failure -----------------------|-> OperationsError
//!   disabled ------------------------------------------------+
//!   verify password -- mismatch / unusable hash -------------+-> rollback -> InvalidCredentials
//!   record login, upgrade legacy hash (advisory)
//!   commit ---------------------------------------- failure ----> OperationsError
//!                                                    ok ------> Success
//! ```
//!
//! Every rejection looks the same on the wire; the reason only goes to the log.

use super::{backend::ResultCode, dn::parse_bind_dn};
use crate::{
    password::{Hasher, PasswordError, Verification},
    store::{Store, StoreError, Transaction},
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::task::{self, JoinError};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Error)]
enum BindError {
    #[error("no such user")]
    UnknownUser,

    #[error("account disabled")]
    Disabled,

    #[error("wrong password")]
    WrongPassword,

    #[error("stored password hash is unusable: {0}")]
    UnusableHash(#[source] PasswordError),

    #[error(transparent)]
    Store(StoreError),

    #[error("password verification task failed: {0}")]
    Task(#[from] JoinError),
}

impl From<StoreError> for BindError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            Self::UnknownUser
        } else {
            Self::Store(err)
        }
    }
}

impl BindError {
    const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnknownUser | Self::Disabled | Self::WrongPassword | Self::UnusableHash(_)
        )
    }
}

/// Run a bind against `store`.
#[instrument(name = "ldap.bind", skip_all, fields(identity = %identity))]
pub(crate) async fn bind(
    store: &dyn Store,
    hasher: Hasher,
    identity: &str,
    credential: SecretString,
) -> ResultCode {
    if identity.is_empty() && credential.expose_secret().is_empty() {
        info!("anonymous bind");
        return ResultCode::Success;
    }

    let username = match parse_bind_dn(identity) {
        Ok(parsed) => parsed.username,
        Err(err) => {
            warn!("bind rejected: could not parse username: {err}");
            return ResultCode::InvalidCredentials;
        }
    };

    // RFC 4513 5.1.2: a name with an empty password is an unauthenticated bind
    if credential.expose_secret().is_empty() {
        warn!(username, "bind rejected: empty password");
        return ResultCode::InvalidCredentials;
    }

    let mut tx = match store.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!(username, "could not start bind transaction: {err}");
            return ResultCode::OperationsError;
        }
    };

    match authenticate(tx.as_mut(), hasher, username, credential).await {
        Ok(()) => match tx.commit().await {
            Ok(()) => {
                info!(username, "bind success");
                ResultCode::Success
            }
            Err(err) => {
                error!(username, "could not commit bind transaction: {err}");
                ResultCode::OperationsError
            }
        },
        Err(err) if err.is_rejection() => {
            warn!(username, "bind rejected: {err}");
            match tx.rollback().await {
                Ok(()) => ResultCode::InvalidCredentials,
                Err(err) => {
                    error!(username, "could not roll back bind transaction: {err}");
                    ResultCode::OperationsError
                }
            }
        }
        Err(err) => {
            error!(username, "bind failed: {err}");
            if let Err(err) = tx.rollback().await {
                error!(username, "could not roll back bind transaction: {err}");
            }
            ResultCode::OperationsError
        }
    }
}

async fn authenticate(
    tx: &mut dyn Transaction,
    hasher: Hasher,
    username: &str,
    credential: SecretString,
) -> Result<(), BindError> {
    let account = tx.credential(username).await?;
    if account.disabled {
        return Err(BindError::Disabled);
    }

    let stored = account.password_hash;
    let (credential, verification) = task::spawn_blocking(move || {
        let verification = hasher.verify(&credential, &stored);
        (credential, verification)
    })
    .await?;

    let Verification {
        valid,
        needs_rehash,
    } = verification.map_err(BindError::UnusableHash)?;
    if !valid {
        return Err(BindError::WrongPassword);
    }

    let now = Utc::now();
    if let Err(err) = tx.record_login(username, now).await {
        warn!(username, "could not record last login: {err}");
    }

    if needs_rehash {
        match task::spawn_blocking(move || hasher.hash(&credential)).await? {
            Ok(hash) => match tx.upgrade_hash(username, &hash, now).await {
                Ok(()) => info!(username, "upgraded legacy password hash"),
                Err(err) => warn!(username, "could not store upgraded password hash: {err}"),
            },
            Err(err) => warn!(username, "could not rehash legacy password: {err}"),
        }
    }

    Ok(())
}
