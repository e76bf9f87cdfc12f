use super::{
    backend::{ResultCode, SearchResult},
    config::DirectoryConfig,
    entry::{group_to_entry, user_to_entry, DirectoryEntry},
};
use crate::{
    model::{Group, Membership, User},
    store::{Store, StoreError, Transaction},
};
use ldap3_proto::proto::LdapSearchRequest;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

/// Attach memberships to users and groups in one pass over the association rows.
pub(crate) fn join(users: &mut [User], groups: &mut [Group], memberships: &[Membership]) {
    let user_index: HashMap<i64, usize> = users
        .iter()
        .enumerate()
        .map(|(index, user)| (user.id, index))
        .collect();
    let group_index: HashMap<i64, usize> = groups
        .iter()
        .enumerate()
        .map(|(index, group)| (group.id, index))
        .collect();

    for membership in memberships {
        let (Some(&u), Some(&g)) = (
            user_index.get(&membership.user_id),
            group_index.get(&membership.group_id),
        ) else {
            warn!(
                user_id = membership.user_id,
                group_id = membership.group_id,
                "skipping membership that references a missing user or group"
            );
            continue;
        };

        users[u].groups.push(groups[g].name.clone());
        groups[g].members.push(users[u].username.clone());
    }
}

async fn snapshot(
    tx: &mut dyn Transaction,
    config: &DirectoryConfig,
) -> Result<Vec<DirectoryEntry>, StoreError> {
    let mut users = tx.users().await?;
    let mut groups = tx.groups().await?;
    let memberships = tx.memberships().await?;
    debug!(
        users = users.len(),
        groups = groups.len(),
        memberships = memberships.len(),
        "loaded directory snapshot"
    );

    join(&mut users, &mut groups, &memberships);

    let mut entries = Vec::with_capacity(users.len() + groups.len());
    entries.extend(users.iter().map(|user| user_to_entry(user, config)));
    entries.extend(groups.iter().map(|group| group_to_entry(group, config)));

    Ok(entries)
}

/// Build every user and group entry from a single transaction.
#[instrument(name = "ldap.search", skip_all, fields(bound = %bound_identity))]
pub(crate) async fn search(
    store: &dyn Store,
    config: &DirectoryConfig,
    bound_identity: &str,
    request: &LdapSearchRequest,
) -> SearchResult {
    info!(
        base = %request.base,
        scope = ?request.scope,
        filter = ?request.filter,
        attrs = ?request.attrs,
        "search"
    );

    let mut tx = match store.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!("could not start search transaction: {err}");
            return SearchResult::failed(ResultCode::OperationsError);
        }
    };

    match snapshot(tx.as_mut(), config).await {
        Ok(entries) => match tx.commit().await {
            Ok(()) => {
                info!(entries = entries.len(), "search complete");
                SearchResult::success(entries)
            }
            Err(err) => {
                error!("could not commit search transaction: {err}");
                SearchResult::failed(ResultCode::OperationsError)
            }
        },
        Err(err) => {
            error!("could not load directory snapshot: {err}");
            if let Err(err) = tx.rollback().await {
                error!("could not roll back search transaction: {err}");
            }
            SearchResult::failed(ResultCode::OperationsError)
        }
    }
}
