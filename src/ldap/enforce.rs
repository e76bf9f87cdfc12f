//! Search result enforcement.
//!
//! The directory hands back every entry it knows about; this module narrows
//! that set to what the request asked for (base and scope, filter, attribute
//! list, `typesOnly` and size limit) and turns it into wire entries.

use crate::directory::DirectoryEntry;
use ldap3_proto::proto::{
    LdapFilter, LdapPartialAttribute, LdapSearchRequest, LdapSearchResultEntry, LdapSearchScope,
    LdapSubstringFilter,
};

const ALL_ATTRIBUTES: &str = "*";
const NO_ATTRIBUTES: &str = "1.1";

/// Lowercase the DN and drop whitespace around RDN separators.
fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| match rdn.split_once('=') {
            Some((attr, value)) => format!("{}={}", attr.trim(), value.trim()),
            None => rdn.trim().to_string(),
        })
        .filter(|rdn| !rdn.is_empty())
        .collect::<Vec<_>>()
        .join(",")
        .to_lowercase()
}

fn is_descendant(dn: &str, base: &str) -> bool {
    (base.is_empty() && !dn.is_empty()) || dn.ends_with(&format!(",{base}"))
}

fn parent(dn: &str) -> &str {
    dn.split_once(',').map_or("", |(_, rest)| rest)
}

#[must_use]
pub fn in_scope(dn: &str, base: &str, scope: &LdapSearchScope) -> bool {
    let dn = normalize_dn(dn);
    let base = normalize_dn(base);

    match scope {
        LdapSearchScope::Base => dn == base,
        LdapSearchScope::OneLevel => parent(&dn) == base,
        LdapSearchScope::Subtree => dn == base || is_descendant(&dn, &base),
        // children
        _ => is_descendant(&dn, &base),
    }
}

fn substring_match(value: &str, filter: &LdapSubstringFilter) -> bool {
    let value = value.to_lowercase();
    let mut rest = value.as_str();

    if let Some(initial) = &filter.initial {
        match rest.strip_prefix(initial.to_lowercase().as_str()) {
            Some(tail) => rest = tail,
            None => return false,
        }
    }

    for any in &filter.any {
        let any = any.to_lowercase();
        match rest.find(any.as_str()) {
            Some(at) => rest = &rest[at + any.len()..],
            None => return false,
        }
    }

    filter
        .final_
        .as_ref()
        .map_or(true, |last| rest.ends_with(last.to_lowercase().as_str()))
}

/// Evaluate `filter` against `entry`; unsupported filter types match nothing.
#[must_use]
pub fn matches(filter: &LdapFilter, entry: &DirectoryEntry) -> bool {
    match filter {
        LdapFilter::And(filters) => filters.iter().all(|f| matches(f, entry)),
        LdapFilter::Or(filters) => filters.iter().any(|f| matches(f, entry)),
        LdapFilter::Not(filter) => !matches(filter, entry),
        LdapFilter::Present(attr) => {
            attr.eq_ignore_ascii_case("objectClass")
                || entry.values(attr).is_some_and(|values| !values.is_empty())
        }
        LdapFilter::Equality(attr, expected) => entry
            .values(attr)
            .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(expected))),
        LdapFilter::Substring(attr, substrings) => entry
            .values(attr)
            .is_some_and(|values| values.iter().any(|v| substring_match(v, substrings))),
        _ => false,
    }
}

fn wanted(requested: &[String], name: &str) -> bool {
    requested.is_empty()
        || requested
            .iter()
            .any(|attr| attr == ALL_ATTRIBUTES || attr.eq_ignore_ascii_case(name))
}

/// Project an entry onto the requested attributes.
#[must_use]
pub fn select(entry: &DirectoryEntry, requested: &[String], types_only: bool) -> LdapSearchResultEntry {
    let only_dn = requested.len() == 1 && requested[0] == NO_ATTRIBUTES;

    let attributes = entry
        .attributes
        .iter()
        .filter(|attribute| !only_dn && wanted(requested, attribute.name))
        .filter(|attribute| types_only || !attribute.values.is_empty())
        .map(|attribute| LdapPartialAttribute {
            atype: attribute.name.to_string(),
            vals: if types_only {
                Vec::new()
            } else {
                attribute
                    .values
                    .iter()
                    .map(|value| value.as_bytes().to_vec())
                    .collect()
            },
        })
        .collect();

    LdapSearchResultEntry {
        dn: entry.dn.clone(),
        attributes,
    }
}

/// Apply scope, filter, attribute selection and size limit to `entries`.
#[must_use]
pub fn apply(request: &LdapSearchRequest, entries: &[DirectoryEntry]) -> Vec<LdapSearchResultEntry> {
    let limit = usize::try_from(request.sizelimit)
        .ok()
        .filter(|limit| *limit > 0)
        .unwrap_or(usize::MAX);

    entries
        .iter()
        .filter(|entry| in_scope(&entry.dn, &request.base, &request.scope))
        .filter(|entry| matches(&request.filter, entry))
        .take(limit)
        .map(|entry| select(entry, &request.attrs, request.typesonly))
        .collect()
}
