//! LDAP wire front-end.
//!
//! Framing and BER come from `ldap3_proto`; this module owns the accept loop,
//! per-connection state and the narrowing of search results.

pub mod enforce;
pub mod server;

pub use self::server::serve;
