use super::entry::DirectoryEntry;
use async_trait::async_trait;
use ldap3_proto::proto::{LdapResultCode, LdapSearchRequest};
use secrecy::SecretString;
use tokio::io::AsyncWrite;

/// The only result codes the directory ever reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    InvalidCredentials,
    OperationsError,
}

impl From<ResultCode> for LdapResultCode {
    fn from(code: ResultCode) -> Self {
        match code {
            ResultCode::Success => Self::Success,
            ResultCode::InvalidCredentials => Self::InvalidCredentials,
            ResultCode::OperationsError => Self::OperationsError,
        }
    }
}

/// Full candidate set for a search; scope and filter are applied by the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub code: ResultCode,
    pub entries: Vec<DirectoryEntry>,
}

impl SearchResult {
    #[must_use]
    pub const fn success(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            code: ResultCode::Success,
            entries,
        }
    }

    #[must_use]
    pub const fn failed(code: ResultCode) -> Self {
        Self {
            code,
            entries: Vec::new(),
        }
    }
}

/// Transport handed to [`Backend::close`].
pub type Connection = dyn AsyncWrite + Send + Unpin;

/// Callbacks the protocol engine drives for every connection.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Authenticate `identity`; an empty identity and credential is an anonymous bind.
    async fn bind(&self, identity: &str, credential: SecretString) -> ResultCode;

    /// Produce every entry visible to `bound_identity`.
    async fn search(&self, bound_identity: &str, request: &LdapSearchRequest) -> SearchResult;

    /// Release the transport once the client is gone.
    ///
    /// # Errors
    /// Returns the transport error if shutting it down fails.
    async fn close(&self, bound_identity: &str, connection: &mut Connection)
        -> std::io::Result<()>;
}
