use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Account, AccountPatch, AccountView, NewAccount};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Account not found")]
    NotFound,

    #[error("An active account already uses this email")]
    DuplicateKey,

    #[error("Storage operation timed out")]
    Timeout,

    #[error("Storage error: {0}")]
    Backend(String),
}

/// Storage capability for accounts. Every operation sees live accounts only;
/// soft-deleted records are invisible.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<AccountView>, RepositoryError>;

    /// Malformed ids resolve to `NotFound`.
    async fn find_by_id(&self, id: &str) -> Result<AccountView, RepositoryError>;

    /// Full record including the stored credential, for verification only.
    async fn find_by_email(&self, email: &str) -> Result<Account, RepositoryError>;

    /// Assigns the id and timestamps. A second live account with the same
    /// email is rejected with `DuplicateKey`.
    async fn create(&self, account: NewAccount) -> Result<AccountView, RepositoryError>;

    async fn update(&self, id: &str, patch: AccountPatch) -> Result<AccountView, RepositoryError>;

    /// Sets `deleted_at`. A second call finds nothing live and returns `NotFound`.
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;

    /// Backend reachability, used by the health endpoint.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
