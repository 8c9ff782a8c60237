use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use std::sync::{Mutex, MutexGuard};

use super::repository::{AccountRepository, RepositoryError};
use crate::models::{Account, AccountPatch, AccountView, NewAccount};

/// In-process account store. Uniqueness of live emails is checked and the
/// insert applied under one lock, matching the partial unique index.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: Mutex<Vec<Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Account>>, RepositoryError> {
        self.accounts
            .lock()
            .map_err(|_| RepositoryError::Backend("account store mutex poisoned".to_string()))
    }

    /// Every record, soft-deleted ones included.
    pub fn snapshot(&self) -> Result<Vec<Account>, RepositoryError> {
        Ok(self.lock()?.clone())
    }
}

fn parse_id(id: &str) -> Result<ObjectId, RepositoryError> {
    ObjectId::parse_str(id).map_err(|_| RepositoryError::NotFound)
}

fn live_position(accounts: &[Account], id: ObjectId) -> Option<usize> {
    accounts
        .iter()
        .position(|a| a.is_live() && a.id == Some(id))
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_all(&self) -> Result<Vec<AccountView>, RepositoryError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|a| a.is_live())
            .map(Account::view)
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<AccountView, RepositoryError> {
        let id = parse_id(id)?;
        let accounts = self.lock()?;
        live_position(&accounts, id)
            .map(|idx| accounts[idx].view())
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Account, RepositoryError> {
        self.lock()?
            .iter()
            .find(|a| a.is_live() && a.email == email)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn create(&self, account: NewAccount) -> Result<AccountView, RepositoryError> {
        let mut accounts = self.lock()?;
        if accounts
            .iter()
            .any(|a| a.is_live() && a.email == account.email)
        {
            return Err(RepositoryError::DuplicateKey);
        }

        let mut record = Account::from_new(account, Utc::now());
        record.id = Some(ObjectId::new());
        let view = record.view();
        accounts.push(record);
        Ok(view)
    }

    async fn update(&self, id: &str, patch: AccountPatch) -> Result<AccountView, RepositoryError> {
        let id = parse_id(id)?;
        let mut accounts = self.lock()?;
        let idx = live_position(&accounts, id).ok_or(RepositoryError::NotFound)?;

        if let Some(email) = &patch.email {
            let taken = accounts
                .iter()
                .any(|a| a.is_live() && a.id != Some(id) && &a.email == email);
            if taken {
                return Err(RepositoryError::DuplicateKey);
            }
        }

        patch.apply_to(&mut accounts[idx], Utc::now());
        Ok(accounts[idx].view())
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let id = parse_id(id)?;
        let mut accounts = self.lock()?;
        let idx = live_position(&accounts, id).ok_or(RepositoryError::NotFound)?;

        let now = Utc::now();
        accounts[idx].deleted_at = Some(now);
        accounts[idx].updated_at = now;
        Ok(())
    }
}
