use std::sync::Arc;

use validator::Validate;

use super::error::ServiceError;
use super::repository::{AccountRepository, RepositoryError};
use crate::models::{AccountPatch, AccountView, NewAccount};
use crate::utils::{hash_password, normalize_email, normalize_optional, Password};

pub struct CreateAccountInput {
    pub name: String,
    pub email: String,
    pub password: Password,
}

/// `None` and blank values mean "leave unchanged".
#[derive(Default)]
pub struct UpdateAccountInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<Password>,
}

#[derive(Validate)]
struct NewAccountFields {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    name: String,
    #[validate(email(message = "Invalid email format"))]
    email: String,
    #[validate(length(
        min = 8,
        message = "Password must be at least 8 characters"
    ))]
    password: String,
}

#[derive(Validate)]
struct AccountChanges {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    email: Option<String>,
    #[validate(length(
        min = 8,
        message = "Password must be at least 8 characters"
    ))]
    password: Option<String>,
}

fn require_id(id: &str) -> Result<&str, ServiceError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ServiceError::ValidationFailed("Account id is required".to_string()));
    }
    Ok(id)
}

/// Hashing is CPU-bound; keep it off the async workers.
async fn hash_off_thread(password: Password) -> Result<String, ServiceError> {
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::HashingFailure(e.to_string()))??;
    Ok(hashed.into_string())
}

/// Account lifecycle: create, read, update, soft-delete.
#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self { repo }
    }

    #[tracing::instrument(skip_all)]
    pub async fn create(&self, input: CreateAccountInput) -> Result<AccountView, ServiceError> {
        let fields = NewAccountFields {
            name: input.name.trim().to_string(),
            email: normalize_email(&input.email),
            password: input.password.as_str().to_string(),
        };
        fields.validate()?;

        // Advisory only: the unique index decides races, surfacing as DuplicateKey.
        match self.repo.find_by_email(&fields.email).await {
            Ok(_) => return Err(ServiceError::AlreadyExists),
            Err(RepositoryError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let credential = hash_off_thread(input.password).await?;
        let view = self
            .repo
            .create(NewAccount {
                name: fields.name,
                email: fields.email,
                credential,
            })
            .await?;

        tracing::info!(account_id = %view.id, "Account created");
        Ok(view)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<AccountView, ServiceError> {
        Ok(self.repo.find_by_id(require_id(id)?).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<AccountView>, ServiceError> {
        Ok(self.repo.find_all().await?)
    }

    #[tracing::instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: &str,
        input: UpdateAccountInput,
    ) -> Result<AccountView, ServiceError> {
        let current = self.repo.find_by_id(require_id(id)?).await?;

        let changes = AccountChanges {
            name: normalize_optional(input.name),
            email: normalize_optional(input.email).map(|e| e.to_lowercase()),
            password: input
                .password
                .as_ref()
                .filter(|p| !p.is_empty())
                .map(|p| p.as_str().to_string()),
        };
        changes.validate()?;

        if let Some(email) = &changes.email {
            match self.repo.find_by_email(email).await {
                Ok(existing) if existing.id_hex() != current.id => {
                    return Err(ServiceError::AlreadyExists);
                }
                Ok(_) | Err(RepositoryError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let credential = match changes.password {
            Some(plain) => Some(hash_off_thread(Password::new(plain)).await?),
            None => None,
        };

        let view = self
            .repo
            .update(
                &current.id,
                AccountPatch {
                    name: changes.name,
                    email: changes.email,
                    credential,
                },
            )
            .await?;

        tracing::info!(account_id = %view.id, "Account updated");
        Ok(view)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let id = require_id(id)?;
        self.repo.find_by_id(id).await?;
        self.repo.delete(id).await?;

        tracing::info!(account_id = %id, "Account deleted");
        Ok(())
    }
}
