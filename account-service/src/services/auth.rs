use std::sync::{Arc, OnceLock};

use validator::ValidateEmail;

use super::error::ServiceError;
use super::jwt::{issue_token, validate_token, Claims, TokenSettings};
use super::repository::{AccountRepository, RepositoryError};
use crate::models::AccountView;
use crate::utils::{
    hash_password, normalize_email, verify_password, Password, PasswordHashString,
};

static DECOY_CREDENTIAL: OnceLock<Option<PasswordHashString>> = OnceLock::new();

/// A real argon2 credential no account holds. Verifying against it on the
/// unknown-email path keeps its cost in line with a password mismatch.
fn decoy_credential() -> Option<&'static PasswordHashString> {
    DECOY_CREDENTIAL
        .get_or_init(|| hash_password(&Password::new("decoy-credential".to_string())).ok())
        .as_ref()
}

/// Result of a successful login
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_in: i64,
    pub account: AccountView,
}

/// Turns credentials into bearer tokens and checks presented tokens.
#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn AccountRepository>,
    tokens: TokenSettings,
}

impl AuthService {
    pub fn new(repo: Arc<dyn AccountRepository>, tokens: TokenSettings) -> Self {
        Self { repo, tokens }
    }

    pub fn token_settings(&self) -> &TokenSettings {
        &self.tokens
    }

    /// Every rejection is the same `InvalidCredentials` to the caller; the
    /// reason is only logged.
    #[tracing::instrument(skip_all)]
    pub async fn login(&self, email: &str, password: Password) -> Result<LoginOutcome, ServiceError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            tracing::warn!("Login rejected: missing email or password");
            return Err(ServiceError::InvalidCredentials);
        }
        if !email.validate_email() {
            tracing::warn!("Login rejected: malformed email");
            return Err(ServiceError::InvalidCredentials);
        }

        let account = match self.repo.find_by_email(&email).await {
            Ok(account) => account,
            Err(RepositoryError::NotFound) => {
                let _ = tokio::task::spawn_blocking(move || {
                    if let Some(decoy) = decoy_credential() {
                        verify_password(&password, decoy);
                    }
                })
                .await;
                tracing::warn!("Login rejected: no live account for email");
                return Err(ServiceError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let stored = PasswordHashString::new(account.credential.clone());
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| ServiceError::HashingFailure(e.to_string()))?;
        if !matches {
            tracing::warn!(account_id = %account.id_hex(), "Login rejected: password mismatch");
            return Err(ServiceError::InvalidCredentials);
        }

        let view = account.view();
        let token = issue_token(&view.id, self.tokens.secret(), self.tokens.ttl())?;

        tracing::info!(account_id = %view.id, "Login succeeded");
        Ok(LoginOutcome {
            token,
            expires_in: self.tokens.expires_in_seconds(),
            account: view,
        })
    }

    /// Validates a presented bearer token against the configured secret.
    pub fn authenticate(&self, token: &str) -> Result<Claims, ServiceError> {
        Ok(validate_token(token, self.tokens.secret())?)
    }
}
