use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token signature is invalid")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Token is malformed")]
    Malformed,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Claims carried by a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signing secret and lifetime, loaded once at startup and handed to each
/// issue/validate call.
#[derive(Clone)]
pub struct TokenSettings {
    secret: Secret<String>,
    ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: Secret<String>, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    pub fn secret(&self) -> &Secret<String> {
        &self.secret
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Token lifetime in seconds (for client info)
    pub fn expires_in_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"***")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Sign an HS256 token for `subject` valid from now until now + `ttl`.
pub fn issue_token(
    subject: &str,
    secret: &Secret<String>,
    ttl: Duration,
) -> Result<String, TokenError> {
    let key = secret.expose_secret();
    if key.is_empty() {
        return Err(TokenError::Signing("signing secret is empty".to_string()));
    }
    if ttl <= Duration::zero() {
        return Err(TokenError::Signing("token lifetime must be positive".to_string()));
    }

    let now = Utc::now();
    let exp = now
        .checked_add_signed(ttl)
        .ok_or_else(|| TokenError::Signing("token lifetime overflows".to_string()))?;

    let claims = Claims {
        sub: subject.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(key.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Verify the signature against `secret` and require `exp` in the future.
pub fn validate_token(token: &str, secret: &Secret<String>) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
        _ => TokenError::Invalid,
    })?;

    // jsonwebtoken accepts exp == now; a token is only good strictly before it.
    if token_data.claims.exp <= Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(token_data.claims)
}
