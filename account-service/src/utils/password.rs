use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

/// Algorithm tag prepended to every stored credential.
pub const ARGON2_TAG: &str = "argon2";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to hash password: {0}")]
    Hashing(String),
}

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Stored credential in `<tag>$<payload>` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Splits off the algorithm tag. `None` when the value carries no tag.
    pub fn split_tag(&self) -> Option<(&str, &str)> {
        self.0.split_once('$')
    }
}

/// Hash a password using Argon2
///
/// Uses Argon2id with default parameters and a fresh random salt, then tags
/// the PHC string so later algorithm migrations stay distinguishable.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, CredentialError> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let phc = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| CredentialError::Hashing(e.to_string()))?
        .to_string();

    Ok(PasswordHashString::new(format!("{}${}", ARGON2_TAG, phc)))
}

/// Verify a password against a stored credential
///
/// Unrecognized tags and unparsable payloads count as a mismatch. Argon2
/// compares digests in constant time.
pub fn verify_password(password: &Password, stored: &PasswordHashString) -> bool {
    match stored.split_tag() {
        Some((ARGON2_TAG, phc)) => match PasswordHash::new(phc) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_str().as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential has a malformed argon2 payload");
                false
            }
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_tagged() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(hash.as_str().starts_with("argon2$$argon2id$"));
        assert!(!hash.as_str().contains("mySecurePassword123"));
    }

    #[test]
    fn test_verify_password_correct() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(verify_password(&password, &hash));
    }

    #[test]
    fn test_verify_password_incorrect() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        let wrong_password = Password::new("mySecurePassword124".to_string());
        assert!(!verify_password(&wrong_password, &hash));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash1 = hash_password(&password).expect("Failed to hash password");
        let hash2 = hash_password(&password).expect("Failed to hash password");

        assert_ne!(hash1.as_str(), hash2.as_str());
        assert!(verify_password(&password, &hash1));
        assert!(verify_password(&password, &hash2));
    }

    #[test]
    fn test_unknown_tag_is_a_mismatch() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");
        let (_, phc) = hash.split_tag().unwrap();

        let bcrypt_tagged = PasswordHashString::new(format!("bcrypt${}", phc));
        assert!(!verify_password(&password, &bcrypt_tagged));

        let untagged = PasswordHashString::new("mySecurePassword123".to_string());
        assert!(!verify_password(&password, &untagged));
    }

    #[test]
    fn test_garbage_payload_is_a_mismatch() {
        let password = Password::new("mySecurePassword123".to_string());
        let stored = PasswordHashString::new("argon2$not-a-phc-string".to_string());

        assert!(!verify_password(&password, &stored));
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let password = Password::new("hunter2hunter2".to_string());
        assert_eq!(format!("{:?}", password), "Password(***)");
    }
}
