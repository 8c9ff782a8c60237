pub mod password;
pub mod validation;

pub use password::{hash_password, verify_password, CredentialError, Password, PasswordHashString};
pub use validation::{normalize_email, normalize_optional, JsonBody};
