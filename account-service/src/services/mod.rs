pub mod account;
pub mod auth;
pub mod database;
pub mod error;
pub mod jwt;
pub mod memory;
pub mod repository;

pub use account::{AccountService, CreateAccountInput, UpdateAccountInput};
pub use auth::{AuthService, LoginOutcome};
pub use database::{live_filter, MongoAccountRepository, MongoDb};
pub use error::ServiceError;
pub use jwt::{issue_token, validate_token, Claims, TokenError, TokenSettings};
pub use memory::InMemoryAccountRepository;
pub use repository::{AccountRepository, RepositoryError};
