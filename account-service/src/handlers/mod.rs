pub mod accounts;
pub mod auth;
pub mod fallback;
pub mod health;

pub use accounts::{create_account, delete_account, get_account, list_accounts, update_account};
pub use auth::login;
pub use fallback::{handle_panic, json_method_not_allowed, not_found};
pub use health::health_check;
