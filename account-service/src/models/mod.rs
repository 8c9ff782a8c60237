pub mod account;

pub use account::{Account, AccountPatch, AccountView, NewAccount};
