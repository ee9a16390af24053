//! Accounts, password hashing and bearer tokens.

pub mod credentials;
pub mod password;
pub mod token;

pub use credentials::{CredentialError, CredentialStore, NewUser};
pub use token::{Claims, TokenError, TokenService};
