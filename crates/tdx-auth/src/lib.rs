//! TDX OAuth client-credentials authentication
//!
//! Owns the single application identity's access token. The token is
//! obtained with a client-credentials grant, cached until shortly before it
//! expires, and re-acquired transparently on the next request after that.
//!
//! Credential flow:
//! 1. Caller asks `CredentialManager::token()` for a bearer token
//! 2. Cached credential still valid → returned without a network call
//! 3. Otherwise `token::exchange_client_credentials()` runs once, shared by
//!    every concurrent caller, and the new credential replaces the old one
//! 4. On failure nothing is installed; the next call tries again

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{ClientConfig, Credential, CredentialManager};
pub use error::{Error, Result};
pub use token::{TokenResponse, exchange_client_credentials};

#[cfg(test)]
mod test_support;
