//! Common types shared by the delay monitor crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
