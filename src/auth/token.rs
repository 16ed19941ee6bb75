//! Credential model and secret wrappers.

pub mod credential;
pub mod secret;
