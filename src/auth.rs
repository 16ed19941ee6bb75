//! Auth-domain identifiers, credentials, and the session lifecycle.

pub mod id;
pub mod session;
pub mod token;

pub use id::*;
pub use session::*;
pub use token::{credential::*, secret::*};
