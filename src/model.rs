//! Domain records returned by the service and handed to the host.

pub mod book;
pub mod highlight;
pub mod reading;
pub mod user;

pub use book::*;
pub use highlight::*;
pub use reading::*;
pub use user::*;
