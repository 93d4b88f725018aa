//! Session credentials, redacted secrets, and the token payload inspector.

pub mod claims;
pub mod credentials;
pub mod secret;

pub use claims::*;
pub use credentials::*;
pub use secret::*;
