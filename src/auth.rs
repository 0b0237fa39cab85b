//! Credential models: redacted secrets, the access/refresh pair, and the one-shot retry marker.

pub mod credential;
pub mod marker;
pub mod secret;

pub use credential::*;
pub use marker::*;
pub use secret::*;
