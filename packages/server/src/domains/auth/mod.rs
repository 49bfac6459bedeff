//! Auth domain - verifies the bearer tokens issued by the identity provider.
//!
//! The chat core never sees credentials: requests either carry a valid token
//! and become an `AuthUser`, or they are treated as anonymous.

pub mod jwt;

pub use jwt::{Claims, JwtService};
