//! Sessions domain - live chat sessions hosted for HTTP clients.
//!
//! Sessions live in memory only. Each belongs to the user who created it;
//! removing one, or closing its last open stream, discards its transcript
//! and cancels any in-flight turn.

pub mod registry;

pub use registry::{RegistryError, SessionRegistry, ViewerGuard};
