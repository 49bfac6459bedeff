// Department Agent Chat - API Core
//
// Hosts live chat sessions with department agents for browser clients.
// Sessions stream their answers over SSE and live in memory only.

pub mod config;
pub mod domains;
pub mod server;

pub use config::*;
