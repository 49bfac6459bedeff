// HTTP routes
pub mod agents;
pub mod health;
pub mod sessions;
pub mod stream;

pub use agents::*;
pub use health::*;
pub use sessions::*;
pub use stream::*;
