//! HTTP Handlers

mod generate;
mod outline;
mod ping;
mod project;
mod quota;
mod websocket;

pub use generate::*;
pub use outline::*;
pub use ping::*;
pub use project::*;
pub use quota::*;
pub use websocket::*;
