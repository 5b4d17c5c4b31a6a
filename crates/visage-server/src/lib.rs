//! WebSocket protocol front end: one persistent connection per client,
//! binary frames for uploads and rendered frames, text frames for edit
//! requests and structured errors.

pub mod connection;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use handlers::HandlerState;
pub use server::{build_router, start, ServerConfig, ServerHandle};
