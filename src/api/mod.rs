//! HTTP API for Border Maker
//!
//! Upload, listing and deletion endpoints, static serving of stored images,
//! gallery and settings state, rendered previews, and a WebSocket feed of
//! state changes.

pub mod routes;
pub mod server;
pub mod shared;
pub mod types;
pub mod websocket;

pub use routes::create_router;
pub use server::run_server;
pub use shared::{create_shared_state, SharedState, SharedStateHandle};
pub use types::*;
