//! HTTP and `WebSocket` front end for the Cartograph workspace.
//!
//! This crate exposes one [`Workspace`](cartograph_core::Workspace) to map
//! clients:
//!
//! - **REST endpoints** for feature edits, layer uploads, sign-in and
//!   sign-out, and state reads
//! - **`WebSocket` endpoint** (`/ws`) that replays the render surface to a
//!   new client, then streams render commands, store changes, and notices;
//!   clients send their surface edit events back on the same socket
//!
//! # Architecture
//!
//! The workspace runs on its own task and owns all feature state. Handlers
//! never touch it directly: they send a
//! [`Request`](cartograph_core::Request) down the command channel and await
//! the reply. Outbound streams are broadcast channels, so every connected
//! client sees the same sequence.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::{StartupError, spawn_server, spawn_workspace};
pub use state::AppState;
