//! # tictac-server
//!
//! Axum HTTP + `WebSocket` server for tictac rooms.
//!
//! - [`hub`]: the single task that owns every connection and room
//! - [`room`]: membership, seats and move fan-out within one room
//! - [`websocket`]: per-connection queues, heartbeat and session loops
//! - [`server`]: router, `/health`, `/ws` upgrade and graceful shutdown

#![deny(unsafe_code)]

pub mod errors;
pub mod health;
pub mod hub;
pub mod room;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use errors::{CommandError, HubClosed, RoomError};
pub use hub::{Clock, Hub, HubEvent, HubHandle, HubStats, SystemClock};
pub use room::{Room, RoomSnapshot};
pub use server::{AppState, TictacServer};
pub use shutdown::ShutdownCoordinator;
