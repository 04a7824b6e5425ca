//! WebSocket transport: per-connection queues, heartbeat and the session loops.

pub mod connection;
pub mod heartbeat;
pub mod session;
