//! # tictac-core
//!
//! Transport-free building blocks of the tictac room server:
//!
//! - [`board`]: 3×3 grids, the meta board, and the shared win routine
//! - [`frame`]: `:`-delimited, `\`-escaped text frames
//! - [`command`]: typed inbound commands and outbound replies
//! - [`ids`]: connection and room identifiers
//! - [`errors`]: board and protocol errors
//!
//! Nothing here performs I/O or holds locks.

#![deny(unsafe_code)]

pub mod board;
pub mod command;
pub mod errors;
pub mod frame;
pub mod ids;

pub use board::{
    Board, BoardSnapshot, BoardVariant, Cell, GameStatus, Grid, Location, MetaBoard, Seat, Token,
};
pub use command::{Command, Reply, Tag};
pub use errors::{BoardError, InvalidLocation, ProtocolError, UnknownVariant};
pub use ids::{ConnectionId, InvalidRoomId, RoomId};
