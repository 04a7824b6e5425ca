//! Error types for rooms and command handling.

use thiserror::Error;
use tictac_core::{BoardError, ProtocolError, Reply, RoomId, Tag};

/// Rejections from room membership, seating and gameplay.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RoomError {
    /// `JOIN` by an existing member.
    #[error("member already in room")]
    AlreadyMember,
    /// The caller has not joined the room.
    #[error("member not in room")]
    NotMember,
    /// The caller already holds a seat.
    #[error("member already in a seat")]
    AlreadySeated,
    /// Both seats are taken.
    #[error("no free seat")]
    NoFreeSeat,
    /// The action needs a seat the caller does not hold.
    #[error("member not in a seat")]
    NotSeated,
    /// The board refused the move.
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Everything that can turn a command into an `ERRO` reply.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The frame did not decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The room refused the command.
    #[error(transparent)]
    Room(#[from] RoomError),
    /// No open room has this id.
    #[error("room {0} does not exist")]
    RoomNotFound(RoomId),
    /// `max_rooms_per_connection` reached.
    #[error("connected to too many rooms")]
    TooManyRooms,
    /// Hub state contradicted itself. Reported, never panicked on.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Protocol(err) => err.error_kind(),
            Self::Room(RoomError::Board(_)) => "board",
            Self::Room(_) => "room",
            Self::RoomNotFound(_) => "room_not_found",
            Self::TooManyRooms => "too_many_rooms",
            Self::Internal(_) => "internal",
        }
    }

    /// The `ERRO` reply for this error. Protocol errors carry their own tag.
    pub fn to_reply(&self, tag: Option<Tag>) -> Reply {
        match self {
            Self::Protocol(err) => Reply::from(err),
            other => Reply::error(tag, other.to_string()),
        }
    }
}

/// The hub task has stopped and no longer accepts events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("hub is not running")]
pub struct HubClosed;
