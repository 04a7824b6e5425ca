//! Error types for the board engine and the command protocol.

use crate::board::BoardVariant;
use crate::command::Tag;
use crate::ids::InvalidRoomId;

/// Rejections from the board engine. None of these mutate the board.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// The target cell already holds a token.
    #[error("cell is occupied")]
    CellOccupied,
    /// The targeted sub-board of a meta board already has a winner.
    #[error("sub-board is already decided")]
    SubBoardDecided,
    /// The board has a winner or is full.
    #[error("game is already over")]
    GameOver,
    /// A flat location was played on a meta board or vice versa.
    #[error("location does not fit a {expected} board")]
    LocationMismatch {
        /// Variant of the board that was played on.
        expected: BoardVariant,
    },
}

/// A board location that could not be parsed or lies outside the grid.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid location: {0}")]
pub struct InvalidLocation(
    /// The offending input.
    pub String,
);

/// Unrecognized board variant name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown board variant: {0}")]
pub struct UnknownVariant(
    /// The name as given.
    pub String,
);

/// Errors raised while decoding an inbound command frame.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Blank frame.
    #[error("empty command")]
    Empty,
    /// Field 0 is not an inbound tag.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// Known tag, wrong number of fields.
    #[error("{0} command malformed")]
    Malformed(Tag),
    /// The room field did not parse.
    #[error("{source}")]
    InvalidRoomId {
        /// Command the room id belonged to.
        tag: Tag,
        /// Underlying parse failure.
        #[source]
        source: InvalidRoomId,
    },
    /// A `PLAY` location that did not parse.
    #[error(transparent)]
    InvalidLocation(#[from] InvalidLocation),
}

impl ProtocolError {
    /// The command tag the error belongs to, when one could be identified.
    pub fn tag(&self) -> Option<Tag> {
        match self {
            Self::Empty | Self::UnknownCommand(_) => None,
            Self::Malformed(tag) | Self::InvalidRoomId { tag, .. } => Some(*tag),
            Self::InvalidLocation(_) => Some(Tag::Play),
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::UnknownCommand(_) => "unknown_command",
            Self::Malformed(_) => "malformed",
            Self::InvalidRoomId { .. } => "invalid_room_id",
            Self::InvalidLocation(_) => "invalid_location",
        }
    }
}
