//! Typed commands and replies on top of [`crate::frame`].

use std::fmt;
use std::ops::RangeInclusive;

use crate::board::{Location, Seat, Token};
use crate::errors::ProtocolError;
use crate::frame;
use crate::ids::RoomId;

/// Field 0 of every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `MKRM`
    MakeRoom,
    /// `JOIN`
    Join,
    /// `JNSL`
    JoinSeat,
    /// `LEAV`
    Leave,
    /// `LVSL`
    LeaveSeat,
    /// `PLAY`
    Play,
    /// `CHAT`
    Chat,
    /// `STAT`
    Stat,
    /// Reply-only; never accepted inbound.
    Error,
}

impl Tag {
    /// Tags a client may send.
    pub const INBOUND: [Tag; 8] = [
        Tag::MakeRoom,
        Tag::Join,
        Tag::JoinSeat,
        Tag::Leave,
        Tag::LeaveSeat,
        Tag::Play,
        Tag::Chat,
        Tag::Stat,
    ];

    /// Four-letter wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MakeRoom => "MKRM",
            Self::Join => "JOIN",
            Self::JoinSeat => "JNSL",
            Self::Leave => "LEAV",
            Self::LeaveSeat => "LVSL",
            Self::Play => "PLAY",
            Self::Chat => "CHAT",
            Self::Stat => "STAT",
            Self::Error => "ERRO",
        }
    }

    /// Look up an inbound tag. `ERRO` is not a valid inbound command.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::INBOUND.into_iter().find(|tag| tag.as_str() == s)
    }

    /// Accepted total field count, tag included.
    fn arity(self) -> RangeInclusive<usize> {
        match self {
            Self::MakeRoom => 1..=1,
            Self::Join | Self::JoinSeat | Self::Leave | Self::LeaveSeat | Self::Stat => 2..=2,
            Self::Play => 3..=4,
            Self::Chat => 3..=3,
            Self::Error => 0..=0,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded client command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create a room and join it.
    MakeRoom,
    /// Join a room as a spectator.
    Join(RoomId),
    /// Take the lowest free seat.
    JoinSeat(RoomId),
    /// Leave a room entirely.
    Leave(RoomId),
    /// Give up a seat but stay in the room.
    LeaveSeat(RoomId),
    /// Place the caller's token.
    Play {
        /// Target room.
        room: RoomId,
        /// Where to play.
        location: Location,
    },
    /// Send a chat line to the room.
    Chat {
        /// Target room.
        room: RoomId,
        /// Unescaped message body.
        text: String,
    },
    /// Ask for a room snapshot.
    Stat(RoomId),
}

impl Command {
    /// Decode one normalized inbound frame.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let fields = frame::split(raw);
        let head = fields.first().map(String::as_str).unwrap_or_default();
        if head.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let tag = Tag::from_wire(head).ok_or_else(|| ProtocolError::UnknownCommand(head.to_owned()))?;
        if !tag.arity().contains(&fields.len()) {
            return Err(ProtocolError::Malformed(tag));
        }
        if tag == Tag::MakeRoom {
            return Ok(Self::MakeRoom);
        }

        let room = fields[1]
            .parse::<RoomId>()
            .map_err(|source| ProtocolError::InvalidRoomId { tag, source })?;
        let command = match tag {
            Tag::Join => Self::Join(room),
            Tag::JoinSeat => Self::JoinSeat(room),
            Tag::Leave => Self::Leave(room),
            Tag::LeaveSeat => Self::LeaveSeat(room),
            Tag::Stat => Self::Stat(room),
            Tag::Play => {
                let rest: Vec<&str> = fields[2..].iter().map(String::as_str).collect();
                Self::Play {
                    room,
                    location: Location::parse(&rest)?,
                }
            }
            Tag::Chat => Self::Chat {
                room,
                text: fields[2].clone(),
            },
            Tag::MakeRoom | Tag::Error => return Err(ProtocolError::UnknownCommand(head.to_owned())),
        };
        Ok(command)
    }

    /// Tag echoed in replies and errors.
    pub fn tag(&self) -> Tag {
        match self {
            Self::MakeRoom => Tag::MakeRoom,
            Self::Join(_) => Tag::Join,
            Self::JoinSeat(_) => Tag::JoinSeat,
            Self::Leave(_) => Tag::Leave,
            Self::LeaveSeat(_) => Tag::LeaveSeat,
            Self::Play { .. } => Tag::Play,
            Self::Chat { .. } => Tag::Chat,
            Self::Stat(_) => Tag::Stat,
        }
    }

    /// The room a command targets, if any.
    pub fn room(&self) -> Option<RoomId> {
        match self {
            Self::MakeRoom => None,
            Self::Join(room)
            | Self::JoinSeat(room)
            | Self::Leave(room)
            | Self::LeaveSeat(room)
            | Self::Stat(room)
            | Self::Play { room, .. }
            | Self::Chat { room, .. } => Some(*room),
        }
    }
}

/// An outbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// Field 0.
    pub tag: Tag,
    /// Remaining fields, unescaped.
    pub fields: Vec<String>,
}

impl Reply {
    /// A reply with arbitrary fields.
    pub fn new(tag: Tag, fields: Vec<String>) -> Self {
        Self { tag, fields }
    }

    /// `ERRO:<tag>:<message>`, or `ERRO:<message>` when no tag applies.
    pub fn error(tag: Option<Tag>, message: impl Into<String>) -> Self {
        let mut fields = Vec::with_capacity(2);
        if let Some(tag) = tag {
            fields.push(tag.as_str().to_owned());
        }
        fields.push(message.into());
        Self::new(Tag::Error, fields)
    }

    /// `MKRM:<room>`
    pub fn room_made(room: RoomId) -> Self {
        Self::new(Tag::MakeRoom, vec![room.to_string()])
    }

    /// `JOIN:<room>`
    pub fn joined(room: RoomId) -> Self {
        Self::new(Tag::Join, vec![room.to_string()])
    }

    /// `JNSL:<room>:<seat>`
    pub fn seated(room: RoomId, seat: Seat) -> Self {
        Self::new(Tag::JoinSeat, vec![room.to_string(), seat.to_string()])
    }

    /// `LEAV:<room>`
    pub fn left(room: RoomId) -> Self {
        Self::new(Tag::Leave, vec![room.to_string()])
    }

    /// `LVSL:<room>`
    pub fn unseated(room: RoomId) -> Self {
        Self::new(Tag::LeaveSeat, vec![room.to_string()])
    }

    /// `PLAY:<room>:<token>:<location...>`, broadcast to the room.
    pub fn played(room: RoomId, token: Token, location: &Location) -> Self {
        let mut fields = vec![room.to_string(), token.to_string()];
        fields.extend(location.fields());
        Self::new(Tag::Play, fields)
    }

    /// `CHAT:<timestamp_ms>:<sender>:<text>`
    pub fn chat(timestamp_ms: i64, sender: &str, text: &str) -> Self {
        Self::new(
            Tag::Chat,
            vec![timestamp_ms.to_string(), sender.to_owned(), text.to_owned()],
        )
    }

    /// `STAT:<room>:<json>`
    pub fn stat(room: RoomId, snapshot_json: String) -> Self {
        Self::new(Tag::Stat, vec![room.to_string(), snapshot_json])
    }

    /// Encode to a single escaped frame.
    pub fn encode(&self) -> String {
        frame::join(std::iter::once(self.tag.as_str()).chain(self.fields.iter().map(String::as_str)))
    }
}

impl From<&ProtocolError> for Reply {
    fn from(err: &ProtocolError) -> Self {
        Reply::error(err.tag(), err.to_string())
    }
}
