//! Connection and room identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh, time-ordered id.
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Wrap an existing id string without validation.
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Borrow the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(
    /// Identifier of one WebSocket connection, unique for the process lifetime.
    ConnectionId,
    "conn"
);

/// Identifier of a room. Always positive; assigned by the hub in increasing
/// order and never reused.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(u64);

impl RoomId {
    /// The first id handed out by a fresh hub.
    pub const FIRST: RoomId = RoomId(1);

    /// Build a room id, rejecting zero.
    pub fn new(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// The id that follows this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error for room ids that are not positive decimal integers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid room id: {0}")]
pub struct InvalidRoomId(
    /// The rejected input.
    pub String,
);

impl FromStr for RoomId {
    type Err = InvalidRoomId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Parse signed so "-3" is reported as non-positive rather than garbage.
        match s.trim().parse::<i64>() {
            Ok(n) if n > 0 => Ok(Self(n.unsigned_abs())),
            _ => Err(InvalidRoomId(s.to_owned())),
        }
    }
}
