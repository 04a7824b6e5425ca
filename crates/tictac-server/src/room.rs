//! A room: members, two seats and one board.
//!
//! Rooms never touch the transport. Broadcasts go through each member's
//! [`Outbox`] and report the members whose queue rejected the frame so the
//! hub can evict them.

use std::collections::BTreeMap;

use serde::Serialize;
use tictac_core::{Board, BoardSnapshot, ConnectionId, Location, Reply, RoomId, Seat, Token};

use crate::errors::RoomError;
use crate::websocket::connection::Outbox;

/// Result of a successful move.
#[derive(Debug)]
pub struct Played {
    /// The token that was placed.
    pub token: Token,
    /// Members whose outbound queue refused the broadcast.
    pub undelivered: Vec<ConnectionId>,
}

/// Read-only view of a room for `STAT` replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    /// Room id.
    pub room: RoomId,
    /// Member count, seated or not.
    pub members: usize,
    /// Display name of each seat holder, seat 0 first.
    pub seats: [Option<String>; 2],
    /// Board state.
    pub board: BoardSnapshot,
}

/// One game room. Owned by the hub.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    members: BTreeMap<ConnectionId, Outbox>,
    seats: [Option<ConnectionId>; 2],
    board: Board,
}

impl Room {
    /// An empty room around `board`.
    pub fn new(id: RoomId, board: Board) -> Self {
        Self {
            id,
            members: BTreeMap::new(),
            seats: [None, None],
            board,
        }
    }

    /// This room's id.
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// The room's board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Whether `id` has joined this room.
    pub fn is_member(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }

    /// True when nobody is left.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Member ids in id order.
    pub fn members(&self) -> impl Iterator<Item = &ConnectionId> {
        self.members.keys()
    }

    /// The seat `id` holds, if any.
    pub fn seat_of(&self, id: &ConnectionId) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|seat| self.seats[seat.index()].as_ref() == Some(id))
    }

    /// Who holds `seat`.
    pub fn seat_holder(&self, seat: Seat) -> Option<&ConnectionId> {
        self.seats[seat.index()].as_ref()
    }

    /// Add a member without a seat.
    pub fn join(&mut self, id: ConnectionId, outbox: Outbox) -> Result<(), RoomError> {
        if self.is_member(&id) {
            return Err(RoomError::AlreadyMember);
        }
        let _ = self.members.insert(id, outbox);
        Ok(())
    }

    /// Remove a member, vacating their seat. Returns the seat they held.
    pub fn leave(&mut self, id: &ConnectionId) -> Result<Option<Seat>, RoomError> {
        if self.members.remove(id).is_none() {
            return Err(RoomError::NotMember);
        }
        let seat = self.seat_of(id);
        if let Some(seat) = seat {
            self.seats[seat.index()] = None;
        }
        Ok(seat)
    }

    /// Seat a member in the lowest free seat.
    pub fn take_seat(&mut self, id: &ConnectionId) -> Result<Seat, RoomError> {
        if !self.is_member(id) {
            return Err(RoomError::NotMember);
        }
        if self.seat_of(id).is_some() {
            return Err(RoomError::AlreadySeated);
        }
        let seat = Seat::ALL
            .into_iter()
            .find(|seat| self.seats[seat.index()].is_none())
            .ok_or(RoomError::NoFreeSeat)?;
        self.seats[seat.index()] = Some(id.clone());
        Ok(seat)
    }

    /// Give up a seat, staying a member.
    pub fn vacate_seat(&mut self, id: &ConnectionId) -> Result<Seat, RoomError> {
        if !self.is_member(id) {
            return Err(RoomError::NotMember);
        }
        let seat = self.seat_of(id).ok_or(RoomError::NotSeated)?;
        self.seats[seat.index()] = None;
        Ok(seat)
    }

    /// Send a chat line to every member except the sender.
    pub fn broadcast_chat(
        &self,
        from: &ConnectionId,
        timestamp_ms: i64,
        name: &str,
        text: &str,
    ) -> Result<Vec<ConnectionId>, RoomError> {
        if !self.is_member(from) {
            return Err(RoomError::NotMember);
        }
        Ok(self.broadcast(from, &Reply::chat(timestamp_ms, name, text)))
    }

    /// Play the sender's token and tell every other member about it.
    pub fn play(&mut self, from: &ConnectionId, location: Location) -> Result<Played, RoomError> {
        if !self.is_member(from) {
            return Err(RoomError::NotMember);
        }
        let token = self.seat_of(from).ok_or(RoomError::NotSeated)?.token();
        self.board.play(token, location)?;
        let undelivered = self.broadcast(from, &Reply::played(self.id, token, &location));
        Ok(Played { token, undelivered })
    }

    /// Snapshot for `STAT`, resolving seat holders through `name_of`.
    pub fn snapshot<F>(&self, name_of: F) -> RoomSnapshot
    where
        F: Fn(&ConnectionId) -> Option<String>,
    {
        RoomSnapshot {
            room: self.id(),
            members: self.member_count(),
            seats: Seat::ALL.map(|seat| self.seat_holder(seat).and_then(&name_of)),
            board: self.board.snapshot(),
        }
    }

    fn broadcast(&self, except: &ConnectionId, reply: &Reply) -> Vec<ConnectionId> {
        let frame = reply.encode();
        let mut undelivered = Vec::new();
        for (id, outbox) in &self.members {
            if id != except && outbox.send(frame.clone()).is_err() {
                undelivered.push(id.clone());
            }
        }
        undelivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tictac_core::{BoardError, BoardVariant, Cell};
    use tokio::sync::mpsc;

    struct Member {
        id: ConnectionId,
        outbox: Outbox,
        rx: mpsc::Receiver<String>,
    }

    impl Member {
        fn new(name: &str) -> Self {
            let id = ConnectionId::from_raw(name);
            let (outbox, rx) = Outbox::channel(8);
            Self { id, outbox, rx }
        }

        fn drain(&mut self) -> Vec<String> {
            std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
        }
    }

    fn room() -> Room {
        Room::new(RoomId::FIRST, Board::new(BoardVariant::Classic))
    }

    fn flat(row: usize, col: usize) -> Location {
        Location::Flat(Cell::new(row, col).unwrap())
    }

    #[test]
    fn join_and_leave() {
        let mut room = room();
        let a = Member::new("a");
        room.join(a.id.clone(), a.outbox.clone()).unwrap();
        assert!(room.is_member(&a.id));
        assert_eq!(
            room.join(a.id.clone(), a.outbox.clone()),
            Err(RoomError::AlreadyMember)
        );
        assert_eq!(room.leave(&a.id), Ok(None));
        assert!(room.is_empty());
        assert_eq!(room.leave(&a.id), Err(RoomError::NotMember));
    }

    #[test]
    fn seats_fill_lowest_first() {
        let mut room = room();
        let (a, b, c) = (Member::new("a"), Member::new("b"), Member::new("c"));
        for m in [&a, &b, &c] {
            room.join(m.id.clone(), m.outbox.clone()).unwrap();
        }
        assert_eq!(room.take_seat(&a.id), Ok(Seat::First));
        assert_eq!(room.take_seat(&a.id), Err(RoomError::AlreadySeated));
        assert_eq!(room.take_seat(&b.id), Ok(Seat::Second));
        assert_eq!(room.take_seat(&c.id), Err(RoomError::NoFreeSeat));

        assert_eq!(room.vacate_seat(&a.id), Ok(Seat::First));
        assert_eq!(room.vacate_seat(&a.id), Err(RoomError::NotSeated));
        assert_eq!(room.take_seat(&c.id), Ok(Seat::First));
        assert_eq!(room.seat_holder(Seat::First), Some(&c.id));
    }

    #[test]
    fn seating_requires_membership() {
        let mut room = room();
        let a = Member::new("a");
        assert_eq!(room.take_seat(&a.id), Err(RoomError::NotMember));
        assert_eq!(room.vacate_seat(&a.id), Err(RoomError::NotMember));
    }

    #[test]
    fn leaving_vacates_seat() {
        let mut room = room();
        let a = Member::new("a");
        room.join(a.id.clone(), a.outbox.clone()).unwrap();
        let _ = room.take_seat(&a.id).unwrap();
        assert_eq!(room.leave(&a.id), Ok(Some(Seat::First)));
        assert_eq!(room.seat_holder(Seat::First), None);
    }

    #[test]
    fn chat_skips_sender_and_requires_membership() {
        let mut room = room();
        let (mut a, mut b) = (Member::new("a"), Member::new("b"));
        room.join(a.id.clone(), a.outbox.clone()).unwrap();
        room.join(b.id.clone(), b.outbox.clone()).unwrap();

        let failed = room.broadcast_chat(&a.id, 42, "Ann", "hi").unwrap();
        assert!(failed.is_empty());
        assert!(a.drain().is_empty());
        assert_eq!(b.drain(), vec!["CHAT:42:Ann:hi"]);

        let outsider = Member::new("x");
        assert_eq!(
            room.broadcast_chat(&outsider.id, 43, "X", "spam"),
            Err(RoomError::NotMember)
        );
        assert!(b.drain().is_empty());
    }

    #[test]
    fn play_broadcasts_to_others() {
        let mut room = room();
        let (mut a, mut b) = (Member::new("a"), Member::new("b"));
        room.join(a.id.clone(), a.outbox.clone()).unwrap();
        room.join(b.id.clone(), b.outbox.clone()).unwrap();
        let _ = room.take_seat(&a.id).unwrap();

        let played = room.play(&a.id, flat(0, 0)).unwrap();
        assert_eq!(played.token, Token::X);
        assert!(a.drain().is_empty());
        assert_eq!(b.drain(), vec!["PLAY:1:X:0,0"]);

        assert_eq!(
            room.play(&a.id, flat(0, 0)).unwrap_err(),
            RoomError::Board(BoardError::CellOccupied)
        );
        assert_eq!(room.play(&b.id, flat(1, 1)).unwrap_err(), RoomError::NotSeated);
        assert!(b.drain().is_empty());
    }

    #[test]
    fn full_queues_are_reported() {
        let mut room = room();
        let a = Member::new("a");
        let slow = ConnectionId::from_raw("slow");
        let (slow_outbox, _slow_rx) = Outbox::channel(1);
        room.join(a.id.clone(), a.outbox.clone()).unwrap();
        room.join(slow.clone(), slow_outbox).unwrap();

        assert!(room.broadcast_chat(&a.id, 1, "a", "one").unwrap().is_empty());
        assert_eq!(room.broadcast_chat(&a.id, 2, "a", "two").unwrap(), vec![slow]);
    }

    #[test]
    fn snapshot_names_seat_holders() {
        let mut room = room();
        let a = Member::new("a");
        room.join(a.id.clone(), a.outbox.clone()).unwrap();
        let _ = room.take_seat(&a.id).unwrap();
        let snap = room.snapshot(|id| Some(format!("name-{id}")));
        assert_eq!(snap.members, 1);
        assert_eq!(snap.seats, [Some("name-a".to_string()), None]);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["room"], 1);
        assert_eq!(json["board"]["status"], "in_progress");
    }
}
