//! The session hub.
//!
//! A single task owns the client registry and the room table and applies
//! [`HubEvent`]s one at a time, so every invariant between connections and
//! rooms holds between events without locks. The hub never awaits transport
//! I/O: replies are queued with [`Outbox::send`], and a connection whose
//! queue rejects a frame is evicted once the current event is done.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tictac_core::{Board, Command, ConnectionId, Reply, RoomId, Tag};
use tictac_settings::HubSettings;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{CommandError, HubClosed, RoomError};
use crate::room::Room;
use crate::websocket::connection::Outbox;

/// Source of chat timestamps.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Everything the hub reacts to.
#[derive(Debug)]
pub enum HubEvent {
    /// A transport connection was upgraded. `name` is `None` when the client
    /// did not supply a usable display name.
    Connect {
        /// The new connection.
        id: ConnectionId,
        /// Sanitized display name.
        name: Option<String>,
        /// Queue replies for this connection go to.
        outbox: Outbox,
    },
    /// The connection's session has ended.
    Disconnect {
        /// The departing connection.
        id: ConnectionId,
    },
    /// One normalized inbound frame.
    Command {
        /// Sender.
        id: ConnectionId,
        /// Frame text, not yet parsed.
        payload: String,
    },
}

/// Counters published after every event, read by `/health`.
#[derive(Debug, Default)]
pub struct HubStats {
    connections: AtomicUsize,
    rooms: AtomicUsize,
}

impl HubStats {
    /// Registered connections.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Open rooms.
    pub fn rooms(&self) -> usize {
        self.rooms.load(Ordering::Relaxed)
    }

    fn publish(&self, connections: usize, rooms: usize) {
        self.connections.store(connections, Ordering::Relaxed);
        self.rooms.store(rooms, Ordering::Relaxed);
    }
}

/// Cloneable sender side of the hub's event channel.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
    stats: Arc<HubStats>,
}

impl HubHandle {
    /// Register a connection. Must precede any of its commands.
    pub async fn connect(
        &self,
        id: ConnectionId,
        name: Option<String>,
        outbox: Outbox,
    ) -> Result<(), HubClosed> {
        self.send(HubEvent::Connect { id, name, outbox }).await
    }

    /// Report that a connection's session ended.
    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), HubClosed> {
        self.send(HubEvent::Disconnect { id }).await
    }

    /// Submit one inbound frame, waiting for channel capacity.
    pub async fn command(&self, id: ConnectionId, payload: String) -> Result<(), HubClosed> {
        self.send(HubEvent::Command { id, payload }).await
    }

    /// Counters as of the last handled event.
    pub fn stats(&self) -> &HubStats {
        &self.stats
    }

    async fn send(&self, event: HubEvent) -> Result<(), HubClosed> {
        self.tx.send(event).await.map_err(|_| HubClosed)
    }
}

#[derive(Debug)]
struct Client {
    name: String,
    outbox: Outbox,
    rooms: BTreeSet<RoomId>,
}

/// Global session state. Only ever touched by the hub task.
pub struct Hub {
    settings: HubSettings,
    clients: HashMap<ConnectionId, Client>,
    rooms: BTreeMap<RoomId, Room>,
    next_room: RoomId,
    guests: u64,
    evicted: Vec<ConnectionId>,
    clock: Box<dyn Clock>,
    stats: Arc<HubStats>,
}

impl Hub {
    /// A hub stamping chat with wall-clock time.
    pub fn new(settings: HubSettings) -> Self {
        Self::with_clock(settings, SystemClock)
    }

    /// A hub with a custom chat clock.
    pub fn with_clock(settings: HubSettings, clock: impl Clock) -> Self {
        Self {
            settings,
            clients: HashMap::new(),
            rooms: BTreeMap::new(),
            next_room: RoomId::FIRST,
            guests: 0,
            evicted: Vec::new(),
            clock: Box::new(clock),
            stats: Arc::new(HubStats::default()),
        }
    }

    /// Registered connections.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Open rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Look up an open room.
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    /// Rooms the connection belongs to, or `None` if it is not registered.
    pub fn rooms_of(&self, id: &ConnectionId) -> Option<&BTreeSet<RoomId>> {
        self.clients.get(id).map(|client| &client.rooms)
    }

    /// Display name of a registered connection.
    pub fn name_of(&self, id: &ConnectionId) -> Option<&str> {
        self.clients.get(id).map(|client| client.name.as_str())
    }

    /// Move the hub onto its own task. The task ends when `cancel` fires or
    /// every [`HubHandle`] is dropped; dropping the hub closes every
    /// connection's outbound queue.
    pub fn spawn(self, cancel: CancellationToken) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.settings.event_queue_capacity.max(1));
        let handle = HubHandle {
            tx,
            stats: Arc::clone(&self.stats),
        };
        (handle, tokio::spawn(self.run(rx, cancel)))
    }

    async fn run(mut self, mut rx: mpsc::Receiver<HubEvent>, cancel: CancellationToken) {
        info!(board = %self.settings.board, "hub started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event);
                }
            }
        }
        info!(
            connections = self.clients.len(),
            rooms = self.rooms.len(),
            "hub stopped"
        );
    }

    /// Apply one event, then evict any connection that could not keep up.
    pub fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connect { id, name, outbox } => self.register(id, name, outbox),
            HubEvent::Disconnect { id } => {
                if self.unregister(&id) {
                    info!(connection_id = %id, "connection closed");
                }
            }
            HubEvent::Command { id, payload } => self.handle_command(&id, &payload),
        }
        while let Some(id) = self.evicted.pop() {
            if self.unregister(&id) {
                warn!(connection_id = %id, "outbound queue rejected a frame, evicting connection");
            }
        }
        self.stats.publish(self.clients.len(), self.rooms.len());
    }

    fn register(&mut self, id: ConnectionId, name: Option<String>, outbox: Outbox) {
        if self.clients.contains_key(&id) {
            warn!(connection_id = %id, "duplicate connect ignored");
            return;
        }
        let name = name.unwrap_or_else(|| {
            self.guests += 1;
            format!("{}{}", self.settings.guest_name_prefix, self.guests)
        });
        info!(connection_id = %id, %name, "connection registered");
        let client = Client {
            name,
            outbox,
            rooms: BTreeSet::new(),
        };
        let _ = self.clients.insert(id, client);
    }

    /// Remove a connection from the registry and every room it is in.
    /// Rooms left without members are destroyed. Returns `false` when the
    /// connection was not registered.
    fn unregister(&mut self, id: &ConnectionId) -> bool {
        let Some(client) = self.clients.remove(id) else {
            return false;
        };
        for room_id in client.rooms {
            let Some(room) = self.rooms.get_mut(&room_id) else {
                warn!(connection_id = %id, %room_id, "member of a missing room");
                continue;
            };
            if room.leave(id).is_err() {
                warn!(connection_id = %id, %room_id, "room did not list member");
            }
            if room.is_empty() {
                let _ = self.rooms.remove(&room_id);
                info!(%room_id, "room closed");
            }
        }
        true
    }

    fn handle_command(&mut self, id: &ConnectionId, payload: &str) {
        if !self.clients.contains_key(id) {
            warn!(connection_id = %id, "command from unregistered connection dropped");
            return;
        }
        let reply = match Command::parse(payload) {
            Ok(command) => {
                let tag = command.tag();
                debug!(connection_id = %id, %tag, room_id = ?command.room(), "command received");
                self.execute(id, command)
                    .unwrap_or_else(|err| Self::reject(id, Some(tag), &err))
            }
            Err(err) => Self::reject(id, None, &CommandError::from(err)),
        };
        self.deliver(id, reply.encode());
    }

    fn reject(id: &ConnectionId, tag: Option<Tag>, err: &CommandError) -> Reply {
        if matches!(err, CommandError::Internal(_)) {
            warn!(connection_id = %id, ?tag, error = %err, "command failed");
        } else {
            debug!(connection_id = %id, ?tag, kind = err.kind(), error = %err, "command rejected");
        }
        err.to_reply(tag)
    }

    fn deliver(&mut self, id: &ConnectionId, frame: String) {
        let rejected = self
            .clients
            .get(id)
            .is_some_and(|client| client.outbox.send(frame).is_err());
        if rejected {
            self.evicted.push(id.clone());
        }
    }

    fn execute(&mut self, id: &ConnectionId, command: Command) -> Result<Reply, CommandError> {
        let max_rooms = self.settings.max_rooms_per_connection;
        let client = self
            .clients
            .get_mut(id)
            .ok_or_else(|| CommandError::Internal(format!("connection {id} is not registered")))?;

        match command {
            Command::MakeRoom => {
                if client.rooms.len() >= max_rooms {
                    return Err(CommandError::TooManyRooms);
                }
                let room_id = self.next_room;
                self.next_room = room_id.next();
                let mut room = Room::new(room_id, Board::new(self.settings.board));
                room.join(id.clone(), client.outbox.clone())?;
                let _ = client.rooms.insert(room_id);
                let _ = self.rooms.insert(room_id, room);
                info!(connection_id = %id, %room_id, "room created");
                Ok(Reply::room_made(room_id))
            }
            Command::Join(room_id) => {
                let room = lookup_mut(&mut self.rooms, room_id)?;
                if room.is_member(id) {
                    return Err(RoomError::AlreadyMember.into());
                }
                if client.rooms.len() >= max_rooms {
                    return Err(CommandError::TooManyRooms);
                }
                room.join(id.clone(), client.outbox.clone())?;
                let _ = client.rooms.insert(room_id);
                Ok(Reply::joined(room_id))
            }
            Command::JoinSeat(room_id) => {
                let seat = lookup_mut(&mut self.rooms, room_id)?.take_seat(id)?;
                debug!(connection_id = %id, %room_id, %seat, "seat taken");
                Ok(Reply::seated(room_id, seat))
            }
            Command::Leave(room_id) => {
                let room = lookup_mut(&mut self.rooms, room_id)?;
                let _ = room.leave(id)?;
                let _ = client.rooms.remove(&room_id);
                if room.is_empty() {
                    let _ = self.rooms.remove(&room_id);
                    info!(%room_id, "room closed");
                }
                Ok(Reply::left(room_id))
            }
            Command::LeaveSeat(room_id) => {
                let _ = lookup_mut(&mut self.rooms, room_id)?.vacate_seat(id)?;
                Ok(Reply::unseated(room_id))
            }
            Command::Play {
                room: room_id,
                location,
            } => {
                let played = lookup_mut(&mut self.rooms, room_id)?.play(id, location)?;
                self.evicted.extend(played.undelivered);
                Ok(Reply::played(room_id, played.token, &location))
            }
            Command::Chat {
                room: room_id,
                text,
            } => {
                let room = lookup_mut(&mut self.rooms, room_id)?;
                let timestamp = self.clock.now_ms();
                let undelivered = room.broadcast_chat(id, timestamp, &client.name, &text)?;
                self.evicted.extend(undelivered);
                Ok(Reply::chat(timestamp, &client.name, &text))
            }
            Command::Stat(room_id) => {
                let room = self
                    .rooms
                    .get(&room_id)
                    .ok_or(CommandError::RoomNotFound(room_id))?;
                let clients = &self.clients;
                let snapshot = room.snapshot(|member| clients.get(member).map(|c| c.name.clone()));
                let json = serde_json::to_string(&snapshot)
                    .map_err(|err| CommandError::Internal(err.to_string()))?;
                Ok(Reply::stat(room_id, json))
            }
        }
    }
}

fn lookup_mut(rooms: &mut BTreeMap<RoomId, Room>, id: RoomId) -> Result<&mut Room, CommandError> {
    rooms.get_mut(&id).ok_or(CommandError::RoomNotFound(id))
}
