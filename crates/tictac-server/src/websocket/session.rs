//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.
//!
//! Each session runs two loops. The reader normalizes inbound frames and
//! forwards them to the hub in arrival order. The writer drains the
//! connection's outbound queue, coalescing whatever is already waiting into
//! one newline-separated Text message, and sends heartbeat pings.

use std::fmt;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tictac_core::ConnectionId;
use tictac_core::frame::{self, FRAME_SEPARATOR};
use tictac_settings::ServerSettings;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{Instrument, debug, info, instrument, warn};

use super::connection::{Liveness, Outbox};
use super::heartbeat::{Keepalive, KeepaliveAction};
use crate::hub::HubHandle;

/// Per-connection transport limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Ping cadence and silence limit.
    pub keepalive: Keepalive,
    /// Longest a single socket write may take.
    pub write_timeout: Duration,
    /// Frames the hub may queue before the connection is evicted.
    pub send_queue_capacity: usize,
    /// Largest inbound message, in bytes.
    pub max_message_size: usize,
}

impl SessionConfig {
    /// Derive the limits from the `server` settings section.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            keepalive: Keepalive::from_settings(settings),
            write_timeout: settings.write_timeout(),
            send_queue_capacity: settings.send_queue_capacity,
            max_message_size: settings.max_message_size,
        }
    }
}

/// Why the reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The peer sent a Close frame.
    Closed,
    /// The stream ended without a Close frame.
    Eof,
    /// The transport reported an error, including oversize messages.
    Error,
    /// The hub stopped accepting events.
    HubClosed,
}

/// Why the writer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEnd {
    /// The hub released the connection; a Close frame was attempted.
    QueueClosed,
    /// The peer stayed silent past the pong timeout.
    TimedOut,
    /// The sink returned an error.
    WriteFailed,
    /// A write did not finish within the write timeout.
    WriteTimeout,
}

/// Forward inbound frames to the hub until the peer goes away.
pub async fn read_loop<S, E>(
    mut stream: S,
    id: &ConnectionId,
    hub: &HubHandle,
    liveness: &Liveness,
) -> ReadEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    while let Some(item) = stream.next().await {
        let message = match item {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "read failed");
                return ReadEnd::Error;
            }
        };
        liveness.touch();

        let payload = match message {
            Message::Text(text) => frame::normalize(text.as_str()),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => frame::normalize(text),
                Err(_) => {
                    debug!(len = data.len(), "dropping non-UTF-8 binary frame");
                    continue;
                }
            },
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return ReadEnd::Closed,
        };

        if hub.command(id.clone(), payload).await.is_err() {
            return ReadEnd::HubClosed;
        }
    }
    ReadEnd::Eof
}

/// Drain the outbound queue into the socket and keep the peer alive.
pub async fn write_loop<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<String>,
    liveness: &Liveness,
    keepalive: Keepalive,
    write_timeout: Duration,
) -> WriteEnd
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let mut ticker = keepalive.ticker();
    loop {
        tokio::select! {
            next = rx.recv() => {
                let Some(mut batch) = next else {
                    let _ = send_within(&mut sink, Message::Close(None), write_timeout).await;
                    return WriteEnd::QueueClosed;
                };
                while let Ok(more) = rx.try_recv() {
                    batch.push(FRAME_SEPARATOR);
                    batch.push_str(&more);
                }
                if let Err(end) = send_within(&mut sink, Message::Text(batch.into()), write_timeout).await {
                    return end;
                }
            }
            _ = ticker.tick() => match keepalive.check(liveness) {
                KeepaliveAction::TimedOut => {
                    warn!(idle = ?liveness.idle(), "peer unresponsive, disconnecting");
                    return WriteEnd::TimedOut;
                }
                KeepaliveAction::Ping => {
                    if let Err(end) = send_within(&mut sink, Message::Ping(Bytes::default()), write_timeout).await {
                        return end;
                    }
                }
            },
        }
    }
}

async fn send_within<S>(sink: &mut S, message: Message, limit: Duration) -> Result<(), WriteEnd>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match time::timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            debug!(error = %err, "write failed");
            Err(WriteEnd::WriteFailed)
        }
        Err(_) => {
            debug!(?limit, "write timed out");
            Err(WriteEnd::WriteTimeout)
        }
    }
}

/// Run a WebSocket session for a connected client.
///
/// The connection is registered with the hub before any of its frames are
/// read, and unregistered exactly once when either loop ends.
#[instrument(skip_all, fields(connection_id = %id))]
pub async fn run_session(
    socket: WebSocket,
    id: ConnectionId,
    name: Option<String>,
    hub: HubHandle,
    config: SessionConfig,
) {
    let (outbox, rx) = Outbox::channel(config.send_queue_capacity);
    if hub.connect(id.clone(), name, outbox).await.is_err() {
        warn!("hub is not running, dropping connection");
        return;
    }
    info!("client connected");

    let liveness = Liveness::new();
    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn({
        let liveness = liveness.clone();
        async move {
            write_loop(sink, rx, &liveness, config.keepalive, config.write_timeout).await
        }
        .in_current_span()
    });
    let reader = read_loop(stream, &id, &hub, &liveness);
    tokio::pin!(reader);

    tokio::select! {
        end = &mut reader => {
            debug!(?end, "reader finished");
            let _ = hub.disconnect(id.clone()).await;
            match writer.await {
                Ok(end) => debug!(?end, "writer finished"),
                Err(err) => warn!(error = %err, "writer task failed"),
            }
        }
        end = &mut writer => {
            match end {
                Ok(end) => debug!(?end, "writer finished"),
                Err(err) => warn!(error = %err, "writer task failed"),
            }
            let _ = hub.disconnect(id.clone()).await;
        }
    }
    info!("client disconnected");
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::hub::Hub;
    use futures::channel::mpsc as fmpsc;
    use tictac_settings::HubSettings;
    use tokio_util::sync::CancellationToken;

    fn text(s: &str) -> Message {
        Message::Text(s.to_owned().into())
    }

    fn inbound(messages: Vec<Message>) -> impl Stream<Item = Result<Message, Infallible>> + Unpin {
        futures::stream::iter(messages.into_iter().map(Ok))
    }

    fn texts(messages: &[Message]) -> Vec<&str> {
        messages
            .iter()
            .filter_map(|m| if let Message::Text(t) = m { Some(t.as_str()) } else { None })
            .collect()
    }

    #[tokio::test]
    async fn reader_forwards_commands_in_order() {
        let (hub, _task) = Hub::new(HubSettings::default()).spawn(CancellationToken::new());
        let id = ConnectionId::from_raw("reader");
        let (outbox, mut rx) = Outbox::channel(16);
        hub.connect(id.clone(), None, outbox).await.unwrap();

        let messages = inbound(vec![
            text("  MKRM "),
            Message::Ping(Bytes::default()),
            Message::Binary(b"JNSL:1\r\n".to_vec().into()),
            Message::Binary(vec![0xff, 0xfe].into()),
            text("CHAT:1:two\nlines"),
            Message::Close(None),
            text("MKRM"),
        ]);
        let end = read_loop(messages, &id, &hub, &Liveness::new()).await;
        assert_eq!(end, ReadEnd::Closed);

        assert_eq!(rx.recv().await.as_deref(), Some("MKRM:1"));
        assert_eq!(rx.recv().await.as_deref(), Some("JNSL:1:0"));
        let chat = rx.recv().await.unwrap();
        assert!(chat.ends_with(":Guest1:two lines"), "{chat}");
        assert!(rx.try_recv().is_err(), "frames after Close must be ignored");
    }

    #[tokio::test]
    async fn reader_stops_on_transport_error_and_eof() {
        let (hub, _task) = Hub::new(HubSettings::default()).spawn(CancellationToken::new());
        let id = ConnectionId::from_raw("reader");

        let failing = futures::stream::iter(vec![Err::<Message, _>("message too large")]);
        assert_eq!(read_loop(failing, &id, &hub, &Liveness::new()).await, ReadEnd::Error);

        assert_eq!(read_loop(inbound(Vec::new()), &id, &hub, &Liveness::new()).await, ReadEnd::Eof);
    }

    #[tokio::test]
    async fn reader_reports_stopped_hub() {
        let cancel = CancellationToken::new();
        let (hub, task) = Hub::new(HubSettings::default()).spawn(cancel.clone());
        cancel.cancel();
        task.await.unwrap();

        let id = ConnectionId::from_raw("late");
        assert_eq!(read_loop(inbound(vec![text("MKRM")]), &id, &hub, &Liveness::new()).await, ReadEnd::HubClosed);
    }

    #[tokio::test]
    async fn writer_coalesces_queued_frames_then_closes() {
        let (outbox, rx) = Outbox::channel(8);
        for frame in ["MKRM:1", "JNSL:1:0", "PLAY:1:X:0,0"] {
            outbox.send(frame.to_owned()).unwrap();
        }
        drop(outbox);

        let (sink, out) = fmpsc::unbounded::<Message>();
        let end = write_loop(sink, rx, &Liveness::new(), Keepalive::default(), Duration::from_secs(1)).await;
        assert_eq!(end, WriteEnd::QueueClosed);

        let sent: Vec<Message> = out.collect().await;
        assert_eq!(texts(&sent), vec!["MKRM:1\nJNSL:1:0\nPLAY:1:X:0,0"]);
        assert!(matches!(sent.last(), Some(Message::Close(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn writer_pings_then_gives_up_on_silent_peer() {
        let (_outbox, rx) = Outbox::channel(8);
        let keepalive = Keepalive {
            ping_interval: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(15),
        };
        let (sink, out) = fmpsc::unbounded::<Message>();
        let end = write_loop(sink, rx, &Liveness::new(), keepalive, Duration::from_secs(1)).await;
        assert_eq!(end, WriteEnd::TimedOut);

        let sent: Vec<Message> = out.collect().await;
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], Message::Ping(_)));
    }

    #[tokio::test]
    async fn writer_stops_when_socket_is_gone() {
        let (outbox, rx) = Outbox::channel(8);
        outbox.send("MKRM:1".into()).unwrap();
        let (sink, out) = fmpsc::unbounded::<Message>();
        drop(out);
        let end = write_loop(sink, rx, &Liveness::new(), Keepalive::default(), Duration::from_secs(1)).await;
        assert_eq!(end, WriteEnd::WriteFailed);
    }

    #[test]
    fn config_follows_server_settings() {
        let settings = ServerSettings::default();
        let config = SessionConfig::from_settings(&settings);
        assert_eq!(config.send_queue_capacity, 256);
        assert_eq!(config.max_message_size, 512);
        assert_eq!(config.write_timeout, Duration::from_secs(10));
    }
}
