//! Per-connection state shared between the hub and a session's loops.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

/// Why a frame could not be queued for a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OutboxError {
    /// The writer has fallen `capacity` frames behind.
    #[error("outbound queue full")]
    Full,
    /// The writer has exited.
    #[error("outbound queue closed")]
    Closed,
}

/// Hub-side sending half of a connection's bounded outbound queue.
///
/// The queue closes once every clone has been dropped; the writer then
/// flushes what is left and sends a Close frame.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::Sender<String>,
}

impl Outbox {
    /// Create an outbox and the receiver its writer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue one encoded frame without waiting.
    pub fn send(&self, frame: String) -> Result<(), OutboxError> {
        self.tx.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => OutboxError::Full,
            TrySendError::Closed(_) => OutboxError::Closed,
        })
    }
}

/// Time of the last frame of any kind received from the peer.
#[derive(Clone, Debug)]
pub struct Liveness {
    last_seen: Arc<Mutex<Instant>>,
}

impl Liveness {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            last_seen: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Record activity from the peer.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the peer was last heard from.
    pub fn idle(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_in_order() {
        let (outbox, mut rx) = Outbox::channel(8);
        for i in 0..3 {
            outbox.send(format!("MKRM:{i}")).unwrap();
        }
        for i in 0..3 {
            assert_eq!(rx.recv().await.unwrap(), format!("MKRM:{i}"));
        }
    }

    #[test]
    fn full_queue_is_reported() {
        let (outbox, _rx) = Outbox::channel(1);
        assert_eq!(outbox.send("a".into()), Ok(()));
        assert_eq!(outbox.send("b".into()), Err(OutboxError::Full));
    }

    #[test]
    fn closed_queue_is_reported() {
        let (outbox, rx) = Outbox::channel(4);
        drop(rx);
        assert_eq!(outbox.send("a".into()), Err(OutboxError::Closed));
    }

    #[test]
    fn zero_capacity_still_holds_one_frame() {
        let (outbox, _rx) = Outbox::channel(0);
        assert_eq!(outbox.send("a".into()), Ok(()));
        assert_eq!(outbox.send("b".into()), Err(OutboxError::Full));
    }

    #[tokio::test]
    async fn receiver_ends_when_all_clones_drop() {
        let (outbox, mut rx) = Outbox::channel(4);
        let copy = outbox.clone();
        outbox.send("last".into()).unwrap();
        drop(outbox);
        drop(copy);
        assert_eq!(rx.recv().await.as_deref(), Some("last"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn liveness_tracks_idle_time() {
        let liveness = Liveness::new();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(liveness.idle(), Duration::from_secs(30));
        liveness.touch();
        assert_eq!(liveness.idle(), Duration::ZERO);
    }
}
