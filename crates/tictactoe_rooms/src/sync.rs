//! Polling synchronization loop.
//!
//! One task per joined room reads the document on a fixed interval and
//! forwards every result as a [`SyncEvent`]. Nothing is deduplicated; the
//! consumer decides what changed.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::RoomErrorKind;
use crate::room::{Room, RoomCode};
use crate::store::RoomStore;

/// Default delay between polls.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(200);

const EVENT_BUFFER: usize = 32;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Latest sanitized copy of the room.
    RoomStateChanged(Room),
    /// The room was deleted or lost its creator. Polling has stopped.
    RoomGone(RoomCode),
    /// The poll failed; the next one goes ahead as scheduled.
    Unavailable {
        /// Room being polled.
        code: RoomCode,
        /// What went wrong.
        reason: String,
    },
}

impl SyncEvent {
    /// Code of the room this event is about.
    pub fn code(&self) -> &RoomCode {
        match self {
            SyncEvent::RoomStateChanged(room) => &room.code,
            SyncEvent::RoomGone(code) | SyncEvent::Unavailable { code, .. } => code,
        }
    }
}

/// Spawns polling tasks.
#[derive(Debug)]
pub struct SyncLoop;

impl SyncLoop {
    /// Starts polling `code` every `interval` on the current runtime.
    #[instrument(skip(store), fields(code = %code))]
    pub fn spawn(store: RoomStore, code: RoomCode, interval: Duration) -> SyncHandle {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (stop_tx, stop_rx) = watch::channel(false);
        info!(?interval, "Starting sync loop");
        let task = tokio::spawn(run(store, code.clone(), interval, events_tx, stop_rx));
        SyncHandle {
            code,
            events: events_rx,
            stop: stop_tx,
            task,
        }
    }
}

/// Consumer side of a running sync loop.
///
/// Dropping the handle stops the loop.
#[derive(Debug)]
pub struct SyncHandle {
    code: RoomCode,
    events: mpsc::Receiver<SyncEvent>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Room being polled.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Waits for the next event. `None` once the loop has ended and every
    /// buffered event was received.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }

    /// Returns a buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        self.events.try_recv().ok()
    }

    /// Asks the loop to stop. A poll already in flight completes but its
    /// result is discarded.
    #[instrument(skip(self), fields(code = %self.code))]
    pub fn stop(&self) {
        debug!("Stopping sync loop");
        self.stop.send_replace(true);
    }

    /// True once the polling task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}

#[instrument(skip_all, fields(code = %code))]
async fn run(
    store: RoomStore,
    code: RoomCode,
    interval: Duration,
    events: mpsc::Sender<SyncEvent>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let polled = store.get(&code).await;
        if *stop.borrow() {
            debug!("Stopped during poll, discarding result");
            break;
        }

        let event = match polled {
            Ok(room) => {
                debug!(status = %room.status, turn = %room.turn, "Polled room");
                SyncEvent::RoomStateChanged(room)
            }
            Err(e) if matches!(e.kind(), RoomErrorKind::RoomNotFound(_)) => {
                info!("Room is gone");
                SyncEvent::RoomGone(code.clone())
            }
            Err(e) => {
                warn!(error = %e, "Poll failed, will retry");
                SyncEvent::Unavailable {
                    code: code.clone(),
                    reason: e.message(),
                }
            }
        };
        let gone = matches!(event, SyncEvent::RoomGone(_));

        tokio::select! {
            sent = events.send(event) => {
                if sent.is_err() {
                    debug!("Receiver dropped");
                    break;
                }
            }
            _ = stop.changed() => break,
        }
        if gone {
            break;
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = stop.changed() => break,
        }
    }
    info!("Sync loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_closes_channel() {
        let (store, _backend) = RoomStore::in_memory();
        let code = RoomCode::parse("AB3D").unwrap();
        let mut handle = SyncLoop::spawn(store, code, Duration::from_millis(5));
        handle.stop();
        while handle.recv().await.is_some() {}
        assert!(handle.try_recv().is_none());
    }
}
