//! In-memory session pairs.

use std::time::Duration;

use sessionwire::{
    config::SessionConfig,
    session::{Session, SessionHandle, SessionHandler},
};
use tokio::{
    io::{DuplexStream, duplex},
    sync::mpsc,
    task::JoinHandle,
};

use crate::handler::{Event, RecordingHandler};

/// Buffer size of the duplex pipe used by [`recording_session`].
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// A served session, the peer end of its pipe, and its recorded events.
#[derive(Debug)]
pub struct SessionPair {
    /// The end of the pipe the test plays as the remote peer.
    pub peer: DuplexStream,
    /// Handle of the served session.
    pub handle: SessionHandle,
    /// Task running [`Session::serve`].
    pub task: JoinHandle<()>,
    /// Callbacks observed by the handler.
    pub events: mpsc::UnboundedReceiver<Event>,
}

/// Serve `handler` on `stream` in a spawned task.
pub fn spawn_session<H: SessionHandler>(
    stream: DuplexStream,
    handler: H,
    config: SessionConfig,
) -> (SessionHandle, JoinHandle<()>) {
    let session = Session::builder(stream, handler).config(config).build();
    let handle = session.handle();
    let task = tokio::spawn(async move { session.serve().await });
    (handle, task)
}

/// Serve a [`RecordingHandler`] over an in-memory pipe.
pub fn recording_session(handler: RecordingHandler, config: SessionConfig) -> SessionPair {
    let events = handler.take_events();
    let (local, peer) = duplex(DEFAULT_CAPACITY);
    let (handle, task) = spawn_session(local, handler, config);
    SessionPair {
        peer,
        handle,
        task,
        events,
    }
}

/// Wait up to one second for the next event.
///
/// # Panics
///
/// Panics on timeout or if the channel closed.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}
