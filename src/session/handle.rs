//! Shared session state and the cloneable handle exposed to producers.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use bytes::BytesMut;
use log::debug;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::ConnectionId;
use crate::{
    codec::{self, FramingError, MAX_SIZE, MAX_TYPE, MAX_VARINT_LEN},
    config::SessionConfig,
    error::SessionError,
    message::Message,
    metrics::{self, Direction},
    pipe::PageBuffer,
};

/// State guarded by the session mutex.
#[derive(Debug)]
pub(super) struct State {
    pub(super) pipe: PageBuffer,
    pub(super) closed: bool,
    pub(super) err: Option<SessionError>,
}

/// State shared by a session's tasks and every [`SessionHandle`].
#[derive(Debug)]
pub(crate) struct Shared {
    pub(super) id: ConnectionId,
    pub(super) peer_addr: Option<SocketAddr>,
    pub(super) config: SessionConfig,
    state: Mutex<State>,
    /// Wakes the write task when the pipe turns non-empty or the session
    /// closes.
    pub(super) writable: Notify,
    /// Cancelled once the session closes, releasing a parked read.
    pub(super) closing: CancellationToken,
}

impl Shared {
    pub(super) fn new(id: ConnectionId, peer_addr: Option<SocketAddr>, config: SessionConfig) -> Self {
        Self {
            id,
            peer_addr,
            state: Mutex::new(State {
                pipe: PageBuffer::with_page_size(config.page_size),
                closed: false,
                err: None,
            }),
            config,
            writable: Notify::new(),
            closing: CancellationToken::new(),
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the session closed, recording `err` if this is the first close.
    ///
    /// Returns `true` if this call performed the transition.
    pub(super) fn set_closed(&self, err: Option<SessionError>) -> bool {
        let first = {
            let mut state = self.lock();
            if state.closed {
                false
            } else {
                state.closed = true;
                state.err = err;
                true
            }
        };
        if first {
            self.writable.notify_one();
            self.closing.cancel();
        }
        first
    }

    pub(super) fn is_closed(&self) -> bool { self.lock().closed }

    pub(super) fn take_error(&self) -> Option<SessionError> { self.lock().err.take() }
}

/// Cloneable control surface of a running session.
///
/// Writes append to the session's pipe and return immediately; the write
/// task flushes the pipe to the connection in append order. A handle may be
/// used from any task or thread.
///
/// Writes from one producer preserve their boundaries. Producers writing
/// concurrently through separate handles must serialise themselves, since a
/// large write is appended in several chunks.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub(super) shared: Arc<Shared>,
}

impl SessionHandle {
    pub(super) fn from_arc(shared: Arc<Shared>) -> Self { Self { shared } }

    pub(super) fn downgrade(&self) -> Weak<Shared> { Arc::downgrade(&self.shared) }

    /// Identifier of the session.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.shared.id }

    /// Remote address, when the connection has one.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> { self.shared.peer_addr }

    /// Configuration the session runs with.
    #[must_use]
    pub fn config(&self) -> &SessionConfig { &self.shared.config }

    /// Returns `true` once the session is closing or closed.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.shared.is_closed() }

    /// Bytes queued but not yet handed to the connection.
    #[must_use]
    pub fn buffered(&self) -> usize { self.shared.lock().pipe.len() }

    /// Queue raw bytes for the peer, returning how many were queued.
    ///
    /// Input is appended in chunks of [`SessionConfig::write_chunk_size`]
    /// bytes, one lock acquisition per chunk. The write task is woken only
    /// when the pipe turns non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session is closed before the
    /// write begins or between chunks.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, SessionError> {
        let chunk_size = self.shared.config.write_chunk_size();
        let mut written = 0;
        if bytes.is_empty() && self.is_closed() {
            return Err(SessionError::Closed);
        }
        for chunk in bytes.chunks(chunk_size) {
            let was_empty = {
                let mut state = self.shared.lock();
                if state.closed {
                    return Err(SessionError::Closed);
                }
                let was_empty = state.pipe.is_empty();
                written += state.pipe.write(chunk);
                was_empty
            };
            if was_empty {
                self.shared.writable.notify_one();
            }
        }
        Ok(written)
    }

    /// Queue one frame `type‖size‖body` built from raw body bytes.
    ///
    /// # Errors
    ///
    /// Returns a framing error if the type or size exceeds its maximum, and
    /// [`SessionError::Closed`] if the session is closed.
    pub fn write_frame(&self, message_type: u32, body: &[u8]) -> Result<usize, SessionError> {
        if message_type > MAX_TYPE {
            return Err(codec::CodecError::from(FramingError::TypeOverflow).into());
        }
        if body.len() > MAX_SIZE {
            return Err(codec::CodecError::from(FramingError::SizeOverflow).into());
        }
        let mut frame = BytesMut::with_capacity(MAX_VARINT_LEN * 2 + body.len());
        codec::encode_frame_header(&mut frame, message_type, body.len());
        frame.extend_from_slice(body);
        let written = self.write(&frame)?;
        metrics::inc_frames(Direction::Outbound);
        Ok(written)
    }

    /// Encode `message` as a session frame and queue it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Codec`] if the message cannot be encoded and
    /// [`SessionError::Closed`] if the session is closed.
    pub fn send(&self, message: &dyn Message) -> Result<usize, SessionError> {
        let mut frame = BytesMut::new();
        codec::encode_frame(message, &mut frame)?;
        let written = self.write(&frame)?;
        metrics::inc_frames(Direction::Outbound);
        Ok(written)
    }

    /// Request a graceful close.
    ///
    /// Queued output is flushed before the connection is closed, and the
    /// handler's `on_close` receives `None` unless an error closed the
    /// session first. A frame whose handler is already running is handled to
    /// completion. Closing an already closed session does nothing.
    pub fn close(&self) {
        if self.shared.set_closed(None) {
            debug!("session close requested: id={}", self.shared.id);
        }
    }
}
