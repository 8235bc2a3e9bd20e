//! Handler that forwards every callback into a channel.

use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use bytes::Bytes;
use sessionwire::{
    error::{HandlerError, SessionError},
    reader::Body,
    session::{ConnectionId, SessionHandle, SessionHandler},
};
use tokio::sync::mpsc;

/// A handler callback observed by [`RecordingHandler`].
#[derive(Debug)]
pub enum Event {
    /// `on_ready` ran.
    Ready(ConnectionId),
    /// `on_message` ran; `body` holds the bytes the handler read.
    Message {
        /// Frame type.
        message_type: u32,
        /// Declared body size.
        size: usize,
        /// Bytes consumed by the handler.
        body: Bytes,
    },
    /// `on_text` ran.
    Text(Bytes),
    /// `on_close` ran.
    Closed(Option<SessionError>),
}

/// Handler recording callbacks into an unbounded channel.
///
/// Behaviour is tuned with builder methods: read only part of each body,
/// echo frames back, fail on chosen types, or accept legacy text lines.
#[derive(Debug)]
pub struct RecordingHandler {
    events: mpsc::UnboundedSender<Event>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    read_limit: Option<usize>,
    echo: bool,
    text: bool,
    fail_on: HashSet<u32>,
}

impl Default for RecordingHandler {
    fn default() -> Self { Self::new() }
}

impl RecordingHandler {
    /// Create a handler that reads every body in full.
    #[must_use]
    pub fn new() -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            events,
            receiver: Mutex::new(Some(receiver)),
            read_limit: None,
            echo: false,
            text: false,
            fail_on: HashSet::new(),
        }
    }

    /// Read at most `limit` bytes of each body, leaving the rest unread.
    #[must_use]
    pub fn read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit);
        self
    }

    /// Write every received frame back to the peer.
    #[must_use]
    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Accept legacy text lines.
    #[must_use]
    pub fn accept_text(mut self) -> Self {
        self.text = true;
        self
    }

    /// Return an error from `on_message` for frames of `message_type`.
    #[must_use]
    pub fn fail_on(mut self, message_type: u32) -> Self {
        self.fail_on.insert(message_type);
        self
    }

    /// Take the receiving end of the event channel.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub fn take_events(&self) -> mpsc::UnboundedReceiver<Event> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .expect("events already taken")
    }

    fn record(&self, event: Event) { let _ = self.events.send(event); }
}

#[async_trait]
impl SessionHandler for RecordingHandler {
    fn on_ready(&self, session: &SessionHandle) { self.record(Event::Ready(session.id())); }

    async fn on_message(
        &self,
        session: &SessionHandle,
        message_type: u32,
        mut body: Body<'_>,
    ) -> Result<(), HandlerError> {
        let size = body.size();
        let limit = self.read_limit.unwrap_or(size).min(size);
        let mut buf = vec![0_u8; limit];
        body.read_exact(&mut buf).await?;
        let body = Bytes::from(buf);
        if self.echo {
            session.write_frame(message_type, &body)?;
        }
        self.record(Event::Message {
            message_type,
            size,
            body,
        });
        if self.fail_on.contains(&message_type) {
            return Err(format!("rejected message type {message_type}").into());
        }
        Ok(())
    }

    fn on_close(&self, _session: &SessionHandle, err: Option<SessionError>) {
        self.record(Event::Closed(err));
    }

    fn accepts_text(&self) -> bool { self.text }

    async fn on_text(&self, session: &SessionHandle, line: Bytes) -> Result<(), HandlerError> {
        if self.echo {
            let mut reply = line.to_vec();
            reply.push(b'\n');
            session.write(&reply)?;
        }
        self.record(Event::Text(line));
        Ok(())
    }
}
