//! Full-duplex framed session over one connection.
//!
//! A [`Session`] owns a connection and runs two tasks over it. The read task
//! decodes `varint(type) varint(size) body` frames and hands each body to the
//! [`SessionHandler`] through a bounded [`Body`]. The write task drains the
//! session's pipe to the connection whenever producers append to it through
//! a [`SessionHandle`].
//!
//! [`Session::serve`] is the join point: it returns once both tasks have
//! stopped, the remaining output has been flushed, the connection has been
//! closed, and `on_close` has been delivered.

use std::{
    io,
    net::SocketAddr,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter},
    select,
    sync::oneshot,
    task::JoinError,
};

mod handle;
mod handler;
mod registry;

pub use handle::SessionHandle;
use handle::Shared;
pub use handler::SessionHandler;
pub use registry::{ConnectionId, SessionRegistry};

use crate::{
    codec::{TEXT_MESSAGE_TYPE, uvarint_len},
    config::SessionConfig,
    error::SessionError,
    metrics::{self, Direction},
    panic::format_panic,
    reader::{Body, BoxedRead, FrameReader},
};

/// Boxed write half owned by a session.
pub type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

type Halves = (BoxedRead, BoxedWrite);

/// Builder for a [`Session`].
pub struct SessionBuilder<H> {
    io: Halves,
    handler: H,
    config: SessionConfig,
    id: Option<ConnectionId>,
    peer_addr: Option<SocketAddr>,
}

impl<H: SessionHandler> SessionBuilder<H> {
    /// Use `config` instead of [`SessionConfig::default`].
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `id` instead of a freshly allocated identifier.
    #[must_use]
    pub fn id(mut self, id: ConnectionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Record the remote address of the connection.
    #[must_use]
    pub fn peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Finish building the session. Nothing runs until [`Session::serve`].
    #[must_use]
    pub fn build(self) -> Session<H> {
        let shared = Shared::new(
            self.id.unwrap_or_else(ConnectionId::next),
            self.peer_addr,
            self.config.normalized(),
        );
        Session {
            handle: SessionHandle::from_arc(Arc::new(shared)),
            handler: Arc::new(self.handler),
            io: Mutex::new(Some(self.io)),
            started: AtomicBool::new(false),
        }
    }
}

/// One framed connection and its handler.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use sessionwire::{
///     error::{HandlerError, SessionError},
///     reader::Body,
///     session::{Session, SessionHandle, SessionHandler},
/// };
///
/// struct Quiet;
///
/// #[async_trait]
/// impl SessionHandler for Quiet {
///     async fn on_message(&self, _: &SessionHandle, _: u32, _: Body<'_>) -> Result<(), HandlerError> {
///         Ok(())
///     }
///
///     fn on_close(&self, _: &SessionHandle, err: Option<SessionError>) { assert!(err.is_none()); }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let (local, _remote) = tokio::io::duplex(1024);
/// let session = Session::new(local, Quiet);
/// let handle = session.handle();
/// handle.write(b"queued").unwrap();
/// handle.close();
/// session.serve().await;
/// # }
/// ```
pub struct Session<H> {
    handle: SessionHandle,
    handler: Arc<H>,
    io: Mutex<Option<Halves>>,
    started: AtomicBool,
}

impl<H> std::fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.handle.id())
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<H: SessionHandler> Session<H> {
    /// Start building a session over `stream`.
    pub fn builder<S>(stream: S, handler: H) -> SessionBuilder<H>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        SessionBuilder {
            io: (Box::new(read), Box::new(write)),
            handler,
            config: SessionConfig::default(),
            id: None,
            peer_addr: None,
        }
    }

    /// Create a session over `stream` with the default configuration.
    pub fn new<S>(stream: S, handler: H) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::builder(stream, handler).build()
    }

    /// Handle for writing to and closing this session.
    #[must_use]
    pub fn handle(&self) -> SessionHandle { self.handle.clone() }

    /// Identifier of this session.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.handle.id() }

    /// Request a graceful close. See [`SessionHandle::close`].
    pub fn close(&self) { self.handle.close(); }

    /// Run the session until it closes.
    ///
    /// Spawns the write task and the read task, waits until both report
    /// ready, calls `on_ready`, then waits for both to finish. The remaining
    /// output is flushed and the connection closed before `on_close`.
    ///
    /// Only the first call does anything; later calls return immediately.
    pub async fn serve(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("session already served: id={}", self.id());
            return;
        }
        let Some((read, write)) = self
            .io
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let shared = Arc::clone(&self.handle.shared);
        let config = shared.config;
        metrics::inc_sessions();
        debug!(
            "session serving: id={}, peer_addr={:?}",
            shared.id, shared.peer_addr
        );

        let (write_ready_tx, write_ready_rx) = oneshot::channel();
        let (read_ready_tx, read_ready_rx) = oneshot::channel();
        let (start_tx, start_rx) = oneshot::channel();

        let writer = BufWriter::with_capacity(config.write_buffer_capacity, write);
        let write_task = tokio::spawn(write_loop(Arc::clone(&shared), writer, write_ready_tx));
        let reader = FrameReader::new(read, config.read_buffer_capacity)
            .with_read_timeout(config.read_timeout);
        let read_task = tokio::spawn(read_loop(
            self.handle.clone(),
            Arc::clone(&self.handler),
            reader,
            read_ready_tx,
            start_rx,
        ));

        if write_ready_rx.await.is_ok() && read_ready_rx.await.is_ok() {
            let handler = &self.handler;
            let handle = &self.handle;
            match std::panic::catch_unwind(AssertUnwindSafe(|| handler.on_ready(handle))) {
                Ok(()) => {
                    let _ = start_tx.send(());
                }
                Err(panic) => {
                    shared.set_closed(Some(SessionError::Panicked(
                        format_panic(&*panic).to_string(),
                    )));
                }
            }
        }

        let reader = match read_task.await {
            Ok(reader) => Some(reader),
            Err(e) => {
                shared.set_closed(Some(join_error("read", e)));
                None
            }
        };
        let writer = match write_task.await {
            Ok(writer) => Some(writer),
            Err(e) => {
                shared.set_closed(Some(join_error("write", e)));
                None
            }
        };

        if let Some(mut writer) = writer
            && let Err(e) = writer.shutdown().await
        {
            debug!("session shutdown failed: id={}, error={e}", shared.id);
        }
        drop(reader);

        let err = shared.take_error();
        log_close(&shared, err.as_ref());
        metrics::dec_sessions();
        self.handler.on_close(&self.handle, err);
    }
}

fn join_error(task: &str, err: JoinError) -> SessionError {
    if err.is_panic() {
        SessionError::Panicked(format_panic(&*err.into_panic()).to_string())
    } else {
        SessionError::Io(io::Error::new(
            io::ErrorKind::Interrupted,
            format!("session {task} task cancelled"),
        ))
    }
}

fn log_close(shared: &Shared, err: Option<&SessionError>) {
    let id = shared.id;
    let peer_addr = shared.peer_addr;
    match err {
        None => debug!("session closed: id={id}, peer_addr={peer_addr:?}"),
        Some(e) => {
            metrics::inc_errors(e.error_type());
            if e.is_connection_reset() {
                info!("session reset by peer: id={id}, peer_addr={peer_addr:?}, error={e}");
            } else if e.is_network_error() {
                debug!("session disconnected: id={id}, peer_addr={peer_addr:?}, error={e}");
            } else {
                warn!(
                    "session failed: id={id}, peer_addr={peer_addr:?}, error={e}, \
                     error_type={}",
                    e.error_type()
                );
            }
        }
    }
}

/// Drain the pipe into `writer` until the session closes.
///
/// Returns the writer so `serve` can shut the connection down after the
/// final flush.
async fn write_loop(
    shared: Arc<Shared>,
    mut writer: BufWriter<BoxedWrite>,
    ready: oneshot::Sender<()>,
) -> BufWriter<BoxedWrite> {
    let _ = ready.send(());
    if let Err(e) = drain(&shared, &mut writer).await {
        shared.set_closed(Some(SessionError::Io(e)));
    }
    writer
}

async fn drain(shared: &Shared, writer: &mut BufWriter<BoxedWrite>) -> io::Result<()> {
    let mut scratch = vec![0_u8; shared.config.write_chunk_size()];
    let mut unflushed = 0;
    loop {
        let (n, closed) = {
            let mut state = shared.lock();
            (state.pipe.read(&mut scratch), state.closed)
        };
        if n > 0 {
            writer.write_all(&scratch[..n]).await?;
            unflushed += n;
            continue;
        }
        if unflushed > 0 {
            writer.flush().await?;
            metrics::add_bytes_written(unflushed);
            unflushed = 0;
        }
        // The pipe was empty under the same lock that reported `closed`, and
        // writes are rejected once closed, so nothing is left behind.
        if closed {
            return Ok(());
        }
        shared.writable.notified().await;
    }
}

/// Deliver frames to `handler` until the session closes.
///
/// Returns the reader so the connection's read half outlives the final
/// flush.
async fn read_loop<H: SessionHandler>(
    handle: SessionHandle,
    handler: Arc<H>,
    mut reader: FrameReader,
    ready: oneshot::Sender<()>,
    start: oneshot::Receiver<()>,
) -> FrameReader {
    let _ = ready.send(());
    if start.await.is_err() {
        return reader;
    }
    let shared = Arc::clone(&handle.shared);
    while !shared.is_closed() {
        // Only the wait for the next header races the close token. A frame
        // whose type has arrived is read and handled to completion.
        reader.unbound();
        let message_type = select! {
            biased;

            () = shared.closing.cancelled() => break,
            res = reader.read_type() => res,
        };
        let result = match message_type {
            Ok(message_type) => {
                read_frame(&handle, handler.as_ref(), &mut reader, message_type).await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            shared.set_closed(Some(e));
            break;
        }
    }
    reader
}

async fn read_frame<H: SessionHandler>(
    handle: &SessionHandle,
    handler: &H,
    reader: &mut FrameReader,
    message_type: u32,
) -> Result<(), SessionError> {
    if message_type == TEXT_MESSAGE_TYPE && handler.accepts_text() {
        let line = reader.read_line(handle.config().max_text_line).await?;
        metrics::inc_frames(Direction::Inbound);
        return handler
            .on_text(handle, line)
            .await
            .map_err(SessionError::from_handler);
    }
    let size = reader
        .read_size(uvarint_len(u64::from(message_type)))
        .await?;
    metrics::inc_frames(Direction::Inbound);
    handler
        .on_message(handle, message_type, Body::new(reader, size))
        .await
        .map_err(SessionError::from_handler)?;
    reader.discard_remaining().await?;
    Ok(())
}
