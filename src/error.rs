//! Canonical session error type.
//!
//! [`SessionError`] is the terminal error a session reports through
//! [`SessionHandler::on_close`](crate::session::SessionHandler::on_close) and
//! the error returned by writes on a closed session.

use std::{error::Error as StdError, io};

use thiserror::Error;

use crate::codec::CodecError;

/// Error returned by message handlers. Any handler error closes the session.
pub type HandlerError = Box<dyn StdError + Send + Sync>;

/// Errors that terminate or reject session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is closed and accepts no further output.
    #[error("session closed")]
    Closed,

    /// The connection failed while reading or writing.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// A frame header or body could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(#[source] CodecError),

    /// A message handler returned an error.
    #[error("handler error: {0}")]
    Handler(#[source] HandlerError),

    /// A session task panicked.
    #[error("session task panicked: {0}")]
    Panicked(String),
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => Self::Io(e),
            other => Self::Codec(other),
        }
    }
}

impl SessionError {
    /// Wrap an error returned by a handler.
    ///
    /// Transport and codec errors a handler propagated from its [`Body`]
    /// are surfaced unchanged rather than as [`SessionError::Handler`].
    ///
    /// [`Body`]: crate::reader::Body
    #[must_use]
    pub fn from_handler(err: HandlerError) -> Self {
        let err = match err.downcast::<io::Error>() {
            Ok(e) => return Self::Io(*e),
            Err(other) => other,
        };
        match err.downcast::<CodecError>() {
            Ok(e) => Self::from(*e),
            Err(other) => Self::Handler(other),
        }
    }

    /// Underlying I/O error, if any.
    #[must_use]
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` for errors caused by the peer or the network rather than
    /// by this process.
    ///
    /// This covers end-of-stream at any point, resets, aborts, broken pipes,
    /// idle timeouts, and disconnected sockets. Both kinds close the session
    /// identically; the distinction only drives log levels.
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        match self {
            Self::Codec(e) => e.is_eof(),
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }

    /// Returns `true` if the peer reset or aborted the connection.
    #[must_use]
    pub fn is_connection_reset(&self) -> bool {
        self.io_error().is_some_and(|e| {
            matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
            )
        })
    }

    /// Returns `true` when the peer closed the stream between frames.
    #[must_use]
    pub fn is_clean_close(&self) -> bool { matches!(self, Self::Codec(e) if e.is_clean_close()) }

    /// Returns the error category as a string for logging and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Io(_) => "io",
            Self::Codec(e) => e.error_type(),
            Self::Handler(_) => "handler",
            Self::Panicked(_) => "panic",
        }
    }
}
