//! Utilities for driving a [`Session`](sessionwire::session::Session) over
//! in-memory streams during tests.
//!
//! [`recording_session`] serves a session on one end of a
//! `tokio::io::duplex` pipe and hands back the other end, a handle to the
//! session, and a channel receiving every handler callback.
//!
//! ```rust
//! use sessionwire::config::SessionConfig;
//! use sessionwire_testing::{Event, RecordingHandler, frame, recording_session};
//! use tokio::io::AsyncWriteExt;
//!
//! # async fn demo() -> std::io::Result<()> {
//! let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default());
//! pair.peer.write_all(&frame(7, b"hi")).await?;
//! # Ok(())
//! # }
//! ```

pub mod frames;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod pair;

pub use frames::{frame, message_frame, text_frame};
pub use handler::{Event, RecordingHandler};
pub use logging::{LoggerHandle, logger};
pub use pair::{DEFAULT_CAPACITY, SessionPair, next_event, recording_session, spawn_session};
