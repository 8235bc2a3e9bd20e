#![doc(html_root_url = "https://docs.rs/sessionwire/latest")]
//! Public API for the `sessionwire` library.
//!
//! This crate runs full-duplex framed sessions over byte streams. Each frame
//! is `varint(type) varint(size) body`. A [`Session`](session::Session)
//! delivers inbound frames to a [`SessionHandler`](session::SessionHandler)
//! in order, while any number of producers append output through cloned
//! [`SessionHandle`](session::SessionHandle)s. The [`server`] module accepts
//! TCP connections and runs one session per connection.

pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod metrics;
pub mod panic;
pub mod pipe;
pub mod prelude;
pub mod reader;
pub mod registry;
pub mod server;
pub mod session;

pub use codec::{CodecError, MAX_SIZE, MAX_TYPE, TEXT_MESSAGE_TYPE};
pub use config::{ServerConfig, SessionConfig};
pub use error::{HandlerError, SessionError};
pub use metrics::{BYTES_WRITTEN, Direction, ERRORS_TOTAL, FRAMES_PROCESSED, SESSIONS_ACTIVE};
pub use session::{ConnectionId, Session, SessionHandle, SessionHandler, SessionRegistry};
