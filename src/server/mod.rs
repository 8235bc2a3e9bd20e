//! Tokio-based TCP server running one [`Session`](crate::session::Session)
//! per accepted connection.
//!
//! `SessionServer` spawns worker tasks that accept connections, builds a
//! fresh handler for each connection from a factory, and serves the session
//! on a tracked task. Live sessions are recorded in a shared
//! [`SessionRegistry`] so that other tasks can write to them and so that
//! shutdown can close them gracefully.

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::{
    config::ServerConfig,
    session::{SessionHandler, SessionRegistry},
};

/// Factory producing one handler per accepted connection.
///
/// Implemented for every cloneable closure returning a [`SessionHandler`].
pub trait HandlerFactory: Send + Sync + Clone + 'static {
    /// Handler type produced for each connection.
    type Handler: SessionHandler;

    /// Build the handler for a new connection.
    fn build(&self) -> Self::Handler;
}

impl<F, H> HandlerFactory for F
where
    F: Fn() -> H + Send + Sync + Clone + 'static,
    H: SessionHandler,
{
    type Handler = H;

    fn build(&self) -> H { self() }
}

/// Tokio-based server for framed sessions.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`bind`](SessionServer::bind) or
/// [`bind_listener`](SessionServer::bind_listener) before running.
pub struct SessionServer<F, S = Unbound>
where
    F: HandlerFactory,
    S: ServerState,
{
    pub(crate) factory: F,
    pub(crate) config: ServerConfig,
    /// Channel used to notify when the server is ready.
    ///
    /// A `oneshot::Sender` can transmit only one readiness notification, so a
    /// new sender must be provided each time the server is started.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) registry: Arc<SessionRegistry>,
    /// Typestate tracking whether the server has been bound to a listener.
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
/// Re-exported configuration type for accept back-off behaviour.
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;
