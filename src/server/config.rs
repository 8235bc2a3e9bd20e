//! Builder methods and listener binding for [`SessionServer`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::{net::TcpListener, sync::oneshot};

use super::{Bound, HandlerFactory, ServerError, ServerState, SessionServer, Unbound};
use crate::{
    config::{ServerConfig, SessionConfig},
    server::BackoffConfig,
    session::SessionRegistry,
};

impl<F> SessionServer<F, Unbound>
where
    F: HandlerFactory,
{
    /// Create a new `SessionServer` from the given handler factory.
    ///
    /// The worker count defaults to the number of available CPU cores (or 1
    /// if this cannot be determined). Call [`bind`](Self::bind) before
    /// running the server.
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            config: ServerConfig::default(),
            ready_tx: None,
            registry: Arc::new(SessionRegistry::new()),
            state: Unbound,
        }
    }

    /// Return `None` as the server is not bound.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Bind to a fresh address.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::{Ipv4Addr, SocketAddr};
    ///
    /// use async_trait::async_trait;
    /// use sessionwire::{
    ///     error::{HandlerError, SessionError},
    ///     reader::Body,
    ///     server::SessionServer,
    ///     session::{SessionHandle, SessionHandler},
    /// };
    ///
    /// struct Sink;
    ///
    /// #[async_trait]
    /// impl SessionHandler for Sink {
    ///     async fn on_message(&self, _: &SessionHandle, _: u32, _: Body<'_>) -> Result<(), HandlerError> {
    ///         Ok(())
    ///     }
    ///
    ///     fn on_close(&self, _: &SessionHandle, _: Option<SessionError>) {}
    /// }
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let server = SessionServer::new(|| Sink)
    ///     .bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    ///     .expect("bind failed");
    /// assert!(server.local_addr().is_some());
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: SocketAddr) -> Result<SessionServer<F, Bound>, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_listener(std_listener)
    }

    /// Bind to an existing standard TCP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if configuring the listener fails.
    pub fn bind_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<SessionServer<F, Bound>, ServerError> {
        let SessionServer {
            factory,
            config,
            ready_tx,
            registry,
            ..
        } = self;
        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;
        Ok(SessionServer {
            factory,
            config,
            ready_tx,
            registry,
            state: Bound {
                listener: Arc::new(listener),
            },
        })
    }
}

impl<F> SessionServer<F, Bound>
where
    F: HandlerFactory,
{
    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}

impl<F, S> SessionServer<F, S>
where
    F: HandlerFactory,
    S: ServerState,
{
    /// Replace the whole server configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of accept worker tasks. Zero is raised to one.
    #[must_use]
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count.max(1);
        self
    }

    /// Set the accept back-off policy.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Set the configuration applied to every session.
    #[must_use]
    pub fn session_config(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    /// Enable or disable `TCP_NODELAY` on accepted sockets.
    #[must_use]
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Configure a channel used to signal when the server is ready to accept
    /// connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Returns the configured number of worker tasks.
    #[inline]
    #[must_use]
    pub const fn worker_count(&self) -> usize { self.config.workers }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Registry of the sessions this server is running.
    #[must_use]
    pub fn registry(&self) -> Arc<SessionRegistry> { Arc::clone(&self.registry) }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::server::test_util::{NullHandler, factory, free_listener};

    #[rstest]
    fn new_server_is_unbound(factory: impl Fn() -> NullHandler + Send + Sync + Clone + 'static) {
        let server = SessionServer::new(factory);
        assert!(server.worker_count() >= 1);
        assert!(server.local_addr().is_none());
        assert!(server.registry().is_empty());
    }

    #[rstest]
    fn workers_are_clamped(factory: impl Fn() -> NullHandler + Send + Sync + Clone + 'static) {
        let server = SessionServer::new(factory).workers(4);
        assert_eq!(server.worker_count(), 4);
        let server = server.workers(0);
        assert_eq!(server.worker_count(), 1);
    }

    #[rstest]
    fn builders_update_config(factory: impl Fn() -> NullHandler + Send + Sync + Clone + 'static) {
        let backoff = BackoffConfig {
            initial_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(50),
        };
        let session = SessionConfig::default().with_read_timeout(Some(Duration::from_secs(3)));
        let server = SessionServer::new(factory)
            .backoff(backoff)
            .session_config(session)
            .nodelay(false);
        assert_eq!(server.config().backoff, backoff);
        assert_eq!(server.config().session, session);
        assert!(!server.config().nodelay);
    }

    #[rstest]
    #[tokio::test]
    async fn bind_listener_reports_address(
        factory: impl Fn() -> NullHandler + Send + Sync + Clone + 'static,
        free_listener: StdTcpListener,
    ) {
        let expected = free_listener.local_addr().expect("listener address");
        let server = SessionServer::new(factory)
            .bind_listener(free_listener)
            .expect("bind listener");
        assert_eq!(server.local_addr(), Some(expected));
    }
}
