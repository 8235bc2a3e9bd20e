//! Test helpers shared across server modules.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use async_trait::async_trait;
use rstest::fixture;

use super::{Bound, SessionServer};
use crate::{
    error::{HandlerError, SessionError},
    reader::Body,
    session::{SessionHandle, SessionHandler},
};

/// Handler that discards every frame.
#[derive(Debug, Default)]
pub struct NullHandler;

#[async_trait]
impl SessionHandler for NullHandler {
    async fn on_message(
        &self,
        _session: &SessionHandle,
        _message_type: u32,
        _body: Body<'_>,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_close(&self, _session: &SessionHandle, _err: Option<SessionError>) {}
}

#[fixture]
pub fn factory() -> impl Fn() -> NullHandler + Send + Sync + Clone + 'static { || NullHandler }

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents race conditions where another
/// process could claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

pub fn bind_server<F>(factory: F, listener: StdTcpListener) -> SessionServer<F, Bound>
where
    F: Fn() -> NullHandler + Send + Sync + Clone + 'static,
{
    SessionServer::new(factory)
        .bind_listener(listener)
        .expect("Failed to bind")
}
