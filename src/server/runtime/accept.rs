//! Accept-loop utilities for server runtime.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::backoff::BackoffConfig;
use crate::{
    config::SessionConfig,
    server::{HandlerFactory, connection::{ConnectionContext, spawn_connection_task}},
    session::SessionRegistry,
};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> { TcpListener::accept(self).await }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
    pub session: SessionConfig,
    pub nodelay: bool,
    pub registry: Arc<SessionRegistry>,
}

/// Accepts incoming connections and spawns a session task for each.
///
/// Failures to accept a connection trigger an exponential back-off governed
/// by `options.backoff`. The loop terminates when `options.shutdown` is
/// cancelled; every spawned session is tracked by `options.tracker`.
pub(in crate::server) async fn accept_loop<F, L>(
    listener: Arc<L>,
    factory: F,
    options: AcceptLoopOptions,
) where
    F: HandlerFactory,
    L: AcceptListener + 'static,
{
    let backoff = options.backoff.normalized();
    let context = ConnectionContext {
        session: options.session,
        nodelay: options.nodelay,
        registry: options.registry,
        shutdown: options.shutdown.clone(),
    };
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) = accept_iteration(
        listener.as_ref(),
        &factory,
        &context,
        &options.tracker,
        &backoff,
        delay,
    )
    .await
    {
        delay = next_delay;
    }
}

async fn accept_iteration<F, L>(
    listener: &L,
    factory: &F,
    context: &ConnectionContext,
    tracker: &TaskTracker,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration>
where
    F: HandlerFactory,
    L: AcceptListener,
{
    select! {
        biased;

        () = context.shutdown.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok((stream, peer_addr)) => {
                tracing::debug!(%peer_addr, "accepted connection");
                spawn_connection_task(stream, peer_addr, factory.clone(), context, tracker);
                backoff.initial_delay
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                tracing::warn!(error = %e, ?local_addr, ?delay, "accept error");
                sleep(delay).await;
                backoff.next_delay(delay)
            }
        }),
    }
}
