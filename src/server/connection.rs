//! Connection handling for [`SessionServer`](super::SessionServer).

use std::{net::SocketAddr, sync::Arc};

use futures::FutureExt;
use log::{error, warn};
use tokio::net::TcpStream;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::HandlerFactory;
use crate::{
    config::SessionConfig,
    panic::format_panic,
    session::{Session, SessionRegistry},
};

/// Per-server state shared by every connection task.
#[derive(Clone, Debug)]
pub(super) struct ConnectionContext {
    pub session: SessionConfig,
    pub nodelay: bool,
    pub registry: Arc<SessionRegistry>,
    pub shutdown: CancellationToken,
}

/// Spawn a task serving one TCP connection, logging and discarding any panics.
pub(super) fn spawn_connection_task<F>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    factory: F,
    context: &ConnectionContext,
    tracker: &TaskTracker,
) where
    F: HandlerFactory,
{
    if context.nodelay
        && let Err(e) = stream.set_nodelay(true)
    {
        warn!("failed to set TCP_NODELAY: error={e}, peer_addr={peer_addr}");
    }
    let context = context.clone();
    tracker.spawn(async move {
        let fut = std::panic::AssertUnwindSafe(serve_connection(stream, peer_addr, factory, context))
            .catch_unwind();

        if let Err(panic) = fut.await {
            let panic_msg = format_panic(&*panic);
            // Emit via both `log` and `tracing` for tests that capture either.
            error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr}");
            tracing::error!(panic = %panic_msg, %peer_addr, "connection task panicked");
        }
    });
}

async fn serve_connection<F>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    factory: F,
    context: ConnectionContext,
) where
    F: HandlerFactory,
{
    let session = Session::builder(stream, factory.build())
        .config(context.session)
        .peer_addr(peer_addr)
        .build();
    let handle = session.handle();
    let id = handle.id();
    context.registry.insert(&handle);
    // Shutdown may have swept the registry before this insert.
    if context.shutdown.is_cancelled() {
        handle.close();
    }
    session.serve().await;
    context.registry.remove(&id);
    tracing::debug!(%id, %peer_addr, "connection finished");
}
