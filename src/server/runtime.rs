//! Runtime control for [`SessionServer`].

mod accept;
mod backoff;

use std::sync::Arc;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::{info, warn};
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, HandlerFactory, ServerError, SessionServer};

impl<F> SessionServer<F, Bound>
where
    F: HandlerFactory,
{
    /// Run the server until a shutdown signal is received.
    ///
    /// Spawns the configured number of worker tasks and awaits Ctrl+C for shutdown.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use async_trait::async_trait;
    /// use sessionwire::{
    ///     error::{HandlerError, SessionError},
    ///     reader::Body,
    ///     server::{ServerError, SessionServer},
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
    /// # async fn main() -> Result<(), ServerError> {
    /// SessionServer::new(|| Sink)
    ///     .bind(([127, 0, 0, 1], 7878).into())?
    ///     .run()
    ///     .await
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors. The signature leaves room for listener failures
    /// that cannot be retried.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// On shutdown the workers stop accepting, every live session is asked to
    /// close, and the call returns once all sessions have finished.
    ///
    /// Attempting to run a server without binding fails to compile:
    ///
    /// ```compile_fail
    /// use sessionwire::server::SessionServer;
    /// # use sessionwire::{error::{HandlerError, SessionError}, reader::Body, session::{SessionHandle, SessionHandler}};
    /// # struct Sink;
    /// # #[async_trait::async_trait]
    /// # impl SessionHandler for Sink {
    /// #     async fn on_message(&self, _: &SessionHandle, _: u32, _: Body<'_>) -> Result<(), HandlerError> { Ok(()) }
    /// #     fn on_close(&self, _: &SessionHandle, _: Option<SessionError>) {}
    /// # }
    ///
    /// async fn try_run_with_shutdown() {
    ///     SessionServer::new(|| Sink)
    ///         .run_with_shutdown(async {})
    ///         .await
    ///         .expect("unbound servers do not expose run_with_shutdown()");
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let SessionServer {
            factory,
            config,
            ready_tx,
            registry,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        for _ in 0..config.workers.max(1) {
            tracker.spawn(accept_loop(
                Arc::clone(&listener),
                factory.clone(),
                AcceptLoopOptions {
                    shutdown: shutdown_token.clone(),
                    tracker: tracker.clone(),
                    backoff: config.backoff,
                    session: config.session,
                    nodelay: config.nodelay,
                    registry: Arc::clone(&registry),
                },
            ));
        }

        // Signal readiness after all workers have been spawned.
        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => {},
            () = tracker.wait() => {},
        }
        shutdown_token.cancel();

        let closing = registry.close_all();
        info!("server shutting down: sessions_closing={closing}");
        tracker.close();
        tracker.wait().await;
        Ok(())
    }
}
