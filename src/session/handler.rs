//! Callback contract implemented by a session's owner.

use async_trait::async_trait;
use bytes::Bytes;

use super::SessionHandle;
use crate::{
    error::{HandlerError, SessionError},
    reader::Body,
};

/// Callbacks a [`Session`](super::Session) delivers to its owner.
///
/// `on_ready` runs once, after the read and write tasks are running and
/// before any message is delivered. `on_message` runs on the read task for
/// every complete frame, strictly in wire order; returning an error closes
/// the session with [`SessionError::Handler`]. `on_close` runs exactly once
/// with the terminal error, or `None` after a local [`close`].
///
/// [`close`]: SessionHandle::close
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use sessionwire::{
///     error::{HandlerError, SessionError},
///     reader::Body,
///     session::{SessionHandle, SessionHandler},
/// };
///
/// struct Echo;
///
/// #[async_trait]
/// impl SessionHandler for Echo {
///     async fn on_message(
///         &self,
///         session: &SessionHandle,
///         message_type: u32,
///         mut body: Body<'_>,
///     ) -> Result<(), HandlerError> {
///         let bytes = body.read_to_end().await?;
///         session.write_frame(message_type, &bytes)?;
///         Ok(())
///     }
///
///     fn on_close(&self, _session: &SessionHandle, _err: Option<SessionError>) {}
/// }
/// ```
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    /// Called once both session tasks are running.
    fn on_ready(&self, session: &SessionHandle) { let _ = session; }

    /// Handle one frame. Unread body bytes are discarded afterwards.
    ///
    /// # Errors
    ///
    /// Any error closes the session.
    async fn on_message(
        &self,
        session: &SessionHandle,
        message_type: u32,
        body: Body<'_>,
    ) -> Result<(), HandlerError>;

    /// Called exactly once when the session has closed its connection.
    fn on_close(&self, session: &SessionHandle, err: Option<SessionError>);

    /// Whether frames of type [`TEXT_MESSAGE_TYPE`](crate::codec::TEXT_MESSAGE_TYPE)
    /// announce a newline-terminated text line for [`on_text`](Self::on_text).
    fn accepts_text(&self) -> bool { false }

    /// Handle one legacy text line, stripped of its terminator.
    ///
    /// # Errors
    ///
    /// Any error closes the session.
    async fn on_text(&self, session: &SessionHandle, line: Bytes) -> Result<(), HandlerError> {
        let _ = (session, line);
        Ok(())
    }
}
