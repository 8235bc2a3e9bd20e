//! Optional convenience imports for writing session handlers.
//!
//! # Examples
//!
//! ```rust
//! use sessionwire::prelude::*;
//!
//! struct Quiet;
//!
//! #[async_trait::async_trait]
//! impl SessionHandler for Quiet {
//!     async fn on_message(&self, _: &SessionHandle, _: u32, _: Body<'_>) -> Result<(), HandlerError> {
//!         Ok(())
//!     }
//!
//!     fn on_close(&self, _: &SessionHandle, _: Option<SessionError>) {}
//! }
//! ```

pub use crate::{
    config::SessionConfig,
    error::{HandlerError, SessionError},
    message::{Message, TypedMessage},
    reader::Body,
    registry::MessageRegistry,
    server::{ServerError, SessionServer},
    session::{Session, SessionHandle, SessionHandler},
};
