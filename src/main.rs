//! Echo server demonstrating `sessionwire` usage.
//!
//! Every framed message is written back to its sender with the same type.
//! Legacy text lines are echoed as text.

mod cli;

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use clap::Parser;
use sessionwire::{
    codec::{TEXT_MESSAGE_TYPE, encode_type},
    config::SessionConfig,
    error::{HandlerError, SessionError},
    reader::Body,
    server::SessionServer,
    session::{SessionHandle, SessionHandler},
};

struct Echo;

#[async_trait]
impl SessionHandler for Echo {
    fn on_ready(&self, session: &SessionHandle) {
        tracing::info!(id = %session.id(), peer_addr = ?session.peer_addr(), "session ready");
    }

    async fn on_message(
        &self,
        session: &SessionHandle,
        message_type: u32,
        mut body: Body<'_>,
    ) -> Result<(), HandlerError> {
        let bytes = body.read_to_end().await?;
        session.write_frame(message_type, &bytes)?;
        Ok(())
    }

    fn on_close(&self, session: &SessionHandle, err: Option<SessionError>) {
        match err {
            Some(e) if !e.is_network_error() => {
                tracing::warn!(id = %session.id(), error = %e, "session failed");
            }
            _ => tracing::info!(id = %session.id(), "session closed"),
        }
    }

    fn accepts_text(&self) -> bool { true }

    async fn on_text(&self, session: &SessionHandle, line: Bytes) -> Result<(), HandlerError> {
        let mut out = BytesMut::with_capacity(line.len() + 6);
        encode_type(&mut out, TEXT_MESSAGE_TYPE);
        out.put_slice(&line);
        out.put_u8(b'\n');
        session.write(&out)?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let session = SessionConfig::default()
        .with_read_timeout(cli.read_timeout_ms.map(Duration::from_millis));
    let mut server = SessionServer::new(|| Echo).session_config(session);
    if let Some(workers) = cli.workers {
        server = server.workers(workers);
    }
    let server = server.bind(cli.listen)?;
    tracing::info!(addr = ?server.local_addr(), "listening");
    server.run().await?;
    Ok(())
}
