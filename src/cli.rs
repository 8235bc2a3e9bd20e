//! Command line interface for the `sessionwire` echo server.
//!
//! Kept free of crate imports so the build script can include it to render
//! the man page.

use std::net::SocketAddr;

use clap::Parser;

/// Command line arguments for the `sessionwire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "sessionwire",
    version,
    about = "Echo server speaking varint-framed sessions"
)]
pub struct Cli {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    pub listen: SocketAddr,

    /// Close sessions idle for this many milliseconds.
    #[arg(long, value_name = "MS")]
    pub read_timeout_ms: Option<u64>,

    /// Number of accept workers. Defaults to the available parallelism.
    #[arg(short, long)]
    pub workers: Option<usize>,
}
