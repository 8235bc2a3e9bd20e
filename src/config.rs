//! Session and server configuration.
//!
//! [`SessionConfig`] collects the per-session tunables: the idle read timeout,
//! pipe geometry, socket buffer sizes, and the bound on legacy text lines.
//! [`ServerConfig`] adds the accept-side settings of
//! [`SessionServer`](crate::server::SessionServer). Both derive serde traits
//! so services can embed them in their own configuration files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    pipe::{DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE},
    server::BackoffConfig,
};

/// Default number of pipe pages appended per locked write.
pub const DEFAULT_WRITE_CHUNK_PAGES: usize = 4;

/// Default capacity of the buffered socket reader and writer.
pub const DEFAULT_IO_BUFFER_CAPACITY: usize = 8 * 1024;

/// Default bound on a legacy text line, excluding the terminator.
pub const DEFAULT_MAX_TEXT_LINE: usize = 64 * 1024;

/// Tunables applied to a single [`Session`](crate::session::Session).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use sessionwire::config::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_read_timeout(Some(Duration::from_secs(30)))
///     .with_page_size(1024);
/// assert_eq!(config.read_timeout, Some(Duration::from_secs(30)));
/// assert_eq!(config.write_chunk_size(), 4096);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline applied to every underlying socket read. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Page size of the outbound pipe.
    pub page_size: usize,
    /// Number of pages appended to the pipe per locked write.
    pub write_chunk_pages: usize,
    /// Bytes requested from the socket per underlying read.
    pub read_buffer_capacity: usize,
    /// Capacity of the buffered socket writer.
    pub write_buffer_capacity: usize,
    /// Longest accepted legacy text line in bytes.
    pub max_text_line: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            page_size: DEFAULT_PAGE_SIZE,
            write_chunk_pages: DEFAULT_WRITE_CHUNK_PAGES,
            read_buffer_capacity: DEFAULT_IO_BUFFER_CAPACITY,
            write_buffer_capacity: DEFAULT_IO_BUFFER_CAPACITY,
            max_text_line: DEFAULT_MAX_TEXT_LINE,
        }
    }
}

impl SessionConfig {
    /// Set the idle read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the pipe page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set how many pages each locked write may append.
    #[must_use]
    pub fn with_write_chunk_pages(mut self, pages: usize) -> Self {
        self.write_chunk_pages = pages;
        self
    }

    /// Set the socket read and write buffer capacities.
    #[must_use]
    pub fn with_io_buffer_capacity(mut self, read: usize, write: usize) -> Self {
        self.read_buffer_capacity = read;
        self.write_buffer_capacity = write;
        self
    }

    /// Set the longest accepted legacy text line.
    #[must_use]
    pub fn with_max_text_line(mut self, max: usize) -> Self {
        self.max_text_line = max;
        self
    }

    /// Clamp values to workable bounds.
    ///
    /// Zero-length buffers, pages, and chunk counts are raised to their
    /// minimum, and a zero read timeout is treated as "no timeout".
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use sessionwire::config::SessionConfig;
    ///
    /// let config = SessionConfig::default()
    ///     .with_page_size(0)
    ///     .with_write_chunk_pages(0)
    ///     .with_read_timeout(Some(Duration::ZERO))
    ///     .normalized();
    /// assert_eq!(config.page_size, 64);
    /// assert_eq!(config.write_chunk_pages, 1);
    /// assert_eq!(config.read_timeout, None);
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.page_size = self.page_size.max(MIN_PAGE_SIZE);
        self.write_chunk_pages = self.write_chunk_pages.max(1);
        self.read_buffer_capacity = self.read_buffer_capacity.max(MIN_PAGE_SIZE);
        self.write_buffer_capacity = self.write_buffer_capacity.max(MIN_PAGE_SIZE);
        self.max_text_line = self.max_text_line.max(1);
        self.read_timeout = self.read_timeout.filter(|timeout| !timeout.is_zero());
        self
    }

    /// Largest slice appended to the pipe under one lock acquisition.
    #[must_use]
    pub fn write_chunk_size(&self) -> usize {
        self.page_size
            .max(MIN_PAGE_SIZE)
            .saturating_mul(self.write_chunk_pages.max(1))
    }
}

/// Settings for [`SessionServer`](crate::server::SessionServer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Number of accept worker tasks.
    pub workers: usize,
    /// Back-off applied after failed accepts.
    pub backoff: BackoffConfig,
    /// Configuration applied to every session.
    pub session: SessionConfig,
    /// Whether to set `TCP_NODELAY` on accepted sockets.
    pub nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            backoff: BackoffConfig::default(),
            session: SessionConfig::default(),
            nodelay: true,
        }
    }
}
