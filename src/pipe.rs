//! Page-allocated byte queue used as a session's outbound buffer.
//!
//! `PageBuffer` grows by whole pages and releases pages as they are drained,
//! so a burst of output does not pin a single large allocation. It performs
//! no locking; the session guards it with its own mutex.

use std::collections::VecDeque;

use bytes::{Buf, BufMut, BytesMut};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page size accepted by [`PageBuffer::with_page_size`].
pub const MIN_PAGE_SIZE: usize = 64;

/// Growable FIFO of bytes stored in fixed-size pages.
#[derive(Debug)]
pub struct PageBuffer {
    pages: VecDeque<BytesMut>,
    page_size: usize,
    len: usize,
}

impl Default for PageBuffer {
    fn default() -> Self { Self::with_page_size(DEFAULT_PAGE_SIZE) }
}

impl PageBuffer {
    /// Create an empty buffer with [`DEFAULT_PAGE_SIZE`] pages.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create an empty buffer using `page_size` byte pages.
    ///
    /// Sizes below [`MIN_PAGE_SIZE`] are raised to it.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            pages: VecDeque::new(),
            page_size: page_size.max(MIN_PAGE_SIZE),
            len: 0,
        }
    }

    /// Page size in bytes.
    #[must_use]
    pub fn page_size(&self) -> usize { self.page_size }

    /// Number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.len }

    /// Returns `true` if no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Number of pages currently allocated.
    #[must_use]
    pub fn page_count(&self) -> usize { self.pages.len() }

    /// Append all of `src`, returning the number of bytes written.
    pub fn write(&mut self, mut src: &[u8]) -> usize {
        let written = src.len();
        while !src.is_empty() {
            if self
                .pages
                .back()
                .is_none_or(|page| page.len() >= self.page_size)
            {
                self.pages.push_back(BytesMut::with_capacity(self.page_size));
            }
            let Some(page) = self.pages.back_mut() else {
                break;
            };
            let room = self.page_size - page.len();
            let take = room.min(src.len());
            page.put_slice(&src[..take]);
            src = &src[take..];
            self.len += take;
        }
        written
    }

    /// Move up to `dst.len()` bytes from the front of the buffer into `dst`,
    /// returning the number of bytes read.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let mut read = 0;
        while read < dst.len() {
            let Some(front) = self.pages.front_mut() else {
                break;
            };
            let take = front.len().min(dst.len() - read);
            dst[read..read + take].copy_from_slice(&front[..take]);
            front.advance(take);
            read += take;
            if front.is_empty() {
                self.pages.pop_front();
            }
        }
        self.len -= read;
        read
    }

    /// Discard all buffered bytes and release every page.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.len = 0;
    }
}
