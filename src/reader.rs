//! Bounded frame reader.
//!
//! [`FrameReader`] buffers the read half of a connection and tracks how many
//! bytes of the current frame body are still readable. While a header is
//! being read the reader is unbounded; once the body size is known the
//! session bounds it so that a handler can never read into the next frame.
//!
//! Every underlying socket read is subject to the optional idle timeout,
//! independent of the frame bound.
//!
//! Handlers receive the reader through [`Body`], which exposes only the
//! bounded operations.

use std::{io, time::Duration};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::{CodecError, EofError, FramingError, MAX_SIZE, MAX_TYPE, decode_uvarint};

/// Boxed read half accepted by [`FrameReader`].
pub type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;

/// Buffered reader over a connection with an optional frame bound.
pub struct FrameReader {
    inner: BoxedRead,
    buf: BytesMut,
    limit: Option<usize>,
    frame_size: usize,
    read_timeout: Option<Duration>,
    capacity: usize,
}

impl std::fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("buffered", &self.buf.len())
            .field("limit", &self.limit)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl FrameReader {
    /// Wrap `inner`, requesting up to `capacity` bytes per socket read.
    #[must_use]
    pub fn new(inner: BoxedRead, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
            limit: None,
            frame_size: 0,
            read_timeout: None,
            capacity,
        }
    }

    /// Apply `timeout` to every subsequent socket read.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Configured idle read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> { self.read_timeout }

    /// Restrict subsequent reads to `size` bytes.
    pub fn bound(&mut self, size: usize) {
        self.limit = Some(size);
        self.frame_size = size;
    }

    /// Lift the frame bound so a header can be read.
    pub fn unbound(&mut self) {
        self.limit = None;
        self.frame_size = 0;
    }

    /// Bytes still readable in the current frame, or `None` when unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<usize> { self.limit }

    /// Bytes received from the socket but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buf.len() }

    fn allowance(&self, wanted: usize) -> usize { self.limit.map_or(wanted, |limit| limit.min(wanted)) }

    fn consume(&mut self, n: usize) {
        self.buf.advance(n);
        if let Some(limit) = self.limit.as_mut() {
            *limit -= n;
        }
    }

    fn mid_frame_eof(&self) -> io::Error {
        // Bytes already buffered count as received even if not yet consumed.
        let remaining = self.limit.unwrap_or_default().saturating_sub(self.buf.len());
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            EofError::MidFrame {
                remaining,
                expected: self.frame_size,
            },
        )
    }

    /// Pull more bytes from the socket, returning how many arrived.
    ///
    /// `Ok(0)` means the peer closed its write side.
    async fn fill(&mut self) -> io::Result<usize> {
        self.buf.reserve(self.capacity);
        let read = self.inner.read_buf(&mut self.buf);
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))?,
            None => read.await,
        }
    }

    /// Read a single byte.
    ///
    /// Returns `Ok(None)` once the frame bound is exhausted, or at end of
    /// stream when unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if the stream ends inside a
    /// bounded frame, and any socket or timeout error.
    pub async fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0_u8; 1];
        match self.read(&mut byte).await? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Read up to `dst.len()` bytes without crossing the frame bound.
    ///
    /// Returns `Ok(0)` once the frame bound is exhausted, regardless of how
    /// many bytes of the next frame are already buffered.
    ///
    /// # Errors
    ///
    /// Fails as [`FrameReader::read_byte`] does.
    pub async fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let wanted = self.allowance(dst.len());
        if wanted == 0 {
            return Ok(0);
        }
        if self.buf.is_empty() && self.fill().await? == 0 {
            return match self.limit {
                Some(_) => Err(self.mid_frame_eof()),
                None => Ok(0),
            };
        }
        let n = wanted.min(self.buf.len());
        dst[..n].copy_from_slice(&self.buf[..n]);
        self.consume(n);
        Ok(n)
    }

    /// Fill `dst` completely.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if the frame bound or the
    /// stream ends first.
    pub async fn read_exact(&mut self, dst: &mut [u8]) -> io::Result<()> {
        if self.allowance(dst.len()) < dst.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of frame",
            ));
        }
        let mut filled = 0;
        while filled < dst.len() {
            match self.read(&mut dst[filled..]).await? {
                0 => return Err(io::ErrorKind::UnexpectedEof.into()),
                n => filled += n,
            }
        }
        Ok(())
    }

    async fn ensure_buffered(&mut self, n: usize) -> io::Result<()> {
        while self.buf.len() < n {
            if self.fill().await? == 0 {
                return Err(match self.limit {
                    Some(_) => self.mid_frame_eof(),
                    None => io::ErrorKind::UnexpectedEof.into(),
                });
            }
        }
        Ok(())
    }

    /// Look at the next `n` bytes without consuming them.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] if `n` exceeds the remaining
    /// frame bound, and [`io::ErrorKind::UnexpectedEof`] if the stream ends
    /// first.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.allowance(n) < n {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("peek of {n} bytes exceeds frame bound {:?}", self.limit),
            ));
        }
        self.ensure_buffered(n).await?;
        Ok(&self.buf[..n])
    }

    /// Skip exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] if `n` exceeds the remaining
    /// frame bound, and [`io::ErrorKind::UnexpectedEof`] if the stream ends
    /// first.
    pub async fn discard(&mut self, mut n: usize) -> io::Result<()> {
        if self.allowance(n) < n {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("discard of {n} bytes exceeds frame bound {:?}", self.limit),
            ));
        }
        while n > 0 {
            if self.buf.is_empty() && self.fill().await? == 0 {
                return Err(match self.limit {
                    Some(_) => self.mid_frame_eof(),
                    None => io::ErrorKind::UnexpectedEof.into(),
                });
            }
            let step = n.min(self.buf.len());
            self.consume(step);
            n -= step;
        }
        Ok(())
    }

    /// Skip whatever is left of the current frame, returning the bytes skipped.
    ///
    /// Does nothing when unbounded.
    ///
    /// # Errors
    ///
    /// Fails as [`FrameReader::discard`] does.
    pub async fn discard_remaining(&mut self) -> io::Result<usize> {
        let remaining = self.limit.unwrap_or_default();
        self.discard(remaining).await?;
        Ok(remaining)
    }

    /// Read the rest of the current frame into one buffer.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] when unbounded, and
    /// [`io::ErrorKind::UnexpectedEof`] if the stream ends inside the frame.
    pub async fn read_to_end(&mut self) -> io::Result<Bytes> {
        let Some(remaining) = self.limit else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "read_to_end requires a frame bound",
            ));
        };
        self.ensure_buffered(remaining).await?;
        let body = self.buf.split_to(remaining).freeze();
        self.limit = Some(0);
        Ok(body)
    }

    /// Read a header varint bounded by `max`.
    ///
    /// Bytes are consumed only once the varint is complete, so dropping the
    /// future while it waits for the socket loses nothing.
    async fn read_header(
        &mut self,
        max: u64,
        overflow: FramingError,
        header_bytes_before: usize,
    ) -> Result<u64, CodecError> {
        loop {
            match decode_uvarint(&self.buf, max) {
                Ok(Some((value, len))) => {
                    self.buf.advance(len);
                    return Ok(value);
                }
                Ok(None) => {}
                Err(_) => return Err(overflow.into()),
            }
            if self.fill().await? == 0 {
                let bytes_received = header_bytes_before + self.buf.len();
                return Err(if bytes_received == 0 {
                    EofError::CleanClose
                } else {
                    EofError::MidHeader { bytes_received }
                }
                .into());
            }
        }
    }

    /// Read the message type that opens a frame.
    ///
    /// The frame bound is ignored; callers [`unbound`](Self::unbound) first.
    ///
    /// # Errors
    ///
    /// Returns [`EofError::CleanClose`] if the stream ends before the first
    /// byte, [`EofError::MidHeader`] if it ends inside the varint,
    /// [`FramingError::TypeOverflow`] if the value exceeds [`MAX_TYPE`], and
    /// any socket or timeout error.
    pub async fn read_type(&mut self) -> Result<u32, CodecError> {
        let value = self
            .read_header(u64::from(MAX_TYPE), FramingError::TypeOverflow, 0)
            .await?;
        u32::try_from(value).map_err(|_| FramingError::TypeOverflow.into())
    }

    /// Read the body size following a type read with [`read_type`](Self::read_type).
    ///
    /// `type_len` is the encoded width of that type and only feeds EOF
    /// diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`EofError::MidHeader`] if the stream ends first,
    /// [`FramingError::SizeOverflow`] if the value exceeds [`MAX_SIZE`], and
    /// any socket or timeout error.
    pub async fn read_size(&mut self, type_len: usize) -> Result<usize, CodecError> {
        let value = self
            .read_header(MAX_SIZE as u64, FramingError::SizeOverflow, type_len.max(1))
            .await?;
        usize::try_from(value).map_err(|_| FramingError::SizeOverflow.into())
    }

    /// Read one newline-terminated line of at most `max` bytes.
    ///
    /// The terminator and a preceding carriage return are stripped and do
    /// not count towards `max`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::LineTooLong`] if no newline appears within
    /// `max` bytes, [`io::ErrorKind::UnexpectedEof`] if the stream ends
    /// mid-line, and any socket or timeout error.
    pub async fn read_line(&mut self, max: usize) -> Result<Bytes, CodecError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buf[scanned..].iter().position(|&b| b == b'\n') {
                let end = scanned + pos;
                let len = line_len(&self.buf[..end]);
                if len > max {
                    return Err(FramingError::LineTooLong { max }.into());
                }
                let mut line = self.buf.split_to(end + 1);
                line.truncate(len);
                return Ok(line.freeze());
            }
            scanned = self.buf.len();
            if line_len(&self.buf) > max {
                return Err(FramingError::LineTooLong { max }.into());
            }
            if self.fill().await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended inside a text line",
                )
                .into());
            }
        }
    }
}

/// Length of `line` without a trailing carriage return.
fn line_len(line: &[u8]) -> usize { line.len() - usize::from(line.last() == Some(&b'\r')) }

/// Bounded view of one frame body handed to message handlers.
///
/// Reads stop at the end of the frame. Bytes left unread are discarded by the
/// session before the next frame is read.
#[derive(Debug)]
pub struct Body<'a> {
    reader: &'a mut FrameReader,
    size: usize,
}

impl<'a> Body<'a> {
    pub(crate) fn new(reader: &'a mut FrameReader, size: usize) -> Self {
        reader.bound(size);
        Self { reader, size }
    }

    /// Declared body size in bytes.
    #[must_use]
    pub fn size(&self) -> usize { self.size }

    /// Body bytes not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize { self.reader.remaining().unwrap_or_default() }

    /// See [`FrameReader::read_byte`].
    ///
    /// # Errors
    ///
    /// Fails if the stream ends inside the frame or the socket errors.
    pub async fn read_byte(&mut self) -> io::Result<Option<u8>> { self.reader.read_byte().await }

    /// See [`FrameReader::read`].
    ///
    /// # Errors
    ///
    /// Fails if the stream ends inside the frame or the socket errors.
    pub async fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> { self.reader.read(dst).await }

    /// See [`FrameReader::read_exact`].
    ///
    /// # Errors
    ///
    /// Fails if fewer than `dst.len()` body bytes remain.
    pub async fn read_exact(&mut self, dst: &mut [u8]) -> io::Result<()> { self.reader.read_exact(dst).await }

    /// See [`FrameReader::peek`].
    ///
    /// # Errors
    ///
    /// Fails if `n` exceeds the remaining body.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> { self.reader.peek(n).await }

    /// See [`FrameReader::discard`].
    ///
    /// # Errors
    ///
    /// Fails if `n` exceeds the remaining body.
    pub async fn discard(&mut self, n: usize) -> io::Result<()> { self.reader.discard(n).await }

    /// Read every remaining body byte.
    ///
    /// # Errors
    ///
    /// Fails if the stream ends inside the frame.
    pub async fn read_to_end(&mut self) -> io::Result<Bytes> { self.reader.read_to_end().await }
}

#[cfg(test)]
mod tests;
