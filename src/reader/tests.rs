//! Tests for the bounded frame reader.

use std::{io, io::Cursor, time::Duration};

use bytes::BytesMut;
use rstest::rstest;

use super::*;
use crate::codec::{encode_frame_header, put_uvarint};

fn reader_over(bytes: impl Into<Vec<u8>>) -> FrameReader {
    FrameReader::new(Box::new(Cursor::new(bytes.into())), 16)
}

fn frame(message_type: u32, body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame_header(&mut buf, message_type, body.len());
    buf.extend_from_slice(body);
    buf.to_vec()
}

#[tokio::test]
async fn reads_header_then_bounded_body() {
    let mut reader = reader_over(frame(300, b"hello"));
    assert_eq!(reader.read_type().await.expect("type"), 300);
    assert_eq!(reader.read_size(2).await.expect("size"), 5);

    reader.bound(5);
    let mut out = [0_u8; 16];
    let n = reader.read(&mut out).await.expect("read body");
    assert_eq!(&out[..n], b"hello");
    assert_eq!(reader.read(&mut out).await.expect("end of frame"), 0);
    assert_eq!(reader.read_byte().await.expect("end of frame"), None);
}

#[tokio::test]
async fn bound_hides_next_frame() {
    let mut bytes = frame(1, b"abc");
    bytes.extend(frame(2, b"def"));
    let mut reader = reader_over(bytes);

    reader.read_type().await.expect("type");
    let size = reader.read_size(1).await.expect("size");
    reader.bound(size);
    let body = reader.read_to_end().await.expect("body");
    assert_eq!(&body[..], b"abc");
    assert!(reader.buffered() > 0, "next frame already buffered");
    assert_eq!(reader.read_byte().await.expect("bounded"), None);

    reader.unbound();
    assert_eq!(reader.read_type().await.expect("second type"), 2);
}

#[tokio::test]
async fn peek_does_not_advance() {
    let mut reader = reader_over(b"abcdef".to_vec());
    reader.bound(4);
    assert_eq!(reader.peek(3).await.expect("peek"), b"abc");
    assert_eq!(reader.remaining(), Some(4));
    assert_eq!(reader.read_byte().await.expect("byte"), Some(b'a'));
}

#[rstest]
#[case::peek(true)]
#[case::discard(false)]
#[tokio::test]
async fn lookahead_past_bound_is_rejected(#[case] peek: bool) {
    let mut reader = reader_over(b"abcdef".to_vec());
    reader.bound(2);
    let err = if peek {
        reader.peek(3).await.map(|_| ()).expect_err("peek past bound")
    } else {
        reader.discard(3).await.expect_err("discard past bound")
    };
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    assert_eq!(reader.remaining(), Some(2));
}

#[tokio::test]
async fn discard_remaining_realigns_stream() {
    let mut bytes = frame(5, &[9; 40]);
    bytes.extend(frame(6, b"z"));
    let mut reader = reader_over(bytes);

    reader.read_type().await.expect("type");
    let size = reader.read_size(1).await.expect("size");
    reader.bound(size);
    reader.read_byte().await.expect("one byte");
    assert_eq!(reader.discard_remaining().await.expect("discard"), 39);
    assert_eq!(reader.remaining(), Some(0));

    reader.unbound();
    assert_eq!(reader.read_type().await.expect("next type"), 6);
}

#[tokio::test]
async fn eof_at_boundary_is_clean_close() {
    let mut reader = reader_over(Vec::new());
    let err = reader.read_type().await.expect_err("eof");
    assert!(err.is_clean_close());
}

#[tokio::test]
async fn eof_inside_header_is_mid_header() {
    let mut reader = reader_over(vec![0x80]);
    let err = reader.read_type().await.expect_err("eof");
    assert!(matches!(
        err,
        CodecError::Eof(EofError::MidHeader { bytes_received: 1 })
    ));

    let mut reader = reader_over(vec![0x07]);
    reader.read_type().await.expect("type");
    let err = reader.read_size(1).await.expect_err("eof");
    assert!(matches!(
        err,
        CodecError::Eof(EofError::MidHeader { bytes_received: 1 })
    ));
}

#[tokio::test]
async fn eof_inside_body_is_unexpected() {
    let mut reader = reader_over(b"ab".to_vec());
    reader.bound(5);
    let err = reader.read_to_end().await.expect_err("short body");
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn short_body_reports_bytes_still_owed() {
    let mut reader = reader_over(b"abc".to_vec());
    reader.bound(10);
    let err = reader.read_to_end().await.expect_err("short body");
    let eof = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<EofError>())
        .expect("mid-frame eof");
    assert_eq!(
        *eof,
        EofError::MidFrame {
            remaining: 7,
            expected: 10,
        }
    );
}

#[tokio::test]
async fn oversized_header_values_overflow() {
    let mut buf = BytesMut::new();
    put_uvarint(&mut buf, u64::from(MAX_TYPE) + 1);
    let err = reader_over(buf.to_vec()).read_type().await.expect_err("type");
    assert!(matches!(err, CodecError::Framing(FramingError::TypeOverflow)));

    let mut buf = BytesMut::new();
    put_uvarint(&mut buf, 1);
    put_uvarint(&mut buf, MAX_SIZE as u64 + 1);
    let mut reader = reader_over(buf.to_vec());
    reader.read_type().await.expect("type");
    let err = reader.read_size(1).await.expect_err("size");
    assert!(matches!(err, CodecError::Framing(FramingError::SizeOverflow)));
}

#[rstest]
#[case(b"hello\n".as_slice(), b"hello".as_slice())]
#[case(b"hello\r\n".as_slice(), b"hello".as_slice())]
#[case(b"\n".as_slice(), b"".as_slice())]
#[tokio::test]
async fn read_line_strips_terminator(#[case] input: &[u8], #[case] expected: &[u8]) {
    let mut reader = reader_over(input.to_vec());
    let line = reader.read_line(64).await.expect("line");
    assert_eq!(&line[..], expected);
}

#[rstest]
#[case::bare(b"abcd\n".as_slice())]
#[case::crlf(b"abcd\r\n".as_slice())]
#[tokio::test]
async fn read_line_bound_excludes_terminator(#[case] input: &[u8]) {
    let mut reader = reader_over(input.to_vec());
    let line = reader.read_line(4).await.expect("line fits");
    assert_eq!(&line[..], b"abcd");

    let mut reader = reader_over(input.to_vec());
    let err = reader.read_line(3).await.expect_err("too long");
    assert!(matches!(
        err,
        CodecError::Framing(FramingError::LineTooLong { max: 3 })
    ));
}

#[tokio::test]
async fn read_line_enforces_bound() {
    let mut reader = reader_over(vec![b'x'; 100]);
    let err = reader.read_line(32).await.expect_err("too long");
    assert!(matches!(
        err,
        CodecError::Framing(FramingError::LineTooLong { max: 32 })
    ));
}

#[tokio::test(start_paused = true)]
async fn idle_read_times_out() {
    let (client, _server) = tokio::io::duplex(64);
    let mut reader =
        FrameReader::new(Box::new(client), 16).with_read_timeout(Some(Duration::from_secs(5)));
    let err = reader.read_type().await.expect_err("timeout");
    assert!(matches!(err, CodecError::Io(ref e) if e.kind() == io::ErrorKind::TimedOut));
}
