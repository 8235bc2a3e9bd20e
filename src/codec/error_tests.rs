//! Unit tests for codec error classification.

use std::io;

use super::{CodecError, EofError, FramingError};

#[test]
fn framing_errors_are_not_eof() {
    let err = CodecError::Framing(FramingError::TypeOverflow);
    assert!(!err.is_eof());
    assert!(!err.is_clean_close());
    assert_eq!(err.error_type(), "framing");
}

#[test]
fn clean_eof_is_detectable() {
    let err = CodecError::Eof(EofError::CleanClose);
    assert!(err.is_eof());
    assert!(err.is_clean_close());
}

#[test]
fn mid_frame_eof_is_not_clean() {
    let err = CodecError::Eof(EofError::MidFrame {
        remaining: 3,
        expected: 10,
    });
    assert!(err.is_eof());
    assert!(!err.is_clean_close());
    assert_eq!(
        err.to_string(),
        "EOF: premature EOF: 3 of 10 body bytes missing"
    );
}

#[test]
fn unrecognized_type_reports_registry_category() {
    let err = CodecError::UnrecognizedType(99);
    assert_eq!(err.error_type(), "registry");
    assert_eq!(err.to_string(), "unrecognized message type: 99");
}

#[test]
fn eof_converts_to_unexpected_eof_io_error() {
    let err: io::Error = CodecError::Eof(EofError::MidHeader { bytes_received: 1 }).into();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn framing_converts_to_invalid_data_io_error() {
    let err: io::Error = CodecError::Framing(FramingError::SizeOverflow).into();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[test]
fn io_error_round_trips_unchanged() {
    let err: io::Error = CodecError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).into();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
}
