//! Builders for raw wire bytes.

use bytes::BytesMut;
use sessionwire::{
    codec::{self, TEXT_MESSAGE_TYPE},
    message::Message,
};

/// Encode one session frame `type‖size‖body`.
#[must_use]
pub fn frame(message_type: u32, body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    codec::encode_frame_header(&mut buf, message_type, body.len());
    buf.extend_from_slice(body);
    buf.to_vec()
}

/// Encode a legacy text line announced by [`TEXT_MESSAGE_TYPE`].
#[must_use]
pub fn text_frame(line: &str) -> Vec<u8> {
    let mut buf = BytesMut::new();
    codec::encode_type(&mut buf, TEXT_MESSAGE_TYPE);
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(b"\n");
    buf.to_vec()
}

/// Encode `message` as a session frame.
///
/// # Panics
///
/// Panics if the message cannot be encoded.
#[must_use]
pub fn message_frame(message: &dyn Message) -> Vec<u8> {
    let mut buf = BytesMut::new();
    codec::encode_frame(message, &mut buf).expect("encode test message");
    buf.to_vec()
}
