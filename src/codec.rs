//! Wire codec for frame headers and registered messages.
//!
//! A session frame on the wire is
//!
//! ```text
//! varint(type) varint(size) body[size]
//! ```
//!
//! while a standalone encoded message carries its own length prefix covering
//! the type and the body:
//!
//! ```text
//! varint(type_len + body_len) varint(type) body
//! ```
//!
//! Header integers are unsigned varints. Types are bounded by [`MAX_TYPE`] and
//! sizes by [`MAX_SIZE`]; anything larger is a framing error, never a
//! truncated value.
//!
//! # Error Handling
//!
//! Decoding failures are reported through [`CodecError`]. See the [`error`]
//! module for the taxonomy.

use bytes::{Buf, BufMut, BytesMut};

pub mod error;
mod varint;

pub use error::{BodyError, CodecError, EofError, FramingError};
pub(crate) use varint::{UvarintDecoder, decode_uvarint};
pub use varint::{MAX_VARINT_LEN, put_uvarint, uvarint_len};

use crate::{message::Message, registry::MessageRegistry};

/// Largest message type accepted on the wire.
pub const MAX_TYPE: u32 = 1 << 31;

/// Largest body size accepted on the wire.
pub const MAX_SIZE: usize = 1 << 30;

/// Reserved type announcing a newline-terminated text line instead of a sized
/// frame.
pub const TEXT_MESSAGE_TYPE: u32 = MAX_TYPE;

/// Append the varint encoding of `message_type`, returning the bytes written.
///
/// The caller guarantees `message_type <= MAX_TYPE`.
pub fn encode_type<B: BufMut + ?Sized>(dst: &mut B, message_type: u32) -> usize {
    put_uvarint(dst, u64::from(message_type))
}

/// Append the varint encoding of `size`, returning the bytes written.
///
/// The caller guarantees `size <= MAX_SIZE`.
pub fn encode_size<B: BufMut + ?Sized>(dst: &mut B, size: usize) -> usize {
    put_uvarint(dst, size as u64)
}

/// Append a session frame header for `message_type` and a body of `size` bytes.
pub fn encode_frame_header<B: BufMut + ?Sized>(dst: &mut B, message_type: u32, size: usize) -> usize {
    encode_type(dst, message_type) + encode_size(dst, size)
}

fn read_bounded<B: Buf + ?Sized>(src: &mut B, max: u64, overflow: FramingError) -> Result<u64, CodecError> {
    if !src.has_remaining() {
        return Err(FramingError::Incomplete { have: 0, need: 1 }.into());
    }
    let mut decoder = UvarintDecoder::new(max);
    while src.has_remaining() {
        if let Some(value) = decoder.push(src.get_u8()).map_err(|_| overflow)? {
            return Ok(value);
        }
    }
    Err(overflow.into())
}

/// Consume a message type from `src`.
///
/// # Errors
///
/// Returns [`FramingError::TypeOverflow`] if the value exceeds [`MAX_TYPE`] or
/// `src` ends mid-varint, and [`FramingError::Incomplete`] if `src` is empty.
pub fn read_type<B: Buf + ?Sized>(src: &mut B) -> Result<u32, CodecError> {
    let value = read_bounded(src, u64::from(MAX_TYPE), FramingError::TypeOverflow)?;
    u32::try_from(value).map_err(|_| FramingError::TypeOverflow.into())
}

/// Consume a body size from `src`.
///
/// # Errors
///
/// Returns [`FramingError::SizeOverflow`] if the value exceeds [`MAX_SIZE`] or
/// `src` ends mid-varint, and [`FramingError::Incomplete`] if `src` is empty.
pub fn read_size<B: Buf + ?Sized>(src: &mut B) -> Result<usize, CodecError> {
    let value = read_bounded(src, MAX_SIZE as u64, FramingError::SizeOverflow)?;
    usize::try_from(value).map_err(|_| FramingError::SizeOverflow.into())
}

fn peek_bounded(src: &[u8], max: u64, overflow: FramingError) -> Result<(u64, usize), CodecError> {
    if src.is_empty() {
        return Err(FramingError::Incomplete { have: 0, need: 1 }.into());
    }
    match decode_uvarint(src, max) {
        Ok(Some(decoded)) => Ok(decoded),
        Ok(None) | Err(_) => Err(overflow.into()),
    }
}

/// Decode a message type from the front of `src` without consuming it,
/// returning the type and its encoded width.
///
/// # Errors
///
/// Fails exactly as [`read_type`] does.
pub fn peek_type(src: &[u8]) -> Result<(u32, usize), CodecError> {
    let (value, len) = peek_bounded(src, u64::from(MAX_TYPE), FramingError::TypeOverflow)?;
    let value = u32::try_from(value).map_err(|_| CodecError::from(FramingError::TypeOverflow))?;
    Ok((value, len))
}

/// Decode a body size from the front of `src` without consuming it,
/// returning the size and its encoded width.
///
/// # Errors
///
/// Fails exactly as [`read_size`] does.
pub fn peek_size(src: &[u8]) -> Result<(usize, usize), CodecError> {
    let (value, len) = peek_bounded(src, MAX_SIZE as u64, FramingError::SizeOverflow)?;
    let value = usize::try_from(value).map_err(|_| CodecError::from(FramingError::SizeOverflow))?;
    Ok((value, len))
}

fn encode_body(message: &dyn Message) -> Result<Vec<u8>, CodecError> {
    if message.message_type() > MAX_TYPE {
        return Err(FramingError::TypeOverflow.into());
    }
    let mut body = Vec::new();
    message.encode_body(&mut body).map_err(CodecError::Encode)?;
    Ok(body)
}

/// Encode `message` as `size‖type‖body`, preceded by `reserved_header_len`
/// zeroed bytes the caller may fill in later.
///
/// `size` counts the encoded type plus the body.
///
/// # Errors
///
/// Returns [`FramingError::SizeOverflow`] if the sized part exceeds
/// [`MAX_SIZE`], [`FramingError::TypeOverflow`] if the message type exceeds
/// [`MAX_TYPE`], and [`CodecError::Encode`] if body serialisation fails.
///
/// # Examples
///
/// ```
/// use sessionwire::{codec, message::TypedMessage, registry::MessageRegistry};
///
/// #[derive(bincode::Encode, bincode::Decode, Debug, Default, PartialEq)]
/// struct Note {
///     a: i32,
///     b: String,
/// }
///
/// impl TypedMessage for Note {
///     const TYPE: u32 = 7;
/// }
///
/// let mut registry = MessageRegistry::new();
/// registry.register_type::<Note>("notes");
///
/// let note = Note { a: 14, b: "x".into() };
/// let bytes = codec::encode(&note, 0).unwrap();
/// let (consumed, decoded) = codec::decode(&bytes, &registry).unwrap();
/// assert_eq!(consumed, bytes.len());
/// assert_eq!(decoded.downcast_ref::<Note>(), Some(&note));
/// ```
pub fn encode(message: &dyn Message, reserved_header_len: usize) -> Result<BytesMut, CodecError> {
    let body = encode_body(message)?;
    let message_type = message.message_type();
    let size = uvarint_len(u64::from(message_type)) + body.len();
    if size > MAX_SIZE {
        return Err(FramingError::SizeOverflow.into());
    }
    let mut buf = BytesMut::with_capacity(reserved_header_len + uvarint_len(size as u64) + size);
    buf.put_bytes(0, reserved_header_len);
    encode_size(&mut buf, size);
    encode_type(&mut buf, message_type);
    buf.put_slice(&body);
    Ok(buf)
}

/// Decode one message produced by [`encode`] from the front of `src`.
///
/// Returns the number of bytes consumed and the decoded message.
///
/// # Errors
///
/// Returns [`FramingError::Incomplete`] if `src` holds less than one message,
/// the overflow errors of [`read_size`] and [`read_type`],
/// [`CodecError::UnrecognizedType`] if the type has no registered
/// constructor, and [`CodecError::Decode`] if the body is malformed.
pub fn decode(src: &[u8], registry: &MessageRegistry) -> Result<(usize, Box<dyn Message>), CodecError> {
    let (size, size_len) = peek_size(src)?;
    let need = size_len + size;
    let Some(sized) = src.get(size_len..need) else {
        return Err(FramingError::Incomplete {
            have: src.len(),
            need,
        }
        .into());
    };
    let (message_type, type_len) = peek_type(sized)?;
    let body = sized.get(type_len..).unwrap_or_default();
    let message = decode_body(message_type, body, registry)?;
    Ok((need, message))
}

/// Append a session frame `type‖size‖body` for `message` to `dst`, returning
/// the bytes written.
///
/// # Errors
///
/// Fails under the same conditions as [`encode`].
pub fn encode_frame(message: &dyn Message, dst: &mut BytesMut) -> Result<usize, CodecError> {
    let body = encode_body(message)?;
    if body.len() > MAX_SIZE {
        return Err(FramingError::SizeOverflow.into());
    }
    dst.reserve(MAX_VARINT_LEN * 2 + body.len());
    let header = encode_frame_header(dst, message.message_type(), body.len());
    dst.put_slice(&body);
    Ok(header + body.len())
}

/// Build the registered message for `message_type` from a received frame body.
///
/// # Errors
///
/// Returns [`CodecError::UnrecognizedType`] if the type is unregistered and
/// [`CodecError::Decode`] if the body is malformed.
pub fn decode_body(
    message_type: u32,
    body: &[u8],
    registry: &MessageRegistry,
) -> Result<Box<dyn Message>, CodecError> {
    let mut message = registry
        .new_message(message_type)
        .ok_or(CodecError::UnrecognizedType(message_type))?;
    message.decode_body(body).map_err(CodecError::Decode)?;
    Ok(message)
}
