//! Application message traits.
//!
//! [`Message`] is the object-safe surface the codec and registry work with.
//! Types deriving bincode's [`Encode`] and [`Decode`] opt in by implementing
//! [`TypedMessage`], which supplies their numeric type.

use std::{any::Any, fmt};

use bincode::{Decode, Encode, config, decode_from_slice, encode_into_std_write};

use crate::codec::BodyError;

/// A payload that knows its numeric type and can serialise its body.
///
/// Decoding works in place: the registry constructs a zero-valued message and
/// [`Message::decode_body`] fills it from the received bytes.
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// Numeric type written in the frame header.
    fn message_type(&self) -> u32;

    /// Append the serialised body to `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialised.
    fn encode_body(&self, dst: &mut Vec<u8>) -> Result<(), BodyError>;

    /// Replace the contents of `self` with the body decoded from `src`.
    ///
    /// # Errors
    ///
    /// Returns an error if `src` is not a valid body for this type.
    fn decode_body(&mut self, src: &[u8]) -> Result<(), BodyError>;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Owned upcast for downcasting to the concrete type.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl dyn Message {
    /// Borrow the message as its concrete type.
    #[must_use]
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> { self.as_any().downcast_ref() }

    /// Convert the message into its concrete type.
    #[must_use]
    pub fn downcast<T: Message>(self: Box<Self>) -> Option<Box<T>> { self.into_any().downcast().ok() }

    /// Returns `true` if the message is of concrete type `T`.
    #[must_use]
    pub fn is<T: Message>(&self) -> bool { self.as_any().is::<T>() }
}

/// Message types serialised with bincode's standard configuration.
///
/// ```
/// use sessionwire::message::{Message, TypedMessage};
///
/// #[derive(bincode::Encode, bincode::Decode, Debug, Default, PartialEq)]
/// struct Ping {
///     seq: u32,
/// }
///
/// impl TypedMessage for Ping {
///     const TYPE: u32 = 1;
/// }
///
/// let ping = Ping { seq: 3 };
/// let mut body = Vec::new();
/// ping.encode_body(&mut body).unwrap();
///
/// let mut decoded = Ping::default();
/// decoded.decode_body(&body).unwrap();
/// assert_eq!(decoded, ping);
/// ```
pub trait TypedMessage: Encode + Decode<()> + Default + fmt::Debug + Send + Sync + 'static {
    /// Numeric type written in the frame header.
    const TYPE: u32;
}

impl<T: TypedMessage> Message for T {
    fn message_type(&self) -> u32 { T::TYPE }

    fn encode_body(&self, dst: &mut Vec<u8>) -> Result<(), BodyError> {
        encode_into_std_write(self, dst, config::standard())?;
        Ok(())
    }

    fn decode_body(&mut self, src: &[u8]) -> Result<(), BodyError> {
        let (value, _) = decode_from_slice::<T, _>(src, config::standard())?;
        *self = value;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }

    fn into_any(self: Box<Self>) -> Box<dyn Any> { self }
}
