//! Mapping from numeric message type to constructor.
//!
//! A [`MessageRegistry`] is populated once at start-up and then shared
//! read-only (typically behind an `Arc`) by every codec call that needs to
//! build messages from their numeric type. Types are grouped by a logical
//! module name for enumeration.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::{
    codec::{MAX_TYPE, TEXT_MESSAGE_TYPE},
    message::{Message, TypedMessage},
};

/// Constructor producing a fresh, zero-valued message.
pub type Constructor = Box<dyn Fn() -> Box<dyn Message> + Send + Sync>;

/// Errors raised while registering a message type.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The type exceeds [`MAX_TYPE`].
    #[error("message type {0} exceeds maximum {MAX_TYPE}")]
    TypeOutOfRange(u32),
    /// The type is reserved for the legacy text escape hatch.
    #[error("message type {0} is reserved")]
    ReservedType(u32),
    /// A constructor is already registered for the type.
    #[error("message type {0} registered twice")]
    DuplicateType(u32),
}

/// Registry of message constructors keyed by numeric type.
#[derive(Default)]
pub struct MessageRegistry {
    constructors: HashMap<u32, Constructor>,
    modules: BTreeMap<String, Vec<u32>>,
}

impl MessageRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `constructor` for `message_type` under `module`.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if the type is out of range, reserved, or
    /// already registered. The registry is left unchanged on error.
    pub fn try_register<F>(
        &mut self,
        module: &str,
        message_type: u32,
        constructor: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Message> + Send + Sync + 'static,
    {
        if message_type > MAX_TYPE {
            return Err(RegistryError::TypeOutOfRange(message_type));
        }
        if message_type == TEXT_MESSAGE_TYPE {
            return Err(RegistryError::ReservedType(message_type));
        }
        if self.constructors.contains_key(&message_type) {
            return Err(RegistryError::DuplicateType(message_type));
        }
        self.constructors
            .insert(message_type, Box::new(constructor));
        self.modules
            .entry(module.to_owned())
            .or_default()
            .push(message_type);
        Ok(())
    }

    /// Register `constructor` for `message_type` under `module`.
    ///
    /// Registration happens during start-up; a bad registration is a
    /// programming error.
    ///
    /// # Panics
    ///
    /// Panics if the type is out of range, reserved, or already registered.
    pub fn register<F>(&mut self, module: &str, message_type: u32, constructor: F)
    where
        F: Fn() -> Box<dyn Message> + Send + Sync + 'static,
    {
        if let Err(err) = self.try_register(module, message_type, constructor) {
            panic!("registry: {err}");
        }
    }

    /// Register a [`TypedMessage`] under `module` using its `Default` value as
    /// the constructor.
    ///
    /// ```
    /// use sessionwire::{message::TypedMessage, registry::MessageRegistry};
    ///
    /// #[derive(bincode::Encode, bincode::Decode, Debug, Default)]
    /// struct Login {
    ///     user: String,
    /// }
    ///
    /// impl TypedMessage for Login {
    ///     const TYPE: u32 = 10;
    /// }
    ///
    /// let mut registry = MessageRegistry::new();
    /// registry.register_type::<Login>("auth");
    /// assert_eq!(registry.lookup("auth"), &[10]);
    /// assert!(registry.new_message(10).is_some());
    /// ```
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`MessageRegistry::register`].
    pub fn register_type<T: TypedMessage>(&mut self, module: &str) {
        self.register(module, T::TYPE, || Box::new(T::default()));
    }

    /// Construct a fresh message for `message_type`, or `None` if unregistered.
    #[must_use]
    pub fn new_message(&self, message_type: u32) -> Option<Box<dyn Message>> {
        self.constructors
            .get(&message_type)
            .map(|constructor| constructor())
    }

    /// Returns `true` if a constructor is registered for `message_type`.
    #[must_use]
    pub fn contains(&self, message_type: u32) -> bool { self.constructors.contains_key(&message_type) }

    /// Return every type registered under `module`, in registration order.
    #[must_use]
    pub fn lookup(&self, module: &str) -> &[u32] {
        self.modules.get(module).map_or(&[], Vec::as_slice)
    }

    /// Iterate over module names in lexical order.
    pub fn modules(&self) -> impl Iterator<Item = &str> { self.modules.keys().map(String::as_str) }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize { self.constructors.len() }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.constructors.is_empty() }
}

impl std::fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRegistry")
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[derive(bincode::Encode, bincode::Decode, Debug, Default, PartialEq)]
    struct Ping(u32);

    impl TypedMessage for Ping {
        const TYPE: u32 = 1;
    }

    #[derive(bincode::Encode, bincode::Decode, Debug, Default, PartialEq)]
    struct Pong(u32);

    impl TypedMessage for Pong {
        const TYPE: u32 = 2;
    }

    #[fixture]
    fn registry() -> MessageRegistry {
        let mut registry = MessageRegistry::new();
        registry.register_type::<Ping>("heartbeat");
        registry.register_type::<Pong>("heartbeat");
        registry
    }

    #[rstest]
    fn new_message_builds_zero_value(registry: MessageRegistry) {
        let message = registry.new_message(Ping::TYPE).expect("ping registered");
        assert_eq!(message.downcast_ref::<Ping>(), Some(&Ping(0)));
    }

    #[rstest]
    fn new_message_returns_none_for_unknown_type(registry: MessageRegistry) {
        assert!(registry.new_message(99).is_none());
        assert!(!registry.contains(99));
    }

    #[rstest]
    fn lookup_groups_types_by_module(mut registry: MessageRegistry) {
        registry.register("admin", 7, || Box::new(Ping(7)));
        assert_eq!(registry.lookup("heartbeat"), &[1, 2]);
        assert_eq!(registry.lookup("admin"), &[7]);
        assert!(registry.lookup("missing").is_empty());
        assert_eq!(registry.modules().collect::<Vec<_>>(), ["admin", "heartbeat"]);
        assert_eq!(registry.len(), 3);
    }

    #[rstest]
    fn try_register_rejects_duplicates(mut registry: MessageRegistry) {
        let err = registry
            .try_register("other", Ping::TYPE, || Box::new(Pong(0)))
            .expect_err("duplicate must fail");
        assert_eq!(err, RegistryError::DuplicateType(Ping::TYPE));
        assert!(registry.lookup("other").is_empty());
    }

    #[rstest]
    #[case::above_max(MAX_TYPE + 1, RegistryError::TypeOutOfRange(MAX_TYPE + 1))]
    #[case::reserved(TEXT_MESSAGE_TYPE, RegistryError::ReservedType(TEXT_MESSAGE_TYPE))]
    fn try_register_rejects_invalid_types(#[case] message_type: u32, #[case] expected: RegistryError) {
        let mut registry = MessageRegistry::new();
        let err = registry
            .try_register("bad", message_type, || Box::new(Ping(0)))
            .expect_err("invalid type must fail");
        assert_eq!(err, expected);
        assert!(registry.is_empty());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn register_panics_on_duplicate() {
        let mut registry = MessageRegistry::new();
        registry.register_type::<Ping>("a");
        registry.register_type::<Ping>("b");
    }

    #[test]
    #[should_panic(expected = "exceeds maximum")]
    fn register_panics_on_out_of_range_type() {
        let mut registry = MessageRegistry::new();
        registry.register("a", u32::MAX, || Box::new(Ping(0)));
    }
}
