//! The table of resolved strategies.

use prost_reflect::{DynamicMessage, EnumDescriptor, MessageDescriptor, ReflectMessage, Value};
use proptest::prelude::*;
use std::collections::HashMap;

/// A schema type that can own a strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaType {
    /// A message type
    Message(MessageDescriptor),
    /// An enum type
    Enum(EnumDescriptor),
}

impl SchemaType {
    /// Fully-qualified name of the type
    pub fn full_name(&self) -> &str {
        match self {
            Self::Message(message) => message.full_name(),
            Self::Enum(enum_type) => enum_type.full_name(),
        }
    }
}

impl From<MessageDescriptor> for SchemaType {
    fn from(message: MessageDescriptor) -> Self {
        Self::Message(message)
    }
}

impl From<EnumDescriptor> for SchemaType {
    fn from(enum_type: EnumDescriptor) -> Self {
        Self::Enum(enum_type)
    }
}

/// Strategies for every resolved message and enum type, keyed by full name.
///
/// Entries are only ever added, and never replaced, while a conversion runs.
/// A type is present exactly when it has been fully resolved.
#[derive(Debug, Clone, Default)]
pub struct StrategyTable {
    messages: HashMap<String, BoxedStrategy<DynamicMessage>>,
    enums: HashMap<String, BoxedStrategy<i32>>,
}

impl StrategyTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the strategy for a message type
    pub fn message(&self, message: &MessageDescriptor) -> Option<BoxedStrategy<DynamicMessage>> {
        self.message_by_name(message.full_name())
    }

    /// Returns the strategy for a message type by fully-qualified name
    pub fn message_by_name(&self, full_name: &str) -> Option<BoxedStrategy<DynamicMessage>> {
        self.messages.get(full_name).cloned()
    }

    /// Returns the strategy for an enum type
    pub fn enumeration(&self, enum_type: &EnumDescriptor) -> Option<BoxedStrategy<i32>> {
        self.enum_by_name(enum_type.full_name())
    }

    /// Returns the strategy for an enum type by fully-qualified name
    pub fn enum_by_name(&self, full_name: &str) -> Option<BoxedStrategy<i32>> {
        self.enums.get(full_name).cloned()
    }

    /// Returns the strategy for any schema type as protobuf values
    pub fn get(&self, schema_type: &SchemaType) -> Option<BoxedStrategy<Value>> {
        match schema_type {
            SchemaType::Message(message) => self
                .message(message)
                .map(|strategy| strategy.prop_map(Value::Message).boxed()),
            SchemaType::Enum(enum_type) => self
                .enumeration(enum_type)
                .map(|strategy| strategy.prop_map(Value::EnumNumber).boxed()),
        }
    }

    /// Returns a strategy producing generated message type `M`.
    ///
    /// `M` must be a type generated with reflection support. Values that fail
    /// to transcode are rejected by the strategy.
    pub fn typed<M>(&self) -> Option<BoxedStrategy<M>>
    where
        M: ReflectMessage + Default + 'static,
    {
        let descriptor = M::default().descriptor();
        let strategy = self.message(&descriptor)?;
        Some(
            strategy
                .prop_filter_map(
                    format!("generated value must transcode to {}", descriptor.full_name()),
                    |message| message.transcode_to::<M>().ok(),
                )
                .boxed(),
        )
    }

    /// Returns true if the type has a strategy
    pub fn contains(&self, schema_type: &SchemaType) -> bool {
        match schema_type {
            SchemaType::Message(_) => self.messages.contains_key(schema_type.full_name()),
            SchemaType::Enum(_) => self.enums.contains_key(schema_type.full_name()),
        }
    }

    /// Names of all message types with a strategy
    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    /// Names of all enum types with a strategy
    pub fn enum_names(&self) -> impl Iterator<Item = &str> {
        self.enums.keys().map(String::as_str)
    }

    /// Number of resolved types
    pub fn len(&self) -> usize {
        self.messages.len() + self.enums.len()
    }

    /// Returns true if nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.enums.is_empty()
    }

    pub(crate) fn insert_message(
        &mut self,
        message: &MessageDescriptor,
        strategy: BoxedStrategy<DynamicMessage>,
    ) {
        self.messages
            .entry(message.full_name().to_owned())
            .or_insert(strategy);
    }

    pub(crate) fn insert_enum(&mut self, enum_type: &EnumDescriptor, strategy: BoxedStrategy<i32>) {
        self.enums
            .entry(enum_type.full_name().to_owned())
            .or_insert(strategy);
    }
}
