//! Caller-supplied strategy overrides.
//!
//! An override is keyed by the fully-qualified name of a field
//! (`package.Message.field`) or an enum (`package.Enum`). It either replaces
//! the default strategy outright ([`Override::Literal`]) or receives the
//! default strategy and returns a new one ([`Override::Transform`]).
//!
//! ```
//! use prost_reflect::Value;
//! use protoprop_core::{Override, Overrides};
//! use proptest::prelude::*;
//!
//! let overrides = Overrides::new()
//!     .field("im.InstantMessage.message", Override::just(Value::String("hi".into())))
//!     .field(
//!         "im.InstantMessage.timestamp",
//!         Override::map_values(|v| Value::I64(v.as_i64().unwrap_or_default().abs())),
//!     )
//!     .enumeration("im.Client", Override::literal(Just(1)));
//!
//! assert_eq!(overrides.len(), 3);
//! ```

use super::{FieldStrategy, FieldValue};
use crate::error::Result;
use prost_reflect::{MessageDescriptor, Value};
use proptest::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Replacement for the default strategy of a field or enum
pub enum Override<T> {
    /// Use this strategy instead of the default
    Literal(BoxedStrategy<T>),
    /// Derive a strategy from the default one
    Transform(Box<dyn Fn(BoxedStrategy<T>) -> BoxedStrategy<T>>),
}

impl<T: fmt::Debug + 'static> Override<T> {
    /// Creates a substituting override
    pub fn literal<S>(strategy: S) -> Self
    where
        S: Strategy<Value = T> + 'static,
    {
        Self::Literal(strategy.boxed())
    }

    /// Creates a transforming override
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(BoxedStrategy<T>) -> BoxedStrategy<T> + 'static,
    {
        Self::Transform(Box::new(f))
    }

    /// Runs `resolve` unless this override makes it unnecessary
    fn apply(&self, resolve: impl FnOnce() -> Result<BoxedStrategy<T>>) -> Result<BoxedStrategy<T>> {
        match self {
            Self::Literal(strategy) => Ok(strategy.clone()),
            Self::Transform(f) => resolve().map(|strategy| f(strategy)),
        }
    }
}

impl Override<FieldValue> {
    /// Substitutes a strategy whose values are always set on the field
    pub fn values<S>(strategy: S) -> Self
    where
        S: Strategy<Value = Value> + 'static,
    {
        Self::Literal(strategy.prop_map(FieldValue::Set).boxed())
    }

    /// Pins the field to a single value
    pub fn just(value: Value) -> Self {
        Self::values(Just(value))
    }

    /// Maps every generated value through `f`, leaving unset fields unset
    pub fn map_values<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + 'static,
    {
        let f = Rc::new(f);
        Self::transform(move |strategy| {
            let f = Rc::clone(&f);
            strategy
                .prop_map(move |value| match value {
                    FieldValue::Set(value) => FieldValue::Set(f(value)),
                    FieldValue::Unset => FieldValue::Unset,
                })
                .boxed()
        })
    }
}

impl<T> fmt::Debug for Override<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("Override::Literal(..)"),
            Self::Transform(_) => f.write_str("Override::Transform(..)"),
        }
    }
}

/// Overrides for one conversion, keyed by fully-qualified name
#[derive(Debug, Default)]
pub struct Overrides {
    fields: HashMap<String, Override<FieldValue>>,
    enums: HashMap<String, Override<i32>>,
}

impl Overrides {
    /// Creates an empty override set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field override
    pub fn field(mut self, full_name: impl Into<String>, value: Override<FieldValue>) -> Self {
        self.insert_field(full_name, value);
        self
    }

    /// Adds an enum override
    pub fn enumeration(mut self, full_name: impl Into<String>, value: Override<i32>) -> Self {
        self.insert_enum(full_name, value);
        self
    }

    /// Adds a field override in place, replacing any previous one
    pub fn insert_field(&mut self, full_name: impl Into<String>, value: Override<FieldValue>) {
        self.fields.insert(full_name.into(), value);
    }

    /// Adds an enum override in place, replacing any previous one
    pub fn insert_enum(&mut self, full_name: impl Into<String>, value: Override<i32>) {
        self.enums.insert(full_name.into(), value);
    }

    /// Returns true if a field override exists for this name
    pub fn has_field(&self, full_name: &str) -> bool {
        self.fields.contains_key(full_name)
    }

    /// Total number of overrides
    pub fn len(&self) -> usize {
        self.fields.len() + self.enums.len()
    }

    /// Returns true if no overrides were supplied
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.enums.is_empty()
    }

    pub(crate) fn resolve_field(
        &self,
        full_name: &str,
        resolve: impl FnOnce() -> Result<FieldStrategy>,
    ) -> Result<FieldStrategy> {
        overridable(&self.fields, full_name, resolve)
    }

    pub(crate) fn resolve_enum(
        &self,
        full_name: &str,
        resolve: impl FnOnce() -> Result<BoxedStrategy<i32>>,
    ) -> Result<BoxedStrategy<i32>> {
        overridable(&self.enums, full_name, resolve)
    }
}

fn overridable<T: fmt::Debug + 'static>(
    overrides: &HashMap<String, Override<T>>,
    full_name: &str,
    resolve: impl FnOnce() -> Result<BoxedStrategy<T>>,
) -> Result<BoxedStrategy<T>> {
    if overrides.is_empty() {
        return resolve();
    }
    match overrides.get(full_name) {
        Some(value) => value.apply(resolve),
        None => resolve(),
    }
}

/// Returns the fully-qualified name of a message field, as used for override keys
pub fn full_field_name(message: &MessageDescriptor, field_name: &str) -> Option<String> {
    message
        .get_field_by_name(field_name)
        .map(|field| field.full_name().to_owned())
}
