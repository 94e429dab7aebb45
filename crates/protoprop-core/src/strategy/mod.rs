//! Strategy building blocks.
//!
//! Field strategies produce [`FieldValue`]s rather than bare values so that an
//! unpopulated optional field is never confused with a generated value. The
//! message resolver drops [`FieldValue::Unset`] entries before construction.
//!
//! ## Label transforms
//!
//! | Cardinality | Strategy                                   |
//! |-------------|--------------------------------------------|
//! | required    | `Set(base)`                                |
//! | optional    | `Unset` or `Set(base)`                     |
//! | repeated    | `Set(List(base, 0..=max_collection_len))`  |

mod overrides;
mod scalar;

use prost_reflect::{Cardinality, Value};
use proptest::collection::vec;
use proptest::prelude::*;

pub use overrides::{full_field_name, Override, Overrides};
pub use scalar::{scalar_strategy, RANGE32, RANGE64, URANGE32, URANGE64};

/// Strategy producing the value of one message field
pub type FieldStrategy = BoxedStrategy<FieldValue>;

/// A drawn field value, or the marker for a field left unpopulated
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// The field is not set on the constructed message
    Unset,
    /// The field is set to this value
    Set(Value),
}

impl FieldValue {
    /// Returns true if the field carries a value
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Returns the value, if any
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Set(value) => Some(value),
            Self::Unset => None,
        }
    }

    /// Consumes the field value, returning the value if set
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Set(value) => Some(value),
            Self::Unset => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Set(value)
    }
}

/// Returns a strategy that either leaves a field unset or draws from `strategy`.
///
/// Useful as an [`Override::Literal`] for fields whose replacement should stay optional.
pub fn optional<S>(strategy: S) -> FieldStrategy
where
    S: Strategy<Value = Value> + 'static,
{
    prop_oneof![Just(FieldValue::Unset), strategy.prop_map(FieldValue::Set)].boxed()
}

/// Applies the cardinality transform to a base value strategy
pub(crate) fn apply_label(
    base: BoxedStrategy<Value>,
    cardinality: Cardinality,
    max_collection_len: usize,
) -> FieldStrategy {
    match cardinality {
        Cardinality::Required => base.prop_map(FieldValue::Set).boxed(),
        Cardinality::Optional => optional(base),
        Cardinality::Repeated => vec(base, 0..=max_collection_len)
            .prop_map(|values| FieldValue::Set(Value::List(values)))
            .boxed(),
    }
}
