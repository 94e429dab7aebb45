//! Scalar field policy.
//!
//! Maps every primitive protobuf field kind to a strategy over
//! [`prost_reflect::Value`] covering that kind's wire-level domain:
//!
//! - `double`, `float`: any bit pattern class, NaN and infinities included
//! - `int32`, `sint32`, `sfixed32`: [`RANGE32`]
//! - `int64`, `sint64`, `sfixed64`: [`RANGE64`]
//! - `uint32`, `fixed32`: [`URANGE32`]
//! - `uint64`, `fixed64`: [`URANGE64`]
//! - `bool`, `string`, `bytes`: anything
//!
//! The signed ranges start at `MIN + 1`, not `MIN`.

use bytes::Bytes;
use prost_reflect::{Kind, Value};
use proptest::prelude::*;
use std::ops::RangeInclusive;

/// Range of generated 32-bit signed values: [-(2^31)+1, 2^31-1]
pub const RANGE32: RangeInclusive<i32> = (i32::MIN + 1)..=i32::MAX;

/// Range of generated 64-bit signed values: [-(2^63)+1, 2^63-1]
pub const RANGE64: RangeInclusive<i64> = (i64::MIN + 1)..=i64::MAX;

/// Range of generated 32-bit unsigned values: [0, 2^32-1]
pub const URANGE32: RangeInclusive<u32> = 0..=u32::MAX;

/// Range of generated 64-bit unsigned values: [0, 2^64-1]
pub const URANGE64: RangeInclusive<u64> = 0..=u64::MAX;

/// Returns the strategy for a scalar field kind.
///
/// Returns `None` for enum and message kinds, which are resolved against
/// the strategy table instead.
pub fn scalar_strategy(kind: &Kind) -> Option<BoxedStrategy<Value>> {
    let strategy = match kind {
        Kind::Double => proptest::num::f64::ANY.prop_map(Value::F64).boxed(),
        Kind::Float => proptest::num::f32::ANY.prop_map(Value::F32).boxed(),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => RANGE32.prop_map(Value::I32).boxed(),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => RANGE64.prop_map(Value::I64).boxed(),
        Kind::Uint32 | Kind::Fixed32 => URANGE32.prop_map(Value::U32).boxed(),
        Kind::Uint64 | Kind::Fixed64 => URANGE64.prop_map(Value::U64).boxed(),
        Kind::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        Kind::String => any::<String>().prop_map(Value::String).boxed(),
        Kind::Bytes => any::<Vec<u8>>()
            .prop_map(|data| Value::Bytes(Bytes::from(data)))
            .boxed(),
        Kind::Message(_) | Kind::Enum(_) => return None,
    };
    Some(strategy)
}
