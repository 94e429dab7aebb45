//! Field and message resolution.
//!
//! A [`Resolver`] turns descriptors into strategies by consulting a [`Scope`]
//! for the strategies of referenced enum and message types. A missing type is
//! reported as [`Error::NotYetResolvable`], which the module loader treats as
//! "try again later".

use super::table::StrategyTable;
use super::ConverterConfig;
use crate::error::{Error, Result};
use crate::strategy::{apply_label, scalar_strategy, FieldStrategy, FieldValue, Overrides};
use prost_reflect::{
    Cardinality, DynamicMessage, EnumDescriptor, FieldDescriptor, Kind, MapKey,
    MessageDescriptor, Value,
};
use proptest::collection::hash_map;
use proptest::prelude::*;
use proptest::sample::select;
use std::collections::HashMap;

/// Outcome of looking up a referenced message type
pub(crate) enum Target {
    /// The type has a strategy
    Ready(BoxedStrategy<DynamicMessage>),
    /// The type is part of a cycle that has been unrolled as deep as allowed
    Truncated,
}

/// Where a resolver finds strategies for referenced types
pub(crate) trait Scope {
    fn lookup_enum(&self, enum_type: &EnumDescriptor) -> Option<BoxedStrategy<i32>>;

    fn lookup_message(&self, message: &MessageDescriptor) -> Result<Target>;
}

impl Scope for StrategyTable {
    fn lookup_enum(&self, enum_type: &EnumDescriptor) -> Option<BoxedStrategy<i32>> {
        self.enumeration(enum_type)
    }

    fn lookup_message(&self, message: &MessageDescriptor) -> Result<Target> {
        self.message(message)
            .map(Target::Ready)
            .ok_or_else(|| Error::not_yet_resolvable(message.full_name()))
    }
}

/// Builds the strategy for an enum type, honouring overrides
pub(crate) fn enum_strategy(
    enum_type: &EnumDescriptor,
    overrides: &Overrides,
) -> Result<BoxedStrategy<i32>> {
    overrides.resolve_enum(enum_type.full_name(), || {
        let numbers: Vec<i32> = enum_type.values().map(|value| value.number()).collect();
        if numbers.is_empty() {
            return Err(Error::unsupported(enum_type.full_name(), "enum declares no values"));
        }
        Ok(select(numbers).boxed())
    })
}

pub(crate) struct Resolver<'a, S> {
    scope: &'a S,
    overrides: &'a Overrides,
    config: &'a ConverterConfig,
}

impl<'a, S: Scope> Resolver<'a, S> {
    pub(crate) fn new(scope: &'a S, overrides: &'a Overrides, config: &'a ConverterConfig) -> Self {
        Self {
            scope,
            overrides,
            config,
        }
    }

    /// Builds a strategy constructing instances of `message`
    pub(crate) fn message(&self, message: &MessageDescriptor) -> Result<BoxedStrategy<DynamicMessage>> {
        let fields: Vec<FieldDescriptor> = message.fields().collect();
        let strategies = fields
            .iter()
            .map(|field| self.field(field))
            .collect::<Result<Vec<_>>>()?;

        let descriptor = message.clone();
        let reason = format!("generated values must fit the fields of {}", message.full_name());
        Ok(strategies
            .prop_filter_map(reason, move |values| build_message(&descriptor, &fields, values))
            .boxed())
    }

    /// Builds the strategy for one field
    pub(crate) fn field(&self, field: &FieldDescriptor) -> Result<FieldStrategy> {
        self.field_with_cardinality(field, field.cardinality())
    }

    fn field_with_cardinality(
        &self,
        field: &FieldDescriptor,
        cardinality: Cardinality,
    ) -> Result<FieldStrategy> {
        self.overrides
            .resolve_field(field.full_name(), || self.default_field(field, cardinality))
    }

    fn default_field(&self, field: &FieldDescriptor, cardinality: Cardinality) -> Result<FieldStrategy> {
        if field.is_group() {
            return Err(Error::unsupported(field.full_name(), "groups are not supported"));
        }

        let kind = field.kind();
        if let Some(base) = scalar_strategy(&kind) {
            return Ok(self.label(base, cardinality));
        }

        match kind {
            Kind::Enum(enum_type) => {
                if enum_type.parent_message().is_some() {
                    return Err(nested_type(field, enum_type.full_name()));
                }
                let base = self
                    .scope
                    .lookup_enum(&enum_type)
                    .ok_or_else(|| Error::not_yet_resolvable(enum_type.full_name()))?;
                Ok(self.label(base.prop_map(Value::EnumNumber).boxed(), cardinality))
            }
            Kind::Message(message) => self.message_field(field, &message, cardinality),
            other => Err(Error::unsupported(
                field.full_name(),
                format!("unrecognized field type {:?}", other),
            )),
        }
    }

    fn message_field(
        &self,
        field: &FieldDescriptor,
        message: &MessageDescriptor,
        cardinality: Cardinality,
    ) -> Result<FieldStrategy> {
        if is_deprecated(message) {
            return Ok(Just(FieldValue::Unset).boxed());
        }

        if message.is_map_entry() {
            return self.map_field(message);
        }

        if message.parent_message().is_some() {
            return Err(nested_type(field, message.full_name()));
        }

        match self.scope.lookup_message(message)? {
            Target::Ready(strategy) => {
                Ok(self.label(strategy.prop_map(Value::Message).boxed(), cardinality))
            }
            Target::Truncated => truncated(message, cardinality),
        }
    }

    /// Map fields become `Value::Map`; keys and values are never unset
    fn map_field(&self, entry: &MessageDescriptor) -> Result<FieldStrategy> {
        let key_field = entry.map_entry_key_field();
        let value_field = entry.map_entry_value_field();

        if self.never_populated(&value_field) {
            return Ok(Just(FieldValue::Set(Value::Map(HashMap::new()))).boxed());
        }

        let keys = self
            .field_with_cardinality(&key_field, Cardinality::Required)?
            .prop_filter_map("map keys are never unset", |key| {
                key.into_value().and_then(into_map_key)
            });
        let values = self
            .field_with_cardinality(&value_field, Cardinality::Required)?
            .prop_filter_map("map values are never unset", FieldValue::into_value);

        Ok(hash_map(keys, values, 0..=self.config.max_collection_len)
            .prop_map(|entries| FieldValue::Set(Value::Map(entries)))
            .boxed())
    }

    /// True when a map value field can only ever be unset
    fn never_populated(&self, value_field: &FieldDescriptor) -> bool {
        if self.overrides.has_field(value_field.full_name()) {
            return false;
        }
        match value_field.kind() {
            Kind::Message(message) if is_deprecated(&message) => true,
            Kind::Message(message) => {
                matches!(self.scope.lookup_message(&message), Ok(Target::Truncated))
            }
            _ => false,
        }
    }

    fn label(&self, base: BoxedStrategy<Value>, cardinality: Cardinality) -> FieldStrategy {
        apply_label(base, cardinality, self.config.max_collection_len)
    }
}

/// The empty form of a reference cut off by the recursion limit
fn truncated(message: &MessageDescriptor, cardinality: Cardinality) -> Result<FieldStrategy> {
    match cardinality {
        Cardinality::Optional => Ok(Just(FieldValue::Unset).boxed()),
        Cardinality::Repeated => Ok(Just(FieldValue::Set(Value::List(Vec::new()))).boxed()),
        Cardinality::Required => Err(Error::not_yet_resolvable(message.full_name())),
    }
}

fn build_message(
    descriptor: &MessageDescriptor,
    fields: &[FieldDescriptor],
    values: Vec<FieldValue>,
) -> Option<DynamicMessage> {
    let mut message = DynamicMessage::new(descriptor.clone());
    for (field, value) in fields.iter().zip(values) {
        if let FieldValue::Set(value) = value {
            message.try_set_field(field, value).ok()?;
        }
    }
    Some(message)
}

fn is_deprecated(message: &MessageDescriptor) -> bool {
    message
        .descriptor_proto()
        .options
        .as_ref()
        .and_then(|options| options.deprecated)
        .unwrap_or(false)
}

fn into_map_key(value: Value) -> Option<MapKey> {
    match value {
        Value::Bool(v) => Some(MapKey::Bool(v)),
        Value::I32(v) => Some(MapKey::I32(v)),
        Value::I64(v) => Some(MapKey::I64(v)),
        Value::U32(v) => Some(MapKey::U32(v)),
        Value::U64(v) => Some(MapKey::U64(v)),
        Value::String(v) => Some(MapKey::String(v)),
        _ => None,
    }
}

fn nested_type(field: &FieldDescriptor, type_name: &str) -> Error {
    Error::unsupported(
        field.full_name(),
        format!("nested type '{}' is not supported; declare it at file level", type_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Override, RANGE32};
    use crate::testing::*;
    use prost_reflect::DescriptorPool;
    use prost_types::field_descriptor_proto::{Label, Type};
    use std::collections::HashSet;

    fn schema() -> DescriptorPool {
        let mut inventory = message(
            "Inventory",
            vec![
                map_field("stock", 1, ".shop.Inventory.StockEntry"),
                typed_field("legacy", 2, Label::Optional, Type::Message, ".shop.Legacy"),
                typed_field("status", 3, Label::Required, Type::Enum, ".shop.Status"),
            ],
        );
        inventory.nested_type.push(map_entry(
            "StockEntry",
            field("key", 1, Label::Optional, Type::String),
            field("value", 2, Label::Optional, Type::Uint32),
        ));

        pool(vec![file(
            "shop.proto",
            "shop",
            &[],
            vec![
                inventory,
                deprecated(message("Legacy", vec![field("x", 1, Label::Optional, Type::Int32)])),
            ],
            vec![enumeration("Status", &[("OPEN", 0), ("CLOSED", 5)])],
        )])
    }

    fn table_with_status(pool: &DescriptorPool, overrides: &Overrides) -> StrategyTable {
        let mut table = StrategyTable::new();
        let status = pool.get_enum_by_name("shop.Status").unwrap();
        table.insert_enum(&status, enum_strategy(&status, overrides).unwrap());
        table
    }

    #[test]
    fn test_enum_values_come_from_schema() {
        let pool = schema();
        let status = pool.get_enum_by_name("shop.Status").unwrap();
        let strategy = enum_strategy(&status, &Overrides::new()).unwrap();
        let seen: HashSet<i32> = sample(&strategy, 100).into_iter().collect();
        assert_eq!(seen, HashSet::from([0, 5]));
    }

    #[test]
    fn test_enum_override() {
        let pool = schema();
        let status = pool.get_enum_by_name("shop.Status").unwrap();
        let overrides = Overrides::new().enumeration("shop.Status", Override::literal(Just(5)));
        let strategy = enum_strategy(&status, &overrides).unwrap();
        assert_eq!(sample(&strategy, 10), vec![5; 10]);
    }

    #[test]
    fn test_missing_enum_defers() {
        let pool = schema();
        let inventory = pool.get_message_by_name("shop.Inventory").unwrap();
        let table = StrategyTable::new();
        let overrides = Overrides::new();
        let config = ConverterConfig::default();

        let err = Resolver::new(&table, &overrides, &config)
            .message(&inventory)
            .unwrap_err();
        assert!(err.is_deferred());
    }

    #[test]
    fn test_map_and_deprecated_fields() {
        let pool = schema();
        let inventory = pool.get_message_by_name("shop.Inventory").unwrap();
        let overrides = Overrides::new();
        let table = table_with_status(&pool, &overrides);
        let config = ConverterConfig::default().max_collection_len(5);

        let strategy = Resolver::new(&table, &overrides, &config)
            .message(&inventory)
            .unwrap();

        let mut saw_entries = false;
        for message in sample(&strategy, 100) {
            assert!(!message.has_field_by_name("legacy"));

            let stock = message.get_field_by_name("stock").unwrap();
            let stock = stock.as_map().expect("map field yields a map");
            assert!(stock.len() <= 5);
            for (key, value) in stock {
                assert!(matches!(key, MapKey::String(_)));
                assert!(value.as_u32().is_some());
            }
            saw_entries |= !stock.is_empty();

            let status = message.get_field_by_name("status").unwrap();
            assert!(matches!(status.as_enum_number(), Some(0) | Some(5)));
        }
        assert!(saw_entries);
    }

    #[test]
    fn test_map_key_override() {
        let pool = schema();
        let inventory = pool.get_message_by_name("shop.Inventory").unwrap();
        let overrides = Overrides::new().field(
            "shop.Inventory.StockEntry.key",
            Override::values(prop_oneof![Just("a"), Just("b")].prop_map(|s| Value::String(s.into()))),
        );
        let table = table_with_status(&pool, &overrides);
        let config = ConverterConfig::default();

        let strategy = Resolver::new(&table, &overrides, &config)
            .message(&inventory)
            .unwrap();
        for message in sample(&strategy, 50) {
            let stock = message.get_field_by_name("stock").unwrap();
            let keys: Vec<&MapKey> = stock.as_map().unwrap().keys().collect();
            assert!(keys.len() <= 2);
            for key in keys {
                assert!(matches!(key, MapKey::String(s) if s == "a" || s == "b"));
            }
        }
    }

    #[test]
    fn test_field_override_applies_after_label() {
        let pool = pool(vec![file(
            "point.proto",
            "geo",
            &[],
            vec![message(
                "Point",
                vec![
                    field("x", 1, Label::Optional, Type::Int32),
                    field("y", 2, Label::Optional, Type::Int32),
                ],
            )],
            vec![],
        )]);
        let point = pool.get_message_by_name("geo.Point").unwrap();
        let overrides = Overrides::new().field("geo.Point.x", Override::just(Value::I32(3)));
        let table = StrategyTable::new();
        let config = ConverterConfig::default();

        let strategy = Resolver::new(&table, &overrides, &config)
            .message(&point)
            .unwrap();
        for message in sample(&strategy, 50) {
            assert_eq!(message.get_field_by_name("x").unwrap().as_i32(), Some(3));
            if message.has_field_by_name("y") {
                let y = message.get_field_by_name("y").unwrap().as_i32().unwrap();
                assert!(RANGE32.contains(&y));
            }
        }
    }

    #[test]
    fn test_nested_message_is_unsupported() {
        let mut outer = message(
            "Outer",
            vec![typed_field("inner", 1, Label::Optional, Type::Message, ".nest.Outer.Inner")],
        );
        outer.nested_type.push(message("Inner", vec![]));
        let pool = pool(vec![file("nest.proto", "nest", &[], vec![outer], vec![])]);
        let outer = pool.get_message_by_name("nest.Outer").unwrap();

        let table = StrategyTable::new();
        let overrides = Overrides::new();
        let config = ConverterConfig::default();
        let err = Resolver::new(&table, &overrides, &config)
            .message(&outer)
            .unwrap_err();

        match err {
            Error::UnsupportedSchema { field, reason } => {
                assert_eq!(field, "nest.Outer.inner");
                assert!(reason.contains("nest.Outer.Inner"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_forms() {
        let pool = schema();
        let legacy = pool.get_message_by_name("shop.Legacy").unwrap();

        let optional = truncated(&legacy, Cardinality::Optional).unwrap();
        assert_eq!(sample(&optional, 3), vec![FieldValue::Unset; 3]);

        let repeated = truncated(&legacy, Cardinality::Repeated).unwrap();
        assert_eq!(sample(&repeated, 1), vec![FieldValue::Set(Value::List(vec![]))]);

        assert!(truncated(&legacy, Cardinality::Required).unwrap_err().is_deferred());
    }
}
