//! Loading one schema module into the strategy table.
//!
//! ## Algorithm Overview
//!
//! 1. Resolve every top-level enum and insert it into the table
//! 2. Resolve top-level messages in repeated passes, at most one pass per
//!    message. A message whose references are not in the table yet is retried
//!    in the next pass; entries inserted earlier in a pass are visible to the
//!    rest of that pass
//! 3. Whatever is still pending references itself, directly or through its
//!    peers. These types are unrolled level by level. Each level is its own
//!    fixed point: a reference resolves to an entry already built in the same
//!    level, then to the previous level, and level 0 cuts the remaining
//!    references off (optional fields unset, repeated fields empty)
//! 4. Types that still have no strategy only have infinite instances
//!
//! A type that uses an unsupported schema feature fails the conversion in
//! strict mode. Otherwise it is omitted along with the types that need it.

use super::resolve::{enum_strategy, Resolver, Scope, Target};
use super::table::StrategyTable;
use super::ConverterConfig;
use crate::error::{Error, Result};
use crate::strategy::Overrides;
use prost_reflect::{DynamicMessage, EnumDescriptor, FileDescriptor, MessageDescriptor};
use proptest::strategy::BoxedStrategy;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

type Level = HashMap<String, BoxedStrategy<DynamicMessage>>;

/// Populates `table` with strategies for the enums and messages of `module`
pub(crate) fn load_module(
    module: &FileDescriptor,
    table: &mut StrategyTable,
    overrides: &Overrides,
    config: &ConverterConfig,
) -> Result<()> {
    for enum_type in module.enums() {
        match enum_strategy(&enum_type, overrides) {
            Ok(strategy) => table.insert_enum(&enum_type, strategy),
            Err(e) => skip_unsupported(e, config)?,
        }
    }

    let messages: Vec<MessageDescriptor> = module.messages().collect();
    let mut pending = resolve_fixed_point(&messages, table, overrides, config)?;

    if !pending.is_empty() {
        debug!(
            "Unrolling {} recursive message type(s) in {} to depth {}",
            pending.len(),
            module.name(),
            config.recursion_depth
        );
        pending = unroll_cycles(pending, table, overrides, config)?;
    }

    if pending.is_empty() {
        return Ok(());
    }

    let types: Vec<String> = pending.iter().map(|m| m.full_name().to_owned()).collect();
    if config.strict {
        return Err(Error::Unresolvable { types });
    }
    warn!(
        "Omitting unresolvable message types from {}: {}",
        module.name(),
        types.join(", ")
    );
    Ok(())
}

/// Propagates `error` unless it only rules out one type in lenient mode
fn skip_unsupported(error: Error, config: &ConverterConfig) -> Result<()> {
    if config.strict || !error.is_unsupported() {
        return Err(error);
    }
    warn!("Omitting type: {}", error);
    Ok(())
}

/// Returns the messages that could not be resolved within the pass budget
fn resolve_fixed_point(
    messages: &[MessageDescriptor],
    table: &mut StrategyTable,
    overrides: &Overrides,
    config: &ConverterConfig,
) -> Result<Vec<MessageDescriptor>> {
    let mut loaded: HashSet<&str> = HashSet::new();
    let mut skipped: HashSet<&str> = HashSet::new();

    for pass in 0..messages.len() {
        for message in messages {
            if loaded.contains(message.full_name()) || skipped.contains(message.full_name()) {
                continue;
            }

            let resolved = Resolver::new(&*table, overrides, config).message(message);
            match resolved {
                Ok(strategy) => {
                    table.insert_message(message, strategy);
                    loaded.insert(message.full_name());
                }
                Err(e) if e.is_deferred() => {
                    trace!("Pass {}: deferring {} ({})", pass + 1, message.full_name(), e);
                }
                Err(e) => {
                    skip_unsupported(e, config)?;
                    skipped.insert(message.full_name());
                }
            }
        }

        if loaded.len() + skipped.len() == messages.len() {
            break;
        }
    }

    Ok(messages
        .iter()
        .filter(|message| {
            !loaded.contains(message.full_name()) && !skipped.contains(message.full_name())
        })
        .cloned()
        .collect())
}

/// Scope used while unrolling: pending types resolve to the current level,
/// then to the previous one
struct Unrolled<'a> {
    table: &'a StrategyTable,
    current: &'a Level,
    previous: &'a Level,
    pending: &'a HashSet<String>,
}

impl Scope for Unrolled<'_> {
    fn lookup_enum(&self, enum_type: &EnumDescriptor) -> Option<BoxedStrategy<i32>> {
        self.table.lookup_enum(enum_type)
    }

    fn lookup_message(&self, message: &MessageDescriptor) -> Result<Target> {
        if let Some(strategy) = self.table.message(message) {
            return Ok(Target::Ready(strategy));
        }
        let name = message.full_name();
        if let Some(strategy) = self.current.get(name).or_else(|| self.previous.get(name)) {
            return Ok(Target::Ready(strategy.clone()));
        }
        if self.pending.contains(name) {
            return Ok(Target::Truncated);
        }
        Err(Error::not_yet_resolvable(name))
    }
}

/// Resolves recursive types by bounded unrolling; returns those left over
fn unroll_cycles(
    pending: Vec<MessageDescriptor>,
    table: &mut StrategyTable,
    overrides: &Overrides,
    config: &ConverterConfig,
) -> Result<Vec<MessageDescriptor>> {
    let names: HashSet<String> = pending.iter().map(|m| m.full_name().to_owned()).collect();
    let mut previous = Level::new();

    for depth in 0..=config.recursion_depth {
        previous = unroll_level(depth, &pending, &names, &previous, table, overrides, config)?;
    }

    let mut unresolved = Vec::new();
    for message in pending {
        match previous.remove(message.full_name()) {
            Some(strategy) => table.insert_message(&message, strategy),
            None => unresolved.push(message),
        }
    }
    Ok(unresolved)
}

/// Builds one level of the unrolled types, retrying until no type makes progress
fn unroll_level(
    depth: usize,
    pending: &[MessageDescriptor],
    names: &HashSet<String>,
    previous: &Level,
    table: &StrategyTable,
    overrides: &Overrides,
    config: &ConverterConfig,
) -> Result<Level> {
    let mut level = Level::new();

    for _ in 0..pending.len() {
        let mut progressed = false;

        for message in pending {
            if level.contains_key(message.full_name()) {
                continue;
            }

            let scope = Unrolled {
                table,
                current: &level,
                previous,
                pending: names,
            };
            let resolved = Resolver::new(&scope, overrides, config).message(message);
            match resolved {
                Ok(strategy) => {
                    level.insert(message.full_name().to_owned(), strategy);
                    progressed = true;
                }
                Err(e) if e.is_deferred() || (e.is_unsupported() && !config.strict) => {
                    trace!("Depth {}: {} not constructible ({})", depth, message.full_name(), e);
                }
                Err(e) => return Err(e),
            }
        }

        if !progressed {
            break;
        }
    }

    Ok(level)
}
