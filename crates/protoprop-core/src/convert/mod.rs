//! Schema to strategy conversion.
//!
//! This module compiles protobuf schema modules (`FileDescriptor`s) into a
//! [`StrategyTable`] of proptest strategies.
//!
//! ## Architecture
//!
//! Conversion is driven by [`Converter`], which:
//!
//! 1. Orders modules so each one is loaded after the modules it imports
//! 2. Loads each module's enums, then its messages, into one shared table
//! 3. Lets later modules reference every type loaded before them
//!
//! ## Example
//!
//! ```no_run
//! use prost_reflect::Value;
//! use protoprop_core::{load_descriptor_set, Converter, Override};
//! use proptest::strategy::{Strategy, ValueTree};
//! use proptest::test_runner::TestRunner;
//!
//! let pool = load_descriptor_set("im.binpb")?;
//! let table = Converter::new()
//!     .override_field("im.InstantMessage.message", Override::just(Value::String("hi".into())))
//!     .convert_pool(&pool)?;
//!
//! let strategy = table.message_by_name("im.InstantMessage").expect("resolved");
//! let mut runner = TestRunner::default();
//! let message = strategy.new_tree(&mut runner).unwrap().current();
//! println!("{}", message);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod module;
mod resolve;
mod table;

use crate::error::{Error, Result};
use crate::strategy::{FieldValue, Override, Overrides};
use prost_reflect::{DescriptorPool, FileDescriptor};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, trace};

use module::load_module;

pub use table::{SchemaType, StrategyTable};

/// Configuration for conversion
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Maximum number of elements in generated repeated and map fields
    pub max_collection_len: usize,
    /// How many times a recursive message type may nest inside itself
    pub recursion_depth: usize,
    /// Fail on message types that cannot be resolved instead of omitting them
    pub strict: bool,
    /// Also load the transitive imports of the given modules
    pub include_dependencies: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_collection_len: 8,
            recursion_depth: 4,
            strict: true,
            include_dependencies: true,
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum collection length
    pub fn max_collection_len(mut self, len: usize) -> Self {
        self.max_collection_len = len;
        self
    }

    /// Sets the recursion depth for self-referencing types
    pub fn recursion_depth(mut self, depth: usize) -> Self {
        self.recursion_depth = depth;
        self
    }

    /// Sets whether unresolvable types are an error
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets whether imports are loaded automatically
    pub fn include_dependencies(mut self, include: bool) -> Self {
        self.include_dependencies = include;
        self
    }
}

/// Compiles schema modules into strategies
#[derive(Debug, Default)]
pub struct Converter {
    config: ConverterConfig,
    overrides: Overrides,
}

impl Converter {
    /// Creates a converter with default configuration and no overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new converter with custom config
    pub fn with_config(mut self, config: ConverterConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the override set
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Overrides the strategy of one field, by fully-qualified name
    pub fn override_field(mut self, full_name: impl Into<String>, value: Override<FieldValue>) -> Self {
        self.overrides.insert_field(full_name, value);
        self
    }

    /// Overrides the strategy of one enum, by fully-qualified name
    pub fn override_enum(mut self, full_name: impl Into<String>, value: Override<i32>) -> Self {
        self.overrides.insert_enum(full_name, value);
        self
    }

    /// Returns the configuration
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Converts the given modules
    pub fn convert(&self, modules: &[FileDescriptor]) -> Result<StrategyTable> {
        convert_with(modules, &self.overrides, &self.config)
    }

    /// Converts every file in a descriptor pool
    pub fn convert_pool(&self, pool: &DescriptorPool) -> Result<StrategyTable> {
        let modules: Vec<FileDescriptor> = pool.files().collect();
        self.convert(&modules)
    }
}

/// Converts modules into a strategy table using the default configuration
pub fn convert(modules: &[FileDescriptor], overrides: &Overrides) -> Result<StrategyTable> {
    convert_with(modules, overrides, &ConverterConfig::default())
}

fn convert_with(
    modules: &[FileDescriptor],
    overrides: &Overrides,
    config: &ConverterConfig,
) -> Result<StrategyTable> {
    let mut pending = collect_modules(modules, config.include_dependencies);
    // Leaf modules first; the sort is stable so input order breaks ties.
    pending.sort_by_key(|module| module.dependencies().len());

    let scheduled: HashSet<&str> = pending.iter().map(FileDescriptor::name).collect();
    let mut loaded_modules: HashSet<&str> = HashSet::new();
    let mut loaded_packages: HashSet<&str> = HashSet::new();
    let mut table = StrategyTable::new();

    debug!("Converting {} module(s)", pending.len());

    for pass in 0..pending.len() {
        let mut progressed = false;

        for module in &pending {
            if loaded_modules.contains(module.name()) {
                continue;
            }

            let ready = module.dependencies().all(|dependency| {
                loaded_modules.contains(dependency.name())
                    || (!scheduled.contains(dependency.name())
                        && loaded_packages.contains(dependency.package_name()))
            });
            if !ready {
                trace!("Pass {}: {} waits for its imports", pass + 1, module.name());
                continue;
            }

            debug!("Loading {} (package '{}')", module.name(), module.package_name());
            load_module(module, &mut table, overrides, config)?;
            loaded_modules.insert(module.name());
            loaded_packages.insert(module.package_name());
            progressed = true;
        }

        if !progressed {
            break;
        }
    }

    if loaded_modules.len() < pending.len() {
        let mut stuck: Vec<String> = pending
            .iter()
            .filter(|module| !loaded_modules.contains(module.name()))
            .map(|module| module.name().to_owned())
            .collect();
        stuck.sort();
        return Err(Error::DependencyCycle { modules: stuck });
    }

    debug!("Conversion complete: {} strategies", table.len());
    Ok(table)
}

/// Deduplicates modules by file name, optionally adding transitive imports
fn collect_modules(modules: &[FileDescriptor], include_dependencies: bool) -> Vec<FileDescriptor> {
    let mut seen = HashSet::new();
    let mut collected = Vec::new();
    let mut stack: Vec<FileDescriptor> = modules.iter().rev().cloned().collect();

    while let Some(module) = stack.pop() {
        if !seen.insert(module.name().to_owned()) {
            continue;
        }
        if include_dependencies {
            stack.extend(module.dependencies());
        }
        collected.push(module);
    }

    collected
}

/// Reads a serialized `FileDescriptorSet` (as written by `protoc --descriptor_set_out`)
pub fn load_descriptor_set(path: impl AsRef<Path>) -> Result<DescriptorPool> {
    load_descriptor_sets([path])
}

/// Reads several serialized `FileDescriptorSet`s into one pool
pub fn load_descriptor_sets<I, P>(paths: I) -> Result<DescriptorPool>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut pool = DescriptorPool::new();
    for path in paths {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        debug!("Decoding descriptor set {} ({} bytes)", path.display(), data.len());
        pool.decode_file_descriptor_set(data.as_slice())?;
    }
    Ok(pool)
}
