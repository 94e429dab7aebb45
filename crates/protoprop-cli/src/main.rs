//! protoprop - Sample random Protocol Buffer messages from descriptor sets
//!
//! This tool compiles the schemas in serialized `FileDescriptorSet`s (as written
//! by `protoc --descriptor_set_out`) into proptest strategies and prints
//! generated messages.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, FileDescriptor};
use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};
use protoprop_core::{load_descriptor_sets, Converter, ConverterConfig, StrategyTable};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// File extensions recognised as descriptor sets when scanning a directory
const DESCRIPTOR_EXTENSIONS: &[&str] = &["pb", "desc", "binpb", "protoset"];

/// Sample random Protocol Buffer messages from compiled descriptor sets
#[derive(Parser, Debug)]
#[command(name = "protoprop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Fully-qualified name of the message to generate (e.g. pkg.MyMessage)
    #[arg(short, long)]
    message: Option<String>,

    /// Only convert these schema files, by their name in the descriptor set
    #[arg(long = "module", value_name = "NAME")]
    modules: Vec<String>,

    /// Number of messages to generate
    #[arg(short = 'n', long, default_value = "5")]
    count: usize,

    /// Seed text for reproducible output
    #[arg(long, env = "PROTOPROP_SEED")]
    seed: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Maximum number of elements in repeated and map fields
    #[arg(long, default_value = "8")]
    max_collection_len: usize,

    /// How deep recursive message types may nest
    #[arg(long, default_value = "4")]
    recursion_depth: usize,

    /// Skip message types that cannot be resolved instead of failing
    #[arg(long)]
    lenient: bool,

    /// Only list resolved types without generating messages
    #[arg(long)]
    list_only: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a serialized FileDescriptorSet
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of serialized FileDescriptorSets
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for generated messages
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Protobuf text format, one message per line
    Text,
    /// Hex-encoded binary wire format, one message per line
    Hex,
}

impl Cli {
    fn converter_config(&self) -> ConverterConfig {
        ConverterConfig::new()
            .max_collection_len(self.max_collection_len)
            .recursion_depth(self.recursion_depth)
            .strict(!self.lenient)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let paths = descriptor_paths(&cli.input)?;
    let pool = load_descriptor_sets(&paths).context("Failed to load descriptor sets")?;
    info!("Loaded {} schema file(s) from {} descriptor set(s)", pool.files().count(), paths.len());

    let modules = select_modules(&pool, &cli.modules)?;
    let table = Converter::new()
        .with_config(cli.converter_config())
        .convert(&modules)
        .context("Failed to convert schemas to strategies")?;

    match cli.message.as_deref() {
        Some(name) if !cli.list_only => generate(&cli, &table, name),
        _ => {
            for line in type_listing(&table) {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

/// Resolve the descriptor set files named by the input mode
fn descriptor_paths(input: &InputMode) -> Result<Vec<PathBuf>> {
    if let Some(ref file) = input.file {
        if !file.is_file() {
            bail!("Input file does not exist: {}", file.display());
        }
        return Ok(vec![file.clone()]);
    }

    let Some(ref directory) = input.directory else {
        bail!("Either --file or --directory must be specified");
    };
    if !directory.is_dir() {
        bail!("Directory does not exist: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut paths: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_descriptor_set(path))
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!(
            "No descriptor sets ({}) found in {}",
            DESCRIPTOR_EXTENSIONS.join(", "),
            directory.display()
        );
    }
    debug!("Found {} descriptor set(s)", paths.len());
    Ok(paths)
}

fn is_descriptor_set(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| DESCRIPTOR_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Pick the schema files to convert; all of them when none are named
fn select_modules(pool: &DescriptorPool, names: &[String]) -> Result<Vec<FileDescriptor>> {
    if names.is_empty() {
        return Ok(pool.files().collect());
    }
    names
        .iter()
        .map(|name| {
            pool.get_file_by_name(name)
                .with_context(|| format!("No schema file named '{}' in the descriptor sets", name))
        })
        .collect()
}

/// Sorted `message <name>` / `enum <name>` lines for every resolved type
fn type_listing(table: &StrategyTable) -> Vec<String> {
    let mut lines: Vec<String> = table
        .message_names()
        .map(|name| format!("message {}", name))
        .chain(table.enum_names().map(|name| format!("enum {}", name)))
        .collect();
    lines.sort();
    lines
}

/// Generate and print `cli.count` instances of one message type
fn generate(cli: &Cli, table: &StrategyTable, name: &str) -> Result<()> {
    let strategy = table.message_by_name(name).with_context(|| {
        format!("No strategy for message '{}' (use --list-only to see resolved types)", name)
    })?;

    let mut runner = test_runner(cli.seed.as_deref());
    for i in 0..cli.count {
        let message = strategy
            .new_tree(&mut runner)
            .map_err(|reason| anyhow!("Failed to generate {}: {}", name, reason))?
            .current();
        trace!("Generated {} {} of {}", name, i + 1, cli.count);
        println!("{}", render(&message, cli.format));
    }

    Ok(())
}

/// A runner seeded from the blake3 hash of `seed`, or randomly when absent
fn test_runner(seed: Option<&str>) -> TestRunner {
    match seed {
        Some(seed) => {
            let hash = blake3::hash(seed.as_bytes());
            let rng = TestRng::from_seed(RngAlgorithm::ChaCha, hash.as_bytes());
            TestRunner::new_with_rng(Config::default(), rng)
        }
        None => TestRunner::new(Config::default()),
    }
}

fn render(message: &DynamicMessage, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => message.to_string(),
        OutputFormat::Hex => message
            .encode_to_vec()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect(),
    }
}
