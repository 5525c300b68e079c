use clap::{Parser, Subcommand, ValueEnum};
use forkmap::{
    AccessMode, ForkMap, ForkMapBuilder, ForkMapDecoder, JsonCodec, Result, Utf8Codec,
    ZlibCompression,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Error, ErrorKind};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Info(args) => run_info(args),
        Command::Convert(args) => run_convert(args),
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "forkmap utility for inspecting and creating forkmap files",
    subcommand_required = true,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect a forkmap file and print its layout
    Info(InfoArgs),
    /// Convert a JSON key-value file into a forkmap binary file
    Convert(ConvertArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum Codec {
    /// Values are plain UTF-8 text
    Utf8,
    /// Values are arbitrary JSON documents
    Json,
}

#[derive(clap::Args)]
struct InfoArgs {
    /// Path to the forkmap binary file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Optional keys to look up
    #[arg(short, long)]
    key: Vec<String>,

    /// Codec the file was built with
    #[arg(long, value_enum, default_value_t = Codec::Utf8)]
    codec: Codec,

    /// Memory-map the file instead of reading it into memory
    #[arg(long)]
    mmap: bool,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Path to the source JSON file containing key-value pairs
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Path to the forkmap binary file to produce
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Codec used to store values
    #[arg(long, value_enum, default_value_t = Codec::Utf8)]
    codec: Codec,

    /// zlib compression level (0-9)
    #[arg(long, value_name = "LEVEL", default_value_t = 6)]
    level: u32,

    /// Optional override for writer buffer size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = 1 << 20)]
    buffer_size: usize,
}

#[derive(Serialize)]
struct Summary<'a> {
    path: &'a Path,
    access_mode: AccessMode,
    file_length: u64,
    distinct_keys: usize,
    layout: &'a forkmap::ForkMapLayout,
}

fn run_info(args: InfoArgs) -> Result<()> {
    let mode = if args.mmap {
        AccessMode::Mapped
    } else {
        AccessMode::InMemory
    };
    match args.codec {
        Codec::Utf8 => inspect(&args, mode, Utf8Codec),
        Codec::Json => inspect(&args, mode, JsonCodec::<Value>::new()),
    }
}

fn inspect<D>(args: &InfoArgs, mode: AccessMode, decoder: D) -> Result<()>
where
    D: ForkMapDecoder,
    D::Value: Serialize,
{
    let map = ForkMap::open_with(&args.input, mode, decoder)?;
    let summary = Summary {
        path: &args.input,
        access_mode: map.access_mode(),
        file_length: map.file_length(),
        distinct_keys: map.len(),
        layout: map.layout(),
    };
    println!("{}", to_json(&summary)?);

    for key in &args.key {
        println!("{}: {}", key, to_json(&map.get(key)?)?);
    }
    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let entries = read_source(&args.input)?;
    let builder = ForkMapBuilder::default()
        .with_compression(ZlibCompression::new(args.level))
        .with_writer_buffer_size(args.buffer_size);

    let info = match args.codec {
        Codec::Utf8 => {
            let entries = entries
                .into_iter()
                .enumerate()
                .map(|(index, (key, value))| match value {
                    Value::String(text) => Ok((key, text)),
                    other => Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("entry {index} ({key}) holds {other}, not text; use --codec json"),
                    )),
                })
                .collect::<std::io::Result<Vec<_>>>()?;
            builder.build_to(&args.output, entries, &Utf8Codec)?
        }
        Codec::Json => builder.build_to(&args.output, entries, &JsonCodec::<Value>::new())?,
    };

    println!("{}", to_json(&info)?);
    Ok(())
}

fn to_json(value: &impl Serialize) -> std::io::Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| Error::other(format!("Failed to format JSON: {e}")))
}

/// Accepted `convert` input: an object, or an array whose items are
/// `{"key": .., "value": ..}` records or `[key, value]` pairs.
#[derive(Deserialize)]
#[serde(untagged)]
enum Source {
    Object(serde_json::Map<String, Value>),
    List(Vec<SourceEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceEntry {
    Pair(String, Value),
    Record { key: String, value: Value },
}

impl SourceEntry {
    fn into_pair(self) -> (String, Value) {
        match self {
            SourceEntry::Pair(key, value) | SourceEntry::Record { key, value } => (key, value),
        }
    }
}

// array order is kept, so later duplicates win.
fn read_source(path: &Path) -> std::io::Result<Vec<(String, Value)>> {
    let reader = BufReader::new(File::open(path)?);
    let source: Source = serde_json::from_reader(reader).map_err(|e| {
        Error::new(
            ErrorKind::InvalidData,
            format!("{} is not a key-value JSON document: {e}", path.display()),
        )
    })?;
    Ok(match source {
        Source::Object(map) => map.into_iter().collect(),
        Source::List(entries) => entries.into_iter().map(SourceEntry::into_pair).collect(),
    })
}
