//! zica - Decode and encode Protocol Buffer payloads against a compiled
//! descriptor set
//!
//! This tool drives the dynamic runtime end to end: it loads a
//! `FileDescriptorSet` (as produced by `protoc --descriptor_set_out`),
//! resolves a message type by name, and transcodes payloads between the
//! binary wire format and the protobuf JSON mapping.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;
use zica_core::codec::{binary, json};
use zica_core::{DescriptorRegistry, JsonOptions};

/// Decode and encode Protocol Buffer payloads against a compiled descriptor set
#[derive(Parser, Debug)]
#[command(name = "zica")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Direction of the conversion
    #[arg(value_enum)]
    mode: Mode,

    /// Path to a compiled descriptor set (protoc --descriptor_set_out)
    #[arg(short, long)]
    descriptor: PathBuf,

    /// Fully-qualified message type name, e.g. my.pkg.Envelope
    #[arg(short = 't', long = "type")]
    type_name: String,

    /// Input file (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print fields holding default values when decoding
    #[arg(long)]
    emit_defaults: bool,

    /// Ignore JSON keys that match no declared field when encoding
    #[arg(long)]
    ignore_unknown: bool,

    /// Compact JSON output instead of indented
    #[arg(long)]
    compact: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Conversion direction
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Binary wire format in, JSON out
    Decode,
    /// JSON in, binary wire format out
    Encode,
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

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    if !cli.descriptor.exists() {
        bail!(
            "Descriptor set file does not exist: {}",
            cli.descriptor.display()
        );
    }

    let descriptor_bytes = fs::read(&cli.descriptor).with_context(|| {
        format!(
            "Failed to read descriptor set: {}",
            cli.descriptor.display()
        )
    })?;

    let registry = DescriptorRegistry::from_bytes(&descriptor_bytes).with_context(|| {
        format!(
            "Failed to build registry from {}",
            cli.descriptor.display()
        )
    })?;
    debug!(
        "registry holds {} message type(s), {} enum(s)",
        registry.message_count(),
        registry.enum_count()
    );

    let descriptor = registry
        .message_by_name(&cli.type_name)
        .with_context(|| format!("Message type '{}' not found in the set", cli.type_name))?;

    let input = read_input(cli.input.as_deref())?;
    debug!("read {} input byte(s)", input.len());

    match cli.mode {
        Mode::Decode => {
            let message = binary::parse(&input, &descriptor, &registry)
                .context("Failed to parse binary payload")?;
            let options = JsonOptions::new().emit_default_values(cli.emit_defaults);
            let mut text = if cli.compact {
                json::to_json(&message, &registry, &options)?
            } else {
                json::to_json_pretty(&message, &registry, &options)?
            };
            text.push('\n');
            write_output(cli.output.as_deref(), text.as_bytes())?;
            info!(
                "decoded {} byte(s) of {}",
                input.len(),
                descriptor.full_name()
            );
        }
        Mode::Encode => {
            let text =
                String::from_utf8(input).context("JSON input is not valid UTF-8")?;
            let options = JsonOptions::new().ignore_unknown_fields(cli.ignore_unknown);
            let message = json::from_json(&text, &descriptor, &registry, &options)
                .context("Failed to parse JSON payload")?;
            let bytes = binary::serialize(&message);
            write_output(cli.output.as_deref(), &bytes)?;
            info!(
                "encoded {} wire byte(s) of {}",
                bytes.len(),
                descriptor.full_name()
            );
        }
    }

    Ok(())
}

/// Read the payload from a file, or stdin when no path was given
fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read input: {}", path.display()))
        }
        None => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

/// Write the result to a file, or stdout when no path was given
fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => fs::write(path, bytes)
            .with_context(|| format!("Failed to write output: {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("Failed to write stdout")?;
            stdout.flush().context("Failed to flush stdout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_output_roundtrips_through_input() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("payload.bin");

        write_output(Some(&path), &[0x08, 0x96, 0x01]).unwrap();
        let read_back = read_input(Some(&path)).unwrap();
        assert_eq!(read_back, vec![0x08, 0x96, 0x01]);
    }

    #[test]
    fn test_read_input_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.bin");
        assert!(read_input(Some(&path)).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
