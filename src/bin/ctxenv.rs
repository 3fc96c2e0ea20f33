//! ctxenv CLI: operational tooling for context envelopes
//!
//! Usage:
//!   ctxenv canonicalize <CONTEXT> [--varint]
//!   ctxenv pack   --context <CONTEXT> [--input <file>] --output <file>
//!   ctxenv unpack --context <CONTEXT> [--input <file>] [--output <file>]
//!   ctxenv seal   --context <CONTEXT> [--input <file>] --output <file>
//!   ctxenv open   --context <CONTEXT> [--input <file>] [--output <file>]
//!   ctxenv inspect <file>
//!
//! CONTEXT uses the canonical form `key=value|key2=value2`. Omit `--context`
//! for packets that carry no context.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use context_envelope::{aad, inspect, packet, sealed, EncryptionContext};

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "canonicalize" => cmd_canonicalize(&args[2..]),
        "pack" => cmd_pack(&args[2..]),
        "unpack" => cmd_unpack(&args[2..]),
        "seal" => cmd_seal(&args[2..]),
        "open" => cmd_open(&args[2..]),
        "inspect" => cmd_inspect(&args[2..]),
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            println!("ctxenv {}", context_envelope::VERSION);
            Ok(())
        }
        cmd => {
            eprintln!("error: unknown command '{}'", cmd);
            print_usage();
            Err("unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!(
        r#"ctxenv: frame ciphertext with its encryption context

USAGE:
    ctxenv <COMMAND> [OPTIONS]

COMMANDS:
    canonicalize  Print the canonical form of a context
    pack          Frame ciphertext as a tag/length v2 packet
    unpack        Verify a tag/length packet and extract its ciphertext
    seal          Frame ciphertext as a varint packet
    open          Verify a varint packet and extract its ciphertext
    inspect       Show packet structure (no verification)

EXAMPLES:
    ctxenv canonicalize "Table_Name=orders|key=value"

    ctxenv pack --context "table_name=orders" --input blob.ct --output blob.pkt
    ctxenv unpack --context "table_name=orders" --input blob.pkt --output blob.ct

    ctxenv inspect blob.pkt

ENVIRONMENT:
    RUST_LOG     Log filter (default: warn)

OPTIONS:
    -h, --help       Print help
    -V, --version    Print version
"#
    );
}

#[derive(Default)]
struct IoArgs {
    context: Option<String>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
}

fn parse_io_args(args: &[String]) -> Result<IoArgs, Box<dyn std::error::Error>> {
    let mut parsed = IoArgs::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--context" | "-c" => {
                i += 1;
                parsed.context = Some(args.get(i).ok_or("missing context")?.clone());
            }
            "--input" | "-i" => {
                i += 1;
                parsed.input = Some(PathBuf::from(args.get(i).ok_or("missing input path")?));
            }
            "--output" | "-o" => {
                i += 1;
                parsed.output = Some(PathBuf::from(args.get(i).ok_or("missing output path")?));
            }
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }

    Ok(parsed)
}

fn read_input(path: &Option<PathBuf>) -> io::Result<Vec<u8>> {
    if let Some(path) = path {
        fs::read(path)
    } else {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    }
}

fn write_output(path: &Option<PathBuf>, bytes: &[u8]) -> io::Result<()> {
    if let Some(path) = path {
        fs::write(path, bytes)?;
        eprintln!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    } else {
        io::stdout().write_all(bytes)
    }
}

/// Values of a context where every key must carry one.
fn value_pairs(ctx: &EncryptionContext) -> Result<Vec<(String, String)>, Box<dyn std::error::Error>> {
    ctx.iter()
        .map(|(k, v)| {
            v.map(|v| (k.to_owned(), v.to_owned()))
                .ok_or_else(|| format!("varint contexts need a value for key '{}'", k).into())
        })
        .collect()
}

fn cmd_canonicalize(args: &[String]) -> CliResult {
    let raw = args.first().ok_or("missing context")?;
    let ctx = EncryptionContext::parse(raw)?;

    if args.get(1).map(String::as_str) == Some("--varint") {
        match aad::serialize_context(Some(value_pairs(&ctx)?))? {
            Some(bytes) => println!("{}", hex::encode(&bytes)),
            None => println!("(no context)"),
        }
    } else {
        println!("{}", ctx.serialize()?);
    }
    Ok(())
}

fn cmd_pack(args: &[String]) -> CliResult {
    let io_args = parse_io_args(args)?;
    if io_args.output.is_none() {
        return Err("missing --output".into());
    }
    let ctx = EncryptionContext::deserialize(io_args.context.as_deref())?;
    let ciphertext = read_input(&io_args.input)?;

    let wire = packet::encode(ctx.as_ref(), &ciphertext)?;
    write_output(&io_args.output, &wire)?;
    Ok(())
}

fn cmd_unpack(args: &[String]) -> CliResult {
    let io_args = parse_io_args(args)?;
    let expected = EncryptionContext::deserialize(io_args.context.as_deref())?;
    let wire = read_input(&io_args.input)?;

    let (_, ciphertext) = packet::decode(&wire, expected.as_ref())?;
    write_output(&io_args.output, &ciphertext)?;
    Ok(())
}

fn cmd_seal(args: &[String]) -> CliResult {
    let io_args = parse_io_args(args)?;
    if io_args.output.is_none() {
        return Err("missing --output".into());
    }
    let ctx = EncryptionContext::deserialize(io_args.context.as_deref())?;
    let pairs = ctx.as_ref().map(value_pairs).transpose()?;
    let ciphertext = read_input(&io_args.input)?;

    let wire = sealed::serialize_with_context(&ciphertext, pairs)?;
    write_output(&io_args.output, &wire)?;
    Ok(())
}

fn cmd_open(args: &[String]) -> CliResult {
    let io_args = parse_io_args(args)?;
    let ctx = EncryptionContext::deserialize(io_args.context.as_deref())?;
    let pairs = ctx.as_ref().map(value_pairs).transpose()?;
    let wire = read_input(&io_args.input)?;

    let parts = sealed::deserialize(&wire, pairs)?;
    write_output(&io_args.output, parts.ciphertext)?;
    Ok(())
}

fn cmd_inspect(args: &[String]) -> CliResult {
    let input_path = args.first().ok_or("missing file path")?;
    let wire = fs::read(input_path)?;

    let info = inspect(&wire)?;

    println!("Context Envelope");
    println!("================");
    println!("Dialect:          {}", info.dialect.name());
    println!("Version byte:     0x{:02X}", info.version);
    println!(
        "Context:          {}",
        info.context_fingerprint.as_deref().unwrap_or("none")
    );
    if !info.legacy_keys.is_empty() {
        println!("Legacy key bits:  {}", info.legacy_keys.join(", "));
    }
    if !info.placeholder_keys.is_empty() {
        println!("Placeholders:     {}", info.placeholder_keys.join(", "));
    }
    println!();
    println!("Total Size:       {} bytes", info.total_bytes);
    println!("Ciphertext Size:  {} bytes", info.ciphertext_bytes);

    Ok(())
}
