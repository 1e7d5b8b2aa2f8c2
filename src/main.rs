//! Host simulator: drives a squash compression session the way a
//! bounded-buffer host would, from a file or stdin to a file or stdout.

use clap::Parser;
use exn::ResultExt;
use squash_compress::error::{ErrorKind, Result};
use squash_compress::{Scheme, StreamBuffers};
use squash_config::Settings;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "squash", version, about = "Compress to gzip through the bounded-buffer session protocol")]
struct Cli {
    /// File to compress (reads stdin when omitted)
    input: Option<PathBuf>,
    /// Where to write the gzip stream (writes stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Quality level: 1-5 stream through the fast delegate, 6-10 use the batch backend
    #[arg(short, long, default_value_t = 8, value_parser = clap::value_parser!(i32).range(1..=10))]
    level: i32,
    /// Largest input chunk handed to each call
    #[arg(long)]
    chunk_size: Option<NonZeroUsize>,
    /// Size of the output area offered to each call
    #[arg(long)]
    output_capacity: Option<NonZeroUsize>,
    /// Configuration file (defaults to squash.toml in the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("squash: {err:?}");
            return ExitCode::FAILURE;
        },
    };
    init_logging(&settings.log.level);

    let buffers = match settings.stream_buffers() {
        Ok(defaults) => StreamBuffers {
            chunk_size: cli.chunk_size.unwrap_or(defaults.chunk_size),
            output_capacity: cli.output_capacity.unwrap_or(defaults.output_capacity),
        },
        Err(err) => {
            tracing::error!(error = ?err, "invalid configuration");
            return ExitCode::FAILURE;
        },
    };
    let scheme = match settings.effort_table() {
        Ok(efforts) => Scheme::default().with_efforts(efforts).with_batch(Arc::new(settings.batch_backend())),
        Err(err) => {
            tracing::error!(error = ?err, "invalid configuration");
            return ExitCode::FAILURE;
        },
    };

    match run(&cli, &scheme, buffers) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "compression failed");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).init();
}

fn run(cli: &Cli, scheme: &Scheme, buffers: StreamBuffers) -> Result<()> {
    if let Err(err) = scheme.initialize() {
        // Batch levels do not need the delegate.
        if cli.level <= 5 {
            return Err(err);
        }
        tracing::warn!(error = ?err, "fast-path delegate unavailable");
    }

    let reader: Box<dyn Read> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path).or_raise(|| ErrorKind::Io)?)),
        None => Box::new(io::stdin().lock()),
    };
    let writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).or_raise(|| ErrorKind::Io)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut session = scheme.create_session(0)?;
    let totals = session.compress_stream(reader, writer, cli.level, buffers)?;
    scheme.destroy_session(session);
    scheme.deinitialize();

    tracing::info!(
        level = cli.level,
        input_bytes = totals.input_bytes,
        output_bytes = totals.output_bytes,
        calls = totals.calls,
        "stream compressed"
    );
    Ok(())
}
