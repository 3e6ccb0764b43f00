#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use log::error;
use structopt::StructOpt;

use brzdec::{BrzDecoder, DecodeError, DecoderConfig, Format, StreamPump};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "brzdec",
    about = "Decompress .brz block streams to standard output."
)]
struct Opts {
    /// Files to decompress; with no FILE, or when FILE is -, read standard
    /// input
    #[structopt(parse(from_os_str))]
    files: Vec<PathBuf>,

    /// Decode the legacy headerless block stream instead of .brz
    #[structopt(long)]
    raw: bool,

    /// Keep decoding the remaining files after one of them fails
    #[structopt(long = "keep-going")]
    keep_going: bool,

    /// Limit on uncompressed bytes per file (default: unbounded)
    #[structopt(short = "M", long = "max-size", value_name = "bytes")]
    max_size: Option<u64>,

    /// Suppress warnings; specify twice to suppress errors too
    #[structopt(short, long, parse(from_occurrences))]
    quiet: usize,
}

fn main() {
    process::exit(match run() {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            eprintln!("brzdec: {:#}", err);
            1
        }
    });
}

fn run() -> Result<bool> {
    let opts = Opts::from_args();

    stderrlog::new()
        .quiet(opts.quiet >= 2)
        .verbosity(if opts.quiet == 0 { 1 } else { 0 })
        .init()
        .context("failed to initialize logging")?;

    let format = if opts.raw { Format::Raw } else { Format::Brz };
    let config = DecoderConfig {
        max_output_size: opts.max_size,
    };

    // One decoder and one pair of buffers for every file, so a batch does not
    // reallocate decoder state per source.
    let mut pump = StreamPump::new(BrzDecoder::with_config(format, config));

    let stdout = io::stdout();
    let mut sink = BufWriter::new(stdout.lock());

    let files = if opts.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        opts.files.clone()
    };

    let mut all_ok = true;
    for path in &files {
        if let Err(err) = decode_one(&mut pump, &mut sink, path) {
            error!("{}: {}", display_name(path), err);
            all_ok = false;
            if err.is_run_fatal() || !opts.keep_going {
                break;
            }
        }
    }

    if let Err(err) = sink.flush() {
        error!("(stdout): {}", DecodeError::SinkWrite(err));
        all_ok = false;
    }

    Ok(all_ok)
}

fn display_name(path: &Path) -> String {
    if path.as_os_str() == "-" {
        "(stdin)".to_string()
    } else {
        path.display().to_string()
    }
}

fn decode_one<W: Write>(
    pump: &mut StreamPump<BrzDecoder>,
    sink: W,
    path: &Path,
) -> Result<(), DecodeError> {
    if path.as_os_str() == "-" {
        pump.run(io::stdin().lock(), sink)
    } else {
        let file = File::open(path).map_err(DecodeError::SourceRead)?;
        pump.run(file, sink)
    }
}
