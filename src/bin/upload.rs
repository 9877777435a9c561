//! `upload --host H --port P --src DIR --name F --protocol {0|1}` (spec.md
//! §6). Opens `DIR/F` and hands a chunked reader to the client driver.

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use log::{error, LevelFilter};

use reliable_transfer::client;
use reliable_transfer::config::{Protocol, DEFAULT_HOST, DEFAULT_PORT};
use reliable_transfer::io_chunks::ChunkedReader;

/// Uploads a file to a reliable-transfer server.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory the source file is read from.
    #[arg(long)]
    src: PathBuf,

    /// File name, relative to `--src`.
    #[arg(long)]
    name: String,

    /// ARQ strategy: 0 = Stop-and-Wait, 1 = Selective Repeat.
    #[arg(long, default_value_t = 1)]
    protocol: u8,

    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let protocol = match Protocol::try_from(args.protocol) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let path = args.src.join(&args.name);
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) => {
            error!("could not open {}: {e}", path.display());
            std::process::exit(1);
        }
    };
    let mut source = ChunkedReader::new(file);

    if let Err(e) = client::upload(&args.host, args.port, protocol, &args.name, &mut source) {
        error!("upload failed: {e}");
        std::process::exit(e.exit_code());
    }
}
