//! `download --host H --port P --dst DIR --name F --protocol {0|1}`
//! (spec.md §6). Creates `DIR/F` and hands a write sink to the client
//! driver; on `RemoteFileNotFound` the partially-created file is removed.

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use log::{error, LevelFilter};

use reliable_transfer::client;
use reliable_transfer::config::{Protocol, DEFAULT_HOST, DEFAULT_PORT};
use reliable_transfer::io_chunks::WriteSink;
use reliable_transfer::TransferError;

/// Downloads a file from a reliable-transfer server.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory the downloaded file is written into.
    #[arg(long)]
    dst: PathBuf,

    /// File name to request from the server.
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

    if let Err(e) = std::fs::create_dir_all(&args.dst) {
        error!("could not create destination directory {}: {e}", args.dst.display());
        std::process::exit(1);
    }

    let path = args.dst.join(&args.name);
    let file = match File::create(&path) {
        Ok(f) => f,
        Err(e) => {
            error!("could not create {}: {e}", path.display());
            std::process::exit(1);
        }
    };
    let mut sink = WriteSink::new(file);

    if let Err(e) = client::download(&args.host, args.port, protocol, &args.name, &mut sink) {
        error!("download failed: {e}");
        if matches!(e, TransferError::RemoteFileNotFound) {
            let _ = std::fs::remove_file(&path);
        }
        std::process::exit(e.exit_code());
    }
}
