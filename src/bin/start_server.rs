//! `start-server --host H --port P --storage DIR --protocol {0|1} [-v|-q]`
//! (spec.md §6). A thin shell: parses arguments, installs the logger, opens
//! the storage directory, and hands off to `reliable_transfer::server`. No
//! transport logic lives here.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use log::{error, info, LevelFilter};

use reliable_transfer::config::{Protocol, DEFAULT_HOST, DEFAULT_PORT};
use reliable_transfer::server::Server;

/// Runs the reliable-transfer server, serving uploads and downloads out of
/// a single storage directory.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory files are uploaded into and downloaded from.
    #[arg(long)]
    storage: PathBuf,

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

    if let Err(e) = std::fs::create_dir_all(&args.storage) {
        error!("could not create storage directory {}: {e}", args.storage.display());
        std::process::exit(1);
    }

    let mut server = match Server::bind(&args.host, args.port, args.storage.clone(), protocol) {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            std::process::exit(e.exit_code());
        }
    };

    info!("storage directory: {}", args.storage.display());
    let shutdown = AtomicBool::new(false);
    if let Err(e) = server.run(&shutdown) {
        error!("server exited: {e}");
        std::process::exit(e.exit_code());
    }
}
