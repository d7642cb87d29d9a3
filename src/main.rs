use std::process::ExitCode;

use clap::Parser;

use maskraster::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    // Held until exit so the file writer flushes.
    let _log_guard = logger::init(args.verbose);
    if let Some(path) = logger::log_path() {
        tracing::debug!("session log at {}", path.display());
    }
    cli::run(args)
}
