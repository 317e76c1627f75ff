use std::process::ExitCode;

use clap::Parser;
use rasterfe::cli::{self, CliArgs};
use rasterfe::logger;

fn main() -> ExitCode {
    // Session log (overwrites the previous run's log)
    logger::init();
    let args = CliArgs::parse();
    cli::run(args)
}
