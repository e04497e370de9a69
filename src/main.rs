use anyhow::Result;
use clap::Parser;

mod commands;

use commands::{run_inspect, run_repack, Cli, Commands};
use mrepack::logging::init_logger;

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logger(args.verbose);

    match args.command {
        Commands::Repack(repack) => {
            // Per-read and per-file failures are already logged and do not
            // change the exit status.
            run_repack(&repack, args.quiet)?;
        }
        Commands::Inspect(inspect) => {
            run_inspect(&inspect.container, inspect.groups)?;
        }
    }
    Ok(())
}
