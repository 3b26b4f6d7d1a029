/*!
Command line entry point for the AppStream catalog generator.

The binary wires the configuration, the selected backend, and the
embedded stores into the engine and exposes the maintenance commands.
Exit codes: 0 on success, 1 for user errors (bad config, unknown suite),
2 for internal failures.
*/

use asgen::cmd;
use clap::Parser;
use std::process;

fn main() {
    let args = cmd::Args::parse();
    cmd::init_logger(&args);

    if let Err(e) = cmd::run(args) {
        eprintln!("Error: {:#}", e);
        let code = if e.is::<cmd::UserError>() { 1 } else { 2 };
        process::exit(code);
    }
}
