//! Celforge - Command-line tool for GBA sprite asset conversion and export

use std::process::ExitCode;

use celforge::cli;

fn main() -> ExitCode {
    env_logger::init();
    cli::run()
}
