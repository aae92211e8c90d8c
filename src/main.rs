//! duscan — parallel disk usage analyser.
//!
//! Thin binary entry point. All logic lives in the `duscan-core` and
//! `duscan-cli` crates.

use std::process::ExitCode;

fn main() -> ExitCode {
    match duscan_cli::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("duscan: {err:#}");
            ExitCode::FAILURE
        }
    }
}
