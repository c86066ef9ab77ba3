//! Council server binary.
//! Run with: cargo run --bin council-server

use std::process::ExitCode;

use sheldon_council::start_council;

fn main() -> ExitCode {
    start_council::run()
}
