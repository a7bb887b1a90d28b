//! # archive-progress CLI
//!
//! Replays recorded task events through the progress tracker.
//!
//! ## Usage
//! ```bash
//! archive-progress replay task.json --interval-ms 50
//! archive-progress fold task.json
//! ```

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}
