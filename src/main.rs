use std::process::ExitCode;

use annox::AnnoxError;

/// Exit status for any failure: invalid data, bad input, or I/O.
const FAILURE: u8 = 2;

fn main() -> ExitCode {
    match annox::run() {
        Ok(()) => ExitCode::SUCCESS,
        // The report has already been printed.
        Err(AnnoxError::ValidationFailed { .. }) => ExitCode::from(FAILURE),
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(FAILURE)
        }
    }
}
