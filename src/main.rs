//! Binary entrypoint that launches the Halldyll retrieval server.

use std::process::ExitCode;

use halldyll_rag::start_halldyll_rag;

/// Load configuration, index the documents directory and serve the API.
fn main() -> ExitCode {
    start_halldyll_rag::run()
}
