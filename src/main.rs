use assert_runner::cli;
use std::process::ExitCode;

// A single-threaded runtime: combinations are executed strictly one after another.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    assert_runner::init();

    match cli::run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
