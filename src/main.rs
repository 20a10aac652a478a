//! promptsplit CLI binary
//!
//! Minimal entrypoint; all logic lives in the library behind cli::run().

#[tokio::main]
async fn main() {
    if let Err(err) = promptsplit::cli::run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
