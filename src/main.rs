//! micnote: terminal voice message recorder.

mod app;
mod clipboard;
mod commands;
mod config;
mod errors;
mod logging;
mod recording;
mod ui;
mod upload;

// The capture controller and its feedback loop assume a single-threaded executor.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    app::run().await
}
