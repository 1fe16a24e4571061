//! CLI module for taskpilot - command-line interface and subcommands.
//!
//! Provides the main entry point with single-shot subcommands and the
//! interactive prompt loop.

pub mod commands;
pub mod render;
pub mod repl;

pub use commands::Cli;

/// Resolves when the process receives SIGTERM
#[cfg(unix)]
pub async fn terminate_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
pub async fn terminate_signal() {
    std::future::pending::<()>().await;
}
