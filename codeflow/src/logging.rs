//! Diagnostic tracing for the agent.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. It is separate from
//! product output: the response goes to stdout and the history to `--history-json`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn,codeflow=info`, which logs each planner
/// decision and tool result. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=codeflow=debug codeflow run -q "List the files"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,codeflow=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
