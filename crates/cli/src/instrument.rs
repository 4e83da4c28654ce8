// Logging setup and step timing

use std::fmt::Display;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `RUST_LOG` wins, then `--verbose`, then
/// the configured level. Safe to call more than once.
pub fn init_logging(level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { level }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run one session step inside a span, logging its duration and outcome.
pub fn timed<T, E: Display>(op: &'static str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let span = tracing::info_span!("step", op);
    let _guard = span.enter();
    let start = Instant::now();

    let result = f();
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => tracing::info!(elapsed_ms, "{op} finished"),
        Err(e) => tracing::warn!(elapsed_ms, error = %e, "{op} failed"),
    }
    result
}
