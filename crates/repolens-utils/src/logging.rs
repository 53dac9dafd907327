//! Tracing setup for the CLI.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// `REPOLENS_LOG` overrides the default filter. Without `--verbose` only
/// warnings and the final outcome line reach stderr.
pub fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_env("REPOLENS_LOG")
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("repolens=debug,info")
            } else {
                EnvFilter::try_new("repolens=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    // Ignore a second init (integration tests drive the CLI repeatedly)
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init();
}
