use std::env::var;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing at the default INFO level.
pub fn init() {
    initialize_tracing(LevelFilter::INFO);
}

/// Initialize tracing with a verbosity count from the command line
/// (0 = info, 1 = debug, 2+ = trace).
pub fn init_with_verbosity(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    initialize_tracing(level);
}

/// Initialize tracing subscriber with default configuration.
///
/// RUST_LOG overrides the default level filter; RUST_LOG_FORMAT=json
/// switches the human-readable layer to newline-delimited JSON.
fn initialize_tracing(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).init();
}
