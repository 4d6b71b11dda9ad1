//! Tracing subscriber setup for the binaries.

use tracing::metadata::LevelFilter;

/// Initializes the global subscriber.
///
/// The level comes from `LOG_LEVEL` when set; otherwise TRACE in debug
/// builds and INFO in release builds.
pub fn init() {
    tracing_subscriber::fmt()
        .compact()
        .with_file(false)
        .with_line_number(false)
        .with_max_level(level_from_env())
        .init();
}

fn level_from_env() -> LevelFilter {
    let fallback = if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    match std::env::var("LOG_LEVEL") {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {value}, defaulting to {fallback}");
            fallback
        }),
        Err(_) => fallback,
    }
}
