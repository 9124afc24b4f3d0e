use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Target of every event this crate emits.
const CRATE_TARGET: &str = "mqtt_session";

/// Parses a configured level name; unknown names mean `info`.
pub fn level(name: &str) -> LevelFilter {
    match name.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" | "warning" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

/// Filter used by [`init`].
///
/// `RUST_LOG` takes precedence when it holds valid directives. Otherwise the
/// session manager logs at `default_level` and other crates at `warn`.
pub fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{CRATE_TARGET}={}", level(default_level))))
}

/// Installs the global fmt subscriber. Later calls are ignored.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_thread_names(true)
        .try_init();
}
