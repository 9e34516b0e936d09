// Tracing for the gateway: configured level for our crates, HTTP client and
// server internals kept at warn unless the operator asks for trace.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// Targets that log every connection and frame at debug.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "redis", "deadpool"];

/// Filter directives for a configured level.
///
/// At `info` and `debug` the noisy transport targets are capped at `warn`; at
/// `trace` everything is let through, and quieter levels need no caps.
pub fn filter_directives(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    match level.as_str() {
        "info" | "debug" => std::iter::once(level.clone())
            .chain(NOISY_TARGETS.iter().map(|target| format!("{target}=warn")))
            .collect::<Vec<_>>()
            .join(","),
        _ => level,
    }
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    // RUST_LOG, when set, replaces the computed directives entirely.
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(filter_directives(level)));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Apply `logging.level` once the config is loaded, unless RUST_LOG is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let directives = filter_directives(level);
        let _ = handle.modify(|f| {
            *f = EnvFilter::new(&directives);
        });
        tracing::debug!(%directives, "log filter applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chatty_levels_cap_transport_targets() {
        let directives = filter_directives("DEBUG");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("hyper=warn"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("redis=warn"));
    }

    #[test]
    fn other_levels_pass_through() {
        assert_eq!(filter_directives("trace"), "trace");
        assert_eq!(filter_directives("warn"), "warn");
        assert_eq!(filter_directives("off"), "off");
    }

    #[test]
    fn directives_parse_as_env_filter() {
        for level in ["trace", "debug", "info", "warn", "error", "off"] {
            assert!(EnvFilter::try_new(filter_directives(level)).is_ok(), "{level}");
        }
    }
}
