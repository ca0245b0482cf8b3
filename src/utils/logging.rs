//! Minimal logging setup.

use log::LevelFilter;

/// Level used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "warn";

/// Initializes `env_logger`, honoring `RUST_LOG` when present.
///
/// `verbose` raises the crate's own output to `info` without touching the
/// noise level of HTTP dependencies.
pub fn init(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or(DEFAULT_FILTER);
    let mut builder = env_logger::Builder::from_env(env);

    if verbose {
        builder.filter_module("xas_launcher", LevelFilter::Info);
    }

    builder
        .filter_module("hyper", LevelFilter::Warn)
        .filter_module("reqwest", LevelFilter::Warn)
        .format_timestamp_secs();

    // A second init (e.g. from tests) is not an error worth reporting
    let _ = builder.try_init();
}
