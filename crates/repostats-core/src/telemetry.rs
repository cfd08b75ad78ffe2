//! Tracing initialisation for the repostats binary.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Crates whose logs follow the requested level; everything else stays at `warn`.
const OWN_TARGETS: [&str; 3] = ["repostats_core", "repostats_ci", "repostats"];

/// Default filter when `RUST_LOG` is unset.
fn default_directives(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// * `json` emits newline-delimited JSON log lines.
/// * `level` applies to the repostats crates when `RUST_LOG` is not set.
///
/// Logs go to stderr; stdout carries command output only.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let base = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let layer = if json { base.json().boxed() } else { base.boxed() };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .ok();
}
