//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output goes to **stderr** so that a binary's stdout stays free for
//! its results (the runner prints trades there). When a log directory is
//! given, a daily-rotating file receives the same events as JSON lines.
//! `RUST_LOG` overrides the level passed in.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber. Call once at program start.
///
/// - `log_level`: default filter when `RUST_LOG` is unset (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating JSON log files
/// - `module_name`: log file prefix (e.g. `"lw-runner"`)
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(true).with_thread_ids(true);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry().with(env_filter).with(console_layer).init();
        return;
    };

    let file_appender = tracing_appender::rolling::daily(dir, module_name);
    let file_layer = fmt::layer().json().with_writer(file_appender).with_ansi(false).with_current_span(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}
