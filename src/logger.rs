//! Subscriber setup for programs, benches and tests that link lieopt
//!
//! The library itself only emits `tracing` events under the `lieopt` target.
//! Nothing is printed until a subscriber is installed.

use tracing::Level;

/// Install a `fmt` subscriber at INFO, or whatever `RUST_LOG` asks for.
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Install a `fmt` subscriber whose filter falls back to `default_level` when
/// `RUST_LOG` is unset or unparsable. A subscriber that is already installed
/// wins; later calls are no-ops.
///
/// ```no_run
/// lieopt::init_logger_with_level(tracing::Level::DEBUG);
/// ```
pub fn init_logger_with_level(default_level: Level) {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init();
}
