//! Log output for processes that embed agent memory.
//!
//! Memory operations emit structured events (`memory.message_added`,
//! `memory.snapshot_saved`, ...) through `tracing`; nothing is printed until a
//! subscriber is installed. The `amem` CLI installs one here, writing to
//! stderr so its JSON results on stdout can be piped.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::MemoryConfig;

/// Send memory events to stderr, as plain text or one JSON object per line.
///
/// `RUST_LOG` takes precedence over `level`. If a subscriber is already
/// installed (a host application, or an earlier call) this does nothing.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

/// Same as [`init_tracing`] using `log_json` and `log_level` from `config`.
pub fn init_from_config(config: &MemoryConfig) {
    init_tracing(config.log_json, config.level());
}
