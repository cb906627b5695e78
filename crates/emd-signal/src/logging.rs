//! Structured logging setup.
//!
//! The crate itself only emits [`tracing`] events: `debug` on entry to each
//! public operation with shapes and parameters, `trace` for per-component
//! detail such as dropped samples or rejected cycles. Applications that
//! want to see them install a subscriber, either their own or the `fmt`
//! subscriber configured by [`init`].

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

/// Settings for the `fmt` subscriber installed by [`init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Maximum level (`"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`
    /// or `"off"`). Unrecognised values fall back to `info`.
    pub level: String,
    /// Print the module path of each event.
    pub show_target: bool,
    /// Print the emitting thread's id.
    pub show_thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: false,
            show_thread_ids: false,
        }
    }
}

impl LogConfig {
    /// Config at the given level with default formatting.
    pub fn with_level(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    /// The parsed level filter.
    pub fn level_filter(&self) -> LevelFilter {
        self.level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO)
    }
}

/// Install a global `fmt` subscriber.
///
/// Returns `false` if a global subscriber was already set, in which case
/// the existing one stays in place.
pub fn init(config: &LogConfig) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(config.level_filter())
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .try_init()
        .is_ok()
}
