//! Logger module for Catena
//!
//! Go-style simple logging: `[LEVEL] message`
//!
//! # Usage
//!
//! ```rust
//! use catena::util::logger;
//!
//! logger::init();
//! tracing::info!("Hello, {}", "world");
//! ```

use crate::util::config::LoggingConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Initialize logger with default configuration (INFO level)
pub fn init() {
    init_with_level(LogLevel::Info);
}

/// Initialize logger with custom level (Go style: `[LEVEL] message`)
///
/// Does nothing if a global subscriber is already installed.
pub fn init_with_level(level: LogLevel) {
    install(LevelFilter::from_level(level.into()));
}

/// Initialize logger for debug use (DEBUG level)
pub fn init_debug() {
    init_with_level(LogLevel::Debug);
}

/// Initialize logger from the `[logging]` configuration section.
///
/// A `filter` directive wins over `level`; an unparsable one falls back to `level`.
pub fn init_from_config(config: &LoggingConfig) {
    let level = LevelFilter::from_level(config.level.into());
    match config.filter.as_deref().map(EnvFilter::try_new) {
        Some(Ok(filter)) => install(filter),
        Some(Err(err)) => {
            install(level);
            tracing::warn!("ignoring invalid log filter: {}", err);
        }
        None => install(level),
    }
}

fn install<F>(filter: F)
where
    F: tracing_subscriber::layer::Filter<Registry> + Send + Sync + 'static,
{
    // Go 风格：显示 [LEVEL] 前缀，不显示时间、不显示模块路径、无颜色
    let layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_level(true)
        .with_ansi(false)
        .compact()
        .with_filter(filter);

    let _ = Registry::default().with(layer).try_init();
}
