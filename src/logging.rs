use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::ValueEnum;
use tracing::Level;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::domain::TVError;

pub const LOG_FILE: &str = concat!(env!("CARGO_PKG_NAME"), ".log");

/// Log to `path`, or to the default file in the working directory.
/// `RUST_LOG` is honored; `level` replaces its default directive.
pub fn init(path: Option<&Path>, level: Option<Level>) -> Result<PathBuf, TVError> {
    let log_path = match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            path.to_path_buf()
        }
        None => std::env::current_dir()?.join(LOG_FILE),
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.unwrap_or(Level::WARN).into())
        .from_env_lossy();

    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
    let file_subscriber = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_writer(Mutex::new(file))
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| TVError::LoggingFailed(e.to_string()))?;

    Ok(log_path)
}

/// Log levels selectable on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
