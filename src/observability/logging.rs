//! Structured logging.
//!
//! # Responsibilities
//! - Resolve `<prefix>-level` and `<prefix>-format` into process-wide logging state
//! - Pick a human renderer for terminals and JSON lines otherwise
//! - Reload the minimum severity on later runs
//!
//! # Design Decisions
//! - Uses the tracing crate with a reloadable level filter
//! - The subscriber is installed once; its format is fixed at that point
//! - Both inputs are validated before anything global changes

use is_terminal::IsTerminal;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, Layer, Registry};

use crate::config::surface::{default_if_empty, DEFAULT_LOG_PREFIX};
use crate::error::{Error, Result};
use crate::lifecycle::{Hook, Invocation};

/// Accepted verbosity names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl LogLevel {
    /// Minimum severity enforced for this level. `tracing` has nothing above
    /// ERROR, so fatal and panic share it.
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal | LogLevel::Panic => LevelFilter::ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
            LogLevel::Panic => "panic",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            "panic" => Ok(LogLevel::Panic),
            _ => Err(Error::UnrecognizedLevel(s.to_string())),
        }
    }
}

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Auto,
    Human,
    Json,
}

impl LogFormat {
    /// Whether to render for humans, given whether stdout is a terminal.
    pub fn renders_human(self, stdout_is_terminal: bool) -> bool {
        match self {
            LogFormat::Human => true,
            LogFormat::Json => false,
            LogFormat::Auto => stdout_is_terminal,
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(LogFormat::Auto),
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            _ => Err(Error::UnrecognizedFormat(s.to_string())),
        }
    }
}

type FilterHandle = reload::Handle<LevelFilter, Registry>;
type Filtered = Layered<reload::Layer<LevelFilter, Registry>, Registry>;

struct LogRuntime {
    filter: FilterHandle,
    human: bool,
    level: LevelFilter,
}

static RUNTIME: Mutex<Option<LogRuntime>> = Mutex::new(None);

fn format_layer(human: bool) -> Box<dyn Layer<Filtered> + Send + Sync> {
    if human {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(true)
            .compact()
            .boxed()
    } else {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    }
}

/// Install the global subscriber, or reload the level of the one already
/// installed by an earlier call.
pub fn apply(level: LevelFilter, human: bool) -> Result<()> {
    let mut runtime = RUNTIME.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(existing) = runtime.as_mut() {
        existing
            .filter
            .reload(level)
            .map_err(|err| Error::LoggerInstall(err.to_string()))?;
        existing.level = level;
        if existing.human != human {
            tracing::warn!(
                requested = if human { "human" } else { "json" },
                "log format is fixed once installed; keeping the current format"
            );
        }
        return Ok(());
    }

    let (filter, handle) = reload::Layer::new(level);
    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(human))
        .try_init()
        .map_err(|err| Error::LoggerInstall(err.to_string()))?;

    *runtime = Some(LogRuntime {
        filter: handle,
        human,
        level,
    });
    Ok(())
}

/// The configured minimum severity, if logging has been configured.
pub fn current_level() -> Option<LevelFilter> {
    RUNTIME
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|runtime| runtime.level)
}

/// Hook applying the `<prefix>-level` and `<prefix>-format` options.
#[derive(Debug, Clone)]
pub struct LoggingHook {
    prefix: String,
    announce: Level,
}

impl LoggingHook {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: default_if_empty(prefix, DEFAULT_LOG_PREFIX).to_string(),
            announce: Level::INFO,
        }
    }

    /// Severity of the event recording the new level.
    pub fn announce_at(mut self, level: Level) -> Self {
        self.announce = level;
        self
    }
}

impl Hook for LoggingHook {
    fn run(&self, invocation: &mut Invocation) -> Result<()> {
        if invocation.is_builtin() {
            return Ok(());
        }

        let flags = invocation.flags();
        let format: LogFormat = flags.get_string(&format!("{}-format", self.prefix))?.parse()?;
        let level: LogLevel = flags.get_string(&format!("{}-level", self.prefix))?.parse()?;

        apply(level.filter(), format.renders_human(std::io::stdout().is_terminal()))?;

        let new_level = level.as_str();
        match self.announce {
            Level::TRACE => tracing::trace!(new_level, "set log level"),
            Level::DEBUG => tracing::debug!(new_level, "set log level"),
            Level::INFO => tracing::info!(new_level, "set log level"),
            Level::WARN => tracing::warn!(new_level, "set log level"),
            _ => tracing::error!(new_level, "set log level"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("trace".parse::<LogLevel>().unwrap().filter(), LevelFilter::TRACE);
        assert_eq!("panic".parse::<LogLevel>().unwrap().filter(), LevelFilter::ERROR);
        assert!(matches!(
            "bogus".parse::<LogLevel>(),
            Err(Error::UnrecognizedLevel(ref s)) if s == "bogus"
        ));
    }

    #[test]
    fn format_selection() {
        assert!(LogFormat::Human.renders_human(false));
        assert!(!LogFormat::Json.renders_human(true));
        assert!(LogFormat::Auto.renders_human(true));
        assert!(!LogFormat::Auto.renders_human(false));
        assert!(matches!("xml".parse::<LogFormat>(), Err(Error::UnrecognizedFormat(_))));
    }
}
