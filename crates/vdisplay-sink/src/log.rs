//! Host logging categories.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, error, info, trace, warn, Level};

/// Category of a host log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Debug,
    Info,
    Warn,
    Error,
    /// Forwarded frames per second.
    Framerate,
    /// Elapsed-time measurements.
    TimePassed,
}

/// Unknown log category name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown log kind: {0}")]
pub struct ParseLogKindError(pub String);

impl LogKind {
    pub const ALL: [LogKind; 6] = [
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Framerate,
        Self::TimePassed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Framerate => "framerate",
            Self::TimePassed => "timepassed",
        }
    }

    /// Level messages of this kind are emitted at.
    pub fn level(&self) -> Level {
        match self {
            Self::Debug | Self::Framerate => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error => Level::ERROR,
            Self::TimePassed => Level::TRACE,
        }
    }

    /// Whether the active subscriber records this kind. Callable from any
    /// thread.
    pub fn enabled(&self) -> bool {
        match self {
            Self::Debug => tracing::enabled!(target: "vdisplay::host", Level::DEBUG),
            Self::Info => tracing::enabled!(target: "vdisplay::host", Level::INFO),
            Self::Warn => tracing::enabled!(target: "vdisplay::host", Level::WARN),
            Self::Error => tracing::enabled!(target: "vdisplay::host", Level::ERROR),
            Self::Framerate => tracing::enabled!(target: "vdisplay::framerate", Level::DEBUG),
            Self::TimePassed => tracing::enabled!(target: "vdisplay::timepassed", Level::TRACE),
        }
    }

    /// Record a host message under this kind.
    pub fn emit(&self, message: &str) {
        match self {
            Self::Debug => debug!(target: "vdisplay::host", "{}", message),
            Self::Info => info!(target: "vdisplay::host", "{}", message),
            Self::Warn => warn!(target: "vdisplay::host", "{}", message),
            Self::Error => error!(target: "vdisplay::host", "{}", message),
            Self::Framerate => debug!(target: "vdisplay::framerate", "{}", message),
            Self::TimePassed => trace!(target: "vdisplay::timepassed", "{}", message),
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = ParseLogKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ParseLogKindError(name.to_string()))
    }
}
