//! Pump configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PumpError;
use crate::types::MonitorMode;
use crate::{PumpResult, DEFAULT_WAIT_TIMEOUT};

/// Default worker thread name.
pub const DEFAULT_THREAD_NAME: &str = "swapchain-pump";

/// Configuration for a frame capture pump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Mode the staging surface is sized for.
    pub mode: MonitorMode,

    /// Upper bound of the wait for a new buffer. Only a safety poll: a
    /// signalled buffer or termination wakes the worker earlier.
    #[serde(rename = "wait_timeout_ms", with = "duration_ms")]
    pub wait_timeout: Duration,

    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            mode: MonitorMode::default(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl PumpConfig {
    /// Config for the given mode with default timing.
    pub fn with_mode(mode: MonitorMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Reject values the worker cannot run with.
    pub fn validate(&self) -> PumpResult<()> {
        if self.mode.width == 0 || self.mode.height == 0 {
            return Err(PumpError::InvalidConfig(format!(
                "mode {}x{} has a zero dimension",
                self.mode.width, self.mode.height
            )));
        }

        if self.wait_timeout.is_zero() {
            return Err(PumpError::InvalidConfig(
                "wait timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Serde helper storing a `Duration` as whole milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PumpConfig::default();
        assert_eq!(config.mode, MonitorMode::new(1920, 1080, 60));
        assert_eq!(config.wait_timeout, Duration::from_millis(16));
        assert_eq!(config.thread_name, "swapchain-pump");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = PumpConfig::with_mode(MonitorMode::new(0, 1080, 60));
        assert!(matches!(
            config.validate(),
            Err(PumpError::InvalidConfig(_))
        ));

        config.mode = MonitorMode::new(640, 480, 60);
        config.wait_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PumpConfig =
            serde_json::from_str(r#"{ "wait_timeout_ms": 33 }"#).unwrap();
        assert_eq!(config.wait_timeout, Duration::from_millis(33));
        assert_eq!(config.mode, MonitorMode::default());

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["wait_timeout_ms"], 33);
        assert_eq!(json["mode"]["width"], 1920);
    }
}
