//! Sink configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use vdisplay_pump::{duration_ms, PumpError, PumpResult};

use crate::{DEFAULT_POOL_CAPACITY, DEFAULT_RESEND_INTERVAL, FRAME_CHANNEL_CAPACITY};

/// Configuration for a [`ChannelSink`](crate::ChannelSink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Forward an unchanged frame once the last forwarded frame is older
    /// than this, so consumers keep receiving a picture.
    #[serde(rename = "resend_interval_ms", with = "duration_ms")]
    pub resend_interval: Duration,

    /// Frames that may wait for the consumer before new ones are dropped.
    pub channel_capacity: usize,

    /// Returned allocations kept for reuse.
    pub pool_capacity: usize,

    /// Report the forwarded frame rate once per second.
    pub log_framerate: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            resend_interval: DEFAULT_RESEND_INTERVAL,
            channel_capacity: FRAME_CHANNEL_CAPACITY,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            log_framerate: true,
        }
    }
}

impl SinkConfig {
    /// Reject values the sink cannot deliver frames with.
    pub fn validate(&self) -> PumpResult<()> {
        if self.channel_capacity == 0 {
            return Err(PumpError::InvalidConfig(
                "channel capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SinkConfig::default();
        assert_eq!(config.resend_interval, Duration::from_secs(2));
        assert_eq!(config.channel_capacity, 3);
        assert_eq!(config.pool_capacity, 3);
    }

    #[test]
    fn test_deserialize_overrides() {
        let config: SinkConfig =
            serde_json::from_str(r#"{ "resend_interval_ms": 500, "channel_capacity": 8 }"#)
                .unwrap();
        assert_eq!(config.resend_interval, Duration::from_millis(500));
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.pool_capacity, 3);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        assert!(SinkConfig::default().validate().is_ok());

        let config: SinkConfig = serde_json::from_str(r#"{ "channel_capacity": 0 }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(PumpError::InvalidConfig(reason)) if reason.contains("channel capacity")
        ));

        let unpooled = SinkConfig {
            pool_capacity: 0,
            ..SinkConfig::default()
        };
        assert!(unpooled.validate().is_ok());
    }
}
