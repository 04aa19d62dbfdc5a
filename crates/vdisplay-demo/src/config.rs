//! Demo configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use vdisplay_pump::{duration_ms, AdapterLuid, PumpConfig};
use vdisplay_sink::SinkConfig;

/// Settings of one demo run, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub pump: PumpConfig,
    pub sink: SinkConfig,

    /// Adapter the session opens its device on.
    pub adapter: AdapterLuid,

    /// Buffers the synthetic producer presents.
    pub frames: u32,

    /// Delay between two presented buffers.
    #[serde(rename = "frame_interval_ms", with = "duration_ms")]
    pub frame_interval: Duration,

    /// Every n-th buffer carries dirty rectangles; the rest are unchanged.
    pub changed_every: u32,

    /// Extra bytes per staging row of the synthetic device.
    pub row_padding: usize,

    /// Also open a Direct3D 11 device on `adapter` and probe for a hardware
    /// encoder. Windows only.
    pub probe_gpu: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            pump: PumpConfig::default(),
            sink: SinkConfig::default(),
            adapter: AdapterLuid::default(),
            frames: 120,
            frame_interval: Duration::from_millis(16),
            changed_every: 4,
            row_padding: 64,
            probe_gpu: false,
        }
    }
}

impl DemoConfig {
    /// Load from `path`, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pump.validate()?;
        anyhow::ensure!(self.changed_every > 0, "changed_every must be at least 1");
        self.sink.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let config: DemoConfig = serde_json::from_str(
            r#"{
                "frames": 10,
                "frame_interval_ms": 5,
                "adapter": { "low_part": 4660, "high_part": 0 },
                "pump": { "mode": { "width": 640, "height": 480, "refresh_hz": 30 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.frames, 10);
        assert_eq!(config.frame_interval, Duration::from_millis(5));
        assert_eq!(config.adapter, AdapterLuid::new(0x1234, 0));
        assert_eq!(config.pump.mode.width, 640);
        assert_eq!(config.pump.wait_timeout, Duration::from_millis(16));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_cadence() {
        let config = DemoConfig {
            changed_every: 0,
            ..DemoConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_channel_capacity() {
        let config: DemoConfig =
            serde_json::from_str(r#"{ "sink": { "channel_capacity": 0 } }"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("channel capacity"));
    }
}
