//! Shared helpers for pump and session integration tests.

#![allow(dead_code)]

use std::time::Duration;

use vdisplay_pump::{MonitorMode, PumpConfig};

/// Upper bound for anything a test waits on.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Ten pixels wide, so packed rows are 40 bytes.
pub const MODE: MonitorMode = MonitorMode::new(10, 6, 60);

/// Extra bytes per staging row, giving a 64 byte pitch.
pub const ROW_PADDING: usize = 24;

/// Small mode with a short poll so tests do not idle.
pub fn test_config() -> PumpConfig {
    PumpConfig {
        mode: MODE,
        wait_timeout: Duration::from_millis(5),
        thread_name: "test-pump".to_string(),
    }
}
