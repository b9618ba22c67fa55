//! Station configuration
//!
//! Every hand-tuned timing constant lives here so deployments can
//! adjust pacing without a rebuild. Durations are milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and pacing configuration for the station core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Minimum spacing between transport sends (ms)
    pub min_send_interval_ms: u64,
    /// Window within which an identical inbound message is a duplicate (ms)
    pub duplicate_window_ms: u64,
    /// Consecutive malformed frames tolerated before forcing a reconnect
    pub malformed_threshold: u32,
    /// Settle time after power-on before re-initializing (ms)
    pub power_on_settle_ms: u64,
    /// Settle time after power-off before declaring the radio off (ms)
    pub power_off_settle_ms: u64,
    /// Silence on the wire treated as a dead radio (ms)
    pub liveness_timeout_ms: u64,
    /// Period of the liveness check (ms)
    pub liveness_check_ms: u64,
    /// Delay before reconnecting a closed transport (ms)
    pub reconnect_delay_ms: u64,
    /// Poll scheduler tick period (ms)
    pub poll_tick_ms: u64,
    /// Cadence at which the transport task is expected to observe and
    /// report link state (ms); the actor itself does not read this
    pub link_poll_ms: u64,
    /// Delay before sending the stacking-register frequency on band change (ms)
    pub band_freq_settle_ms: u64,
    /// Delay before re-querying state on band change (ms)
    pub band_requery_settle_ms: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            min_send_interval_ms: 50,
            duplicate_window_ms: 100,
            malformed_threshold: 5,
            power_on_settle_ms: 8000,
            power_off_settle_ms: 4000,
            liveness_timeout_ms: 3000,
            liveness_check_ms: 2000,
            reconnect_delay_ms: 2000,
            poll_tick_ms: 50,
            link_poll_ms: 100,
            band_freq_settle_ms: 200,
            band_requery_settle_ms: 400,
        }
    }
}

impl StationConfig {
    /// Minimum spacing between transport sends
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }

    /// Duplicate suppression window
    pub fn duplicate_window(&self) -> Duration {
        Duration::from_millis(self.duplicate_window_ms)
    }

    /// Power-on settle time
    pub fn power_on_settle(&self) -> Duration {
        Duration::from_millis(self.power_on_settle_ms)
    }

    /// Power-off settle time
    pub fn power_off_settle(&self) -> Duration {
        Duration::from_millis(self.power_off_settle_ms)
    }

    /// Liveness silence threshold
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    /// Liveness check period
    pub fn liveness_check(&self) -> Duration {
        Duration::from_millis(self.liveness_check_ms)
    }

    /// Reconnect delay
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Poll scheduler tick period
    pub fn poll_tick(&self) -> Duration {
        Duration::from_millis(self.poll_tick_ms)
    }

    /// Link state poll period
    pub fn link_poll(&self) -> Duration {
        Duration::from_millis(self.link_poll_ms)
    }

    /// Band-change frequency settle delay
    pub fn band_freq_settle(&self) -> Duration {
        Duration::from_millis(self.band_freq_settle_ms)
    }

    /// Band-change re-query settle delay
    pub fn band_requery_settle(&self) -> Duration {
        Duration::from_millis(self.band_requery_settle_ms)
    }
}
