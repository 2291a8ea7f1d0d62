//! Polling budgets and settle delays
//!
//! Every bounded loop in the driver takes its attempt count and interval from
//! here, so a test can run the full state machine against a recording delay.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Driver timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriverConfig {
    /// AUX status polls before giving up
    pub aux_poll_attempts: u32,
    pub aux_poll_interval_ms: u32,
    /// Flash-loaded polls per power-on attempt (OCM loading time)
    pub firmware_poll_attempts: u32,
    pub firmware_poll_interval_ms: u32,
    /// Complete power-on passes before declaring failure
    pub power_on_attempts: u32,
    /// Hot-plug polls (10,000 x 10ms = 100s)
    pub hpd_poll_attempts: u32,
    pub hpd_poll_interval_ms: u32,
    /// Tries per 16-byte EDID chunk
    pub edid_read_attempts: u32,
    /// Settle time between dropping and raising the M/N ready strobes
    pub mn_settle_ms: u32,
    /// Settle time after each power/reset pin change
    pub pin_settle_ms: u32,
    /// Wait after firmware comes up
    pub power_stable_ms: u32,
    /// VBUS discharge / powered device settle time
    pub vbus_settle_ms: u32,
}

impl DriverConfig {
    pub const DEFAULT: Self = Self {
        aux_poll_attempts: 150,
        aux_poll_interval_ms: 2,
        firmware_poll_attempts: 10,
        firmware_poll_interval_ms: 1,
        power_on_attempts: 3,
        hpd_poll_attempts: 10_000,
        hpd_poll_interval_ms: 10,
        edid_read_attempts: 3,
        mn_settle_ms: 1,
        pin_settle_ms: 10,
        power_stable_ms: 200,
        vbus_settle_ms: 1000,
    };

    /// Worst-case time spent waiting for hot plug
    pub const fn hpd_timeout_ms(&self) -> u64 {
        self.hpd_poll_attempts as u64 * self.hpd_poll_interval_ms as u64
    }

    /// Worst-case time spent on one AUX operation
    pub const fn aux_timeout_ms(&self) -> u64 {
        self.aux_poll_attempts as u64 * self.aux_poll_interval_ms as u64
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
