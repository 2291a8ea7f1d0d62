//! Power-on, firmware bring-up and hot-plug detection
//!
//! # Power-On Sequence
//!
//! ```text
//! OTG_ON high (VBUS off) ─► VIDEO_ON high ─► VIDEO_RST high
//!        │
//!        ▼
//! XTAL select ─► poll flash-loaded ─► read OCM version   (x power_on_attempts)
//!        │
//!        ▼
//! settle ─► VBUS provider? ─► OTG_ON low (VBUS on)
//! ```
//!
//! After power-on the host polls the system status register until the sink
//! raises HPD, then enables the DP side.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use log::{debug, error, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::driver::Anx7625;
use crate::hal::{PowerPins, SlaveAddr};
use crate::regs::*;
use crate::{BestEffort, Error, Result};

// ============================================================================
// TYPES
// ============================================================================

/// Driver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PowerState {
    Off,
    /// Pins driven, waiting for the OCM
    PoweringUp,
    /// OCM reported a valid firmware version
    FirmwareLoaded,
    /// Sink attached, DP side enabled
    LinkReady,
}

/// OCM firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FirmwareVersion {
    pub version: u8,
    pub revision: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ver {:02x}, rev {:02x}", self.version, self.revision)
    }
}

/// Raw system status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemStatus(pub u8);

impl SystemStatus {
    pub const fn vconn_on(self) -> bool {
        self.0 & VCONN_STATUS != 0
    }

    /// Chip sources VBUS on the USB-C connector
    pub const fn vbus_provider(self) -> bool {
        self.0 & VBUS_STATUS != 0
    }

    /// Data role is DFP (UFP otherwise)
    pub const fn data_role_dfp(self) -> bool {
        self.0 & DATA_ROLE_STATUS != 0
    }

    pub const fn hpd(self) -> bool {
        self.0 & HPD_STATUS != 0
    }

    pub const fn power_role(self) -> PowerRole {
        if self.vbus_provider() {
            PowerRole::Source
        } else {
            PowerRole::Sink
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VCONN {}, VBUS {}, data role {}, HPD {}",
            if self.vconn_on() { "on" } else { "off" },
            if self.vbus_provider() { "provider" } else { "consumer" },
            if self.data_role_dfp() { "DFP" } else { "UFP" },
            if self.hpd() { "high" } else { "low" },
        )
    }
}

/// USB-C power role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PowerRole {
    /// VBUS provider
    Source,
    /// VBUS consumer
    Sink,
}

// ============================================================================
// OPERATIONS
// ============================================================================

impl<I2C: I2c, D: DelayNs> Anx7625<I2C, D> {
    /// One power-on pass: select the crystal and wait for the OCM to report
    /// a firmware version.
    pub fn power_on_init(&mut self) -> Result<FirmwareVersion, I2C::Error> {
        self.state = PowerState::PoweringUp;

        if self.bus.write(SlaveAddr::RxP0, XTAL_FRQ_SEL, XTAL_FRQ_27M).is_err() {
            warn!("failed to select 27MHz crystal");
        }

        for _ in 0..self.config.firmware_poll_attempts {
            let val = self.bus.read(SlaveAddr::RxP0, FLASH_LOAD_STA).map_err(|e| {
                error!("Failed to load flash");
                e
            })?;
            if val & FLASH_LOAD_STA_CHK != FLASH_LOAD_STA_CHK {
                self.delay.delay_ms(self.config.firmware_poll_interval_ms);
                continue;
            }
            info!("Init interface.");

            let version = self.bus.read(SlaveAddr::RxP0, OCM_FW_VERSION);
            let revision = self.bus.read(SlaveAddr::RxP0, OCM_FW_REVERSION);
            let (Ok(version), Ok(revision)) = (version, revision) else {
                warn!("failed to read OCM version");
                self.delay.delay_ms(self.config.firmware_poll_interval_ms);
                continue;
            };
            if version == 0 && revision == 0 {
                // Loaded bit set before the version registers are valid
                self.delay.delay_ms(self.config.firmware_poll_interval_ms);
                continue;
            }

            let firmware = FirmwareVersion { version, revision };
            info!("Firmware: {}", firmware);
            self.state = PowerState::FirmwareLoaded;
            return Ok(firmware);
        }
        Err(Error::FirmwareTimeout)
    }

    /// Drive the power pins, bring the firmware up and switch VBUS on when
    /// the chip is the power provider.
    pub fn init<VON, VRST, OTG>(
        &mut self,
        pins: &mut PowerPins<VON, VRST, OTG>,
    ) -> Result<FirmwareVersion, I2C::Error>
    where
        VON: OutputPin,
        VRST: OutputPin,
        OTG: OutputPin,
    {
        info!("OTG_ON = 1 -> VBUS OFF");
        pins.vbus_off::<I2C::Error>()?;
        self.delay.delay_ms(self.config.vbus_settle_ms);

        info!("Powering on anx7625...");
        pins.power_on::<I2C::Error>()?;
        self.delay.delay_ms(self.config.pin_settle_ms);
        pins.release_reset::<I2C::Error>()?;
        self.delay.delay_ms(self.config.pin_settle_ms);

        let mut firmware = None;
        for attempt in 1..=self.config.power_on_attempts {
            match self.power_on_init() {
                Ok(version) => {
                    firmware = Some(version);
                    break;
                }
                Err(e) => warn!("power on attempt {} failed: {:?}", attempt, e),
            }
        }
        let Some(firmware) = firmware else {
            error!("Failed to power on.");
            self.state = PowerState::Off;
            return Err(Error::FirmwareTimeout);
        };

        info!("Powering on anx7625 successful.");
        self.delay.delay_ms(self.config.power_stable_ms);

        if self.is_power_provider() {
            info!("OTG_ON = 0 -> VBUS ON");
            pins.vbus_on::<I2C::Error>()?;
            self.delay.delay_ms(self.config.vbus_settle_ms);
        }
        Ok(firmware)
    }

    /// Poll for the sink's hot-plug detect and enable the DP side.
    ///
    /// The link only counts as ready once the firmware is loaded.
    pub fn wait_hpd_event(&mut self) -> Result<(), I2C::Error> {
        info!("Waiting for hdmi hot plug event...");

        for _ in 0..self.config.hpd_poll_attempts {
            self.delay.delay_ms(self.config.hpd_poll_interval_ms);
            let status = self.bus.read(SlaveAddr::RxP0, SYSTEM_STSTUS).map_err(|e| {
                error!("IO error: Failed to read HPD_STATUS register.");
                e
            })?;
            if SystemStatus(status).hpd() {
                info!("HPD event received 0x7e:0x45={:02x}", status);
                self.start_dp_work();
                if self.state == PowerState::FirmwareLoaded {
                    self.state = PowerState::LinkReady;
                } else {
                    warn!("HPD in state {:?}, link not ready", self.state);
                }
                return Ok(());
            }
        }

        error!("Timed out to detect HPD change.");
        Err(Error::HotPlugTimeout)
    }

    /// Disable HDCP, set the auth flag and the DRM interrupt. Failures are
    /// logged only.
    fn start_dp_work(&mut self) {
        let mut seq = BestEffort::new();
        seq.step(self.bus.write_and(SlaveAddr::RxP1, HDCP_CTRL, HDCP_DISABLE_MASK));
        seq.step(self.bus.write_or(SlaveAddr::RxP1, AUTH_CTRL, AUTH_FLAG));
        seq.step(self.bus.write_or(SlaveAddr::RxP1, INT_CTRL, INT_DRM));
        if seq.failed() {
            warn!("failed to enable DP work");
            return;
        }

        match self.bus.read(SlaveAddr::RxP1, SECURE_OCM_VERSION) {
            Ok(val) => info!("Secure OCM version={:02x}", val),
            Err(_) => warn!("failed to read secure OCM version"),
        }
    }

    pub fn read_system_status(&mut self) -> Result<SystemStatus, I2C::Error> {
        let status = SystemStatus(self.bus.read(SlaveAddr::RxP0, SYSTEM_STSTUS).map_err(|e| {
            error!("Failed to read system status");
            e
        })?);
        debug!("anx: - VCONN status {}", if status.vconn_on() { "ON" } else { "OFF" });
        debug!(
            "anx: - VBUS power {}",
            if status.vbus_provider() { "provider" } else { "consumer" }
        );
        debug!("anx: - Data Role: {}", if status.data_role_dfp() { "DFP" } else { "UFP" });
        debug!("anx: - DP HPD {}", if status.hpd() { "high" } else { "low" });
        Ok(status)
    }

    pub fn power_role(&mut self) -> Result<PowerRole, I2C::Error> {
        Ok(self.read_system_status()?.power_role())
    }

    /// Whether the host must provide VBUS on the connector. A failed read
    /// answers no.
    pub fn is_power_provider(&mut self) -> bool {
        self.read_system_status()
            .map(SystemStatus::vbus_provider)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimChip, SimConfig, SimDelay, SimPin};

    fn driver(config: SimConfig) -> Anx7625<SimChip, SimDelay> {
        Anx7625::new(SimChip::new(config), SimDelay::new())
    }

    fn loaded(chip: SimChip) -> Anx7625<SimChip, SimDelay> {
        let mut drv = Anx7625::new(chip, SimDelay::new());
        drv.state = PowerState::FirmwareLoaded;
        drv
    }

    fn pins() -> PowerPins<SimPin, SimPin, SimPin> {
        PowerPins::new(SimPin::new(), SimPin::new(), SimPin::new())
    }

    #[test]
    fn test_firmware_loaded_after_polls() {
        let mut drv = driver(SimConfig::default());
        let firmware = drv.power_on_init().unwrap();

        assert_eq!(firmware, FirmwareVersion { version: 0x14, revision: 0x08 });
        assert_eq!(drv.state(), PowerState::FirmwareLoaded);
        assert_eq!(drv.bus().i2c().stats().flash_polls, 4);
        assert_eq!(drv.delay().elapsed_ms(), 3);
        assert_eq!(drv.bus().i2c().register(RX_P0_ADDR, XTAL_FRQ_SEL), XTAL_FRQ_27M);
    }

    #[test]
    fn test_zero_version_keeps_polling() {
        let mut drv = driver(SimConfig {
            zero_version_reads: 2,
            ..SimConfig::default()
        });
        let firmware = drv.power_on_init().unwrap();

        assert_eq!(firmware.version, 0x14);
        let stats = drv.bus().i2c().stats();
        assert_eq!(stats.flash_polls, 6);
        assert_eq!(stats.version_reads, 3);
    }

    #[test]
    fn test_version_read_error_keeps_polling() {
        let mut chip = SimChip::default();
        chip.fail_register(RX_P0_ADDR, OCM_FW_VERSION);
        let mut drv = Anx7625::new(chip, SimDelay::new());

        assert_eq!(drv.power_on_init(), Err(Error::FirmwareTimeout));
        assert_eq!(drv.bus().i2c().stats().flash_polls, 10);
        assert_eq!(drv.delay().calls(), 10);

        drv.bus_mut().i2c_mut().clear_failures();
        assert_eq!(drv.power_on_init().unwrap().version, 0x14);
    }

    #[test]
    fn test_firmware_timeout() {
        let mut drv = driver(SimConfig {
            firmware_ready_after: 100,
            ..SimConfig::default()
        });
        assert_eq!(drv.power_on_init(), Err(Error::FirmwareTimeout));
        assert_eq!(drv.bus().i2c().stats().flash_polls, 10);
        assert_eq!(drv.state(), PowerState::PoweringUp);
    }

    #[test]
    fn test_flash_read_error_is_fatal() {
        let mut chip = SimChip::default();
        chip.fail_register(RX_P0_ADDR, FLASH_LOAD_STA);
        let mut drv = Anx7625::new(chip, SimDelay::new());
        assert!(matches!(drv.power_on_init(), Err(Error::Bus(_))));
        assert_eq!(drv.delay().calls(), 0);
    }

    #[test]
    fn test_init_provider_sequence() {
        let mut drv = driver(SimConfig::default());
        let mut pins = pins();
        drv.init(&mut pins).unwrap();

        assert!(pins.video_on.is_high());
        assert!(pins.video_rst.is_high());
        // VBUS switched off, then back on
        assert!(!pins.otg_on.is_high());
        assert_eq!(pins.otg_on.edges(), 2);
        assert_eq!(drv.state(), PowerState::FirmwareLoaded);
        assert_eq!(drv.delay().elapsed_ms(), 1000 + 10 + 10 + 3 + 200 + 1000);
    }

    #[test]
    fn test_init_consumer_leaves_vbus_off() {
        let mut drv = driver(SimConfig {
            power_provider: false,
            ..SimConfig::default()
        });
        let mut pins = pins();
        drv.init(&mut pins).unwrap();

        assert!(pins.otg_on.is_high());
        assert_eq!(pins.otg_on.edges(), 1);
    }

    #[test]
    fn test_init_retries_power_on() {
        let mut drv = driver(SimConfig {
            firmware_ready_after: 15,
            ..SimConfig::default()
        });
        drv.init(&mut pins()).unwrap();
        assert_eq!(drv.bus().i2c().stats().flash_polls, 16);
    }

    #[test]
    fn test_init_gives_up() {
        let mut drv = driver(SimConfig {
            firmware_ready_after: 1000,
            ..SimConfig::default()
        });
        let mut pins = pins();
        assert_eq!(drv.init(&mut pins), Err(Error::FirmwareTimeout));

        assert_eq!(drv.bus().i2c().stats().flash_polls, 30);
        assert_eq!(drv.state(), PowerState::Off);
        assert!(pins.otg_on.is_high());
    }

    #[test]
    fn test_hpd_detected() {
        let mut drv = loaded(SimChip::default());
        drv.wait_hpd_event().unwrap();

        assert_eq!(drv.state(), PowerState::LinkReady);
        assert_eq!(drv.bus().i2c().stats().status_reads, 3);
        assert_eq!(drv.delay().elapsed_ms(), 30);

        let chip = drv.bus().i2c();
        assert_eq!(chip.register(RX_P1_ADDR, AUTH_CTRL), AUTH_FLAG);
        assert_eq!(chip.register(RX_P1_ADDR, INT_CTRL), INT_DRM);
    }

    #[test]
    fn test_hpd_without_firmware_keeps_state() {
        let mut drv = driver(SimConfig::default());
        drv.wait_hpd_event().unwrap();
        assert_eq!(drv.state(), PowerState::Off);

        drv.power_on_init().unwrap();
        drv.wait_hpd_event().unwrap();
        assert_eq!(drv.state(), PowerState::LinkReady);
    }

    #[test]
    fn test_hpd_clears_hdcp_bits() {
        let mut chip = SimChip::default();
        chip.set_register(RX_P1_ADDR, HDCP_CTRL, 0xFF);
        let mut drv = Anx7625::new(chip, SimDelay::new());
        drv.wait_hpd_event().unwrap();
        assert_eq!(drv.bus().i2c().register(RX_P1_ADDR, HDCP_CTRL), 0x9F);
    }

    #[test]
    fn test_hpd_timeout() {
        let mut drv = driver(SimConfig {
            hpd_stuck_low: true,
            ..SimConfig::default()
        });
        assert_eq!(drv.wait_hpd_event(), Err(Error::HotPlugTimeout));
        assert_eq!(drv.bus().i2c().stats().status_reads, 10_000);
        assert_eq!(drv.delay().elapsed_ms(), 100_000);
        assert_eq!(drv.state(), PowerState::Off);
    }

    #[test]
    fn test_hpd_read_error_is_fatal() {
        let mut chip = SimChip::default();
        chip.fail_register(RX_P0_ADDR, SYSTEM_STSTUS);
        let mut drv = Anx7625::new(chip, SimDelay::new());
        assert!(matches!(drv.wait_hpd_event(), Err(Error::Bus(_))));
        assert_eq!(drv.delay().calls(), 1);
    }

    #[test]
    fn test_dp_work_failure_not_fatal() {
        let mut chip = SimChip::default();
        chip.fail_register(RX_P1_ADDR, HDCP_CTRL);
        let mut drv = loaded(chip);

        drv.wait_hpd_event().unwrap();
        assert_eq!(drv.state(), PowerState::LinkReady);
        assert_eq!(drv.bus().i2c().register(RX_P1_ADDR, AUTH_CTRL), AUTH_FLAG);
    }

    #[test]
    fn test_power_role() {
        let mut drv = driver(SimConfig::default());
        assert_eq!(drv.power_role(), Ok(PowerRole::Source));
        assert!(drv.is_power_provider());

        let mut drv = driver(SimConfig {
            power_provider: false,
            ..SimConfig::default()
        });
        assert_eq!(drv.power_role(), Ok(PowerRole::Sink));
        assert!(!drv.is_power_provider());
    }

    #[test]
    fn test_power_provider_read_error() {
        let mut chip = SimChip::default();
        chip.fail_register(RX_P0_ADDR, SYSTEM_STSTUS);
        let mut drv = Anx7625::new(chip, SimDelay::new());
        assert!(!drv.is_power_provider());
    }

    #[test]
    fn test_system_status_bits() {
        let status = SystemStatus(HPD_STATUS | DATA_ROLE_STATUS);
        assert!(status.hpd());
        assert!(status.data_role_dfp());
        assert!(!status.vconn_on());
        assert_eq!(status.power_role(), PowerRole::Sink);
    }
}
