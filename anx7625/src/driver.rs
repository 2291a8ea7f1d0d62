//! ANX7625 driver facade
//!
//! Owns the register bus, the delay source and the power/link state. The
//! protocol layers add their operations to [`Anx7625`] in their own modules:
//!
//! | Module  | Operations                                             |
//! |---------|--------------------------------------------------------|
//! | `aux`   | AUX write/read, completion wait, channel reset         |
//! | `edid`  | Block count, chunk and segment reads, full EDID        |
//! | `dsi`   | MIPI-DSI and video timing configuration                |
//! | `power` | Power-on, firmware wait, hot plug, system status       |

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use log::{error, info};

use crate::config::DriverConfig;
use crate::edid::Edid;
use crate::hal::{PowerPins, RegisterBus};
use crate::power::PowerState;
use crate::timing::{ltdc_pixel_clock, DisplayTiming, VideoMode};
use crate::Result;

pub struct Anx7625<I2C, D> {
    pub(crate) bus: RegisterBus<I2C>,
    pub(crate) delay: D,
    pub(crate) config: DriverConfig,
    pub(crate) state: PowerState,
}

impl<I2C: I2c, D: DelayNs> Anx7625<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_config(i2c, delay, DriverConfig::default())
    }

    pub fn with_config(i2c: I2C, delay: D, config: DriverConfig) -> Self {
        Self {
            bus: RegisterBus::new(i2c),
            delay,
            config,
            state: PowerState::Off,
        }
    }

    /// Give the bus and delay back
    pub fn release(self) -> (I2C, D) {
        (self.bus.release(), self.delay)
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn bus(&self) -> &RegisterBus<I2C> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut RegisterBus<I2C> {
        &mut self.bus
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Configure the bridge for `mode` and return the timing the scan-out
    /// controller must use.
    ///
    /// `VideoMode::Auto` takes the EDID's preferred timing. The pixel clock
    /// is snapped to the scan-out PLL step before the bridge is programmed,
    /// so both sides run from the same clock.
    pub fn dp_start(&mut self, edid: &Edid, mode: VideoMode) -> Result<DisplayTiming, I2C::Error> {
        let mut timing = match mode.timing() {
            Some(timing) => timing,
            None => edid.preferred_timing()?,
        };
        timing.pixel_clock_khz = ltdc_pixel_clock(timing.pixel_clock_khz);

        match self.dsi_config(&timing) {
            Ok(()) => info!("MIPI phy setup OK"),
            Err(e) => {
                error!("MIPI phy setup error");
                return Err(e);
            }
        }
        Ok(timing)
    }

    /// Full bring-up: power on, wait for a display, read its EDID and start
    /// video in `mode`.
    pub fn bring_up<VON, VRST, OTG>(
        &mut self,
        pins: &mut PowerPins<VON, VRST, OTG>,
        mode: VideoMode,
    ) -> Result<(Edid, DisplayTiming), I2C::Error>
    where
        VON: OutputPin,
        VRST: OutputPin,
        OTG: OutputPin,
    {
        self.init(pins)?;
        self.wait_hpd_event()?;
        let edid = self.dp_get_edid()?;
        let timing = self.dp_start(&edid, mode)?;
        Ok((edid, timing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edid::{decode, EdidError};
    use crate::regs::*;
    use crate::sim::{sample_edid, SimChip, SimConfig, SimDelay, SimPin};
    use crate::Error;

    fn pins() -> PowerPins<SimPin, SimPin, SimPin> {
        PowerPins::new(SimPin::new(), SimPin::new(), SimPin::new())
    }

    fn sample() -> Edid {
        decode(&sample_edid(0)).unwrap()
    }

    #[test]
    fn test_bring_up_auto() {
        let mut drv = Anx7625::new(SimChip::default(), SimDelay::new());
        let (edid, timing) = drv.bring_up(&mut pins(), VideoMode::Auto).unwrap();

        assert_eq!(edid.manufacturer(), "ANX");
        assert_eq!(edid.name(), Some("ANX SIM"));
        assert_eq!((timing.hactive, timing.vactive), (1280, 720));
        // 74.25 MHz snapped to the scan-out step
        assert_eq!(timing.pixel_clock_khz, 74_200);
        assert_eq!(drv.state(), PowerState::LinkReady);

        let chip = drv.bus().i2c();
        assert_eq!(chip.register(RX_P0_ADDR, PIXEL_CLOCK_L), 74);
        assert_ne!(chip.register(RX_P0_ADDR, AP_AV_STATUS) & AP_MIPI_RX_EN, 0);
    }

    #[test]
    fn test_bring_up_without_display() {
        let config = SimConfig {
            hpd_stuck_low: true,
            ..SimConfig::default()
        };
        let mut drv = Anx7625::new(SimChip::new(config), SimDelay::new());

        assert_eq!(
            drv.bring_up(&mut pins(), VideoMode::Auto),
            Err(Error::HotPlugTimeout)
        );
        assert_eq!(drv.bus().i2c().stats().chunk_reads, 0);
        assert_eq!(drv.state(), PowerState::FirmwareLoaded);
    }

    #[test]
    fn test_dp_start_fixed_mode() {
        let mut drv = Anx7625::new(SimChip::default(), SimDelay::new());
        let timing = drv.dp_start(&sample(), VideoMode::Mode1024x768).unwrap();

        assert_eq!((timing.hactive, timing.vactive), (1024, 768));
        // 57.8 MHz needs the 200 kHz step
        assert_eq!(timing.pixel_clock_khz, 57_800);
        assert_eq!(
            drv.bus().i2c().register(RX_P2_ADDR, HORIZONTAL_ACTIVE_PIXELS_H),
            0x04
        );
    }

    #[test]
    fn test_dp_start_snaps_before_programming() {
        let mut drv = Anx7625::new(SimChip::default(), SimDelay::new());
        let timing = drv.dp_start(&sample(), VideoMode::Mode1280x720).unwrap();
        assert_eq!(timing.pixel_clock_khz, 74_200);
        assert_eq!(drv.bus().i2c().register(RX_P0_ADDR, PIXEL_CLOCK_L), 74);
    }

    #[test]
    fn test_dp_start_auto_needs_preferred_timing() {
        let mut edid = sample();
        edid.preferred = None;
        let mut drv = Anx7625::new(SimChip::default(), SimDelay::new());

        assert_eq!(
            drv.dp_start(&edid, VideoMode::Auto),
            Err(Error::Edid(EdidError::NotConformant))
        );
        assert!(drv.bus().i2c().log().is_empty());
    }

    #[test]
    fn test_release_returns_bus() {
        let mut drv = Anx7625::new(SimChip::default(), SimDelay::new());
        drv.wait_hpd_event().unwrap();
        let (chip, delay) = drv.release();
        assert_eq!(chip.stats().status_reads, 3);
        assert_eq!(delay.elapsed_ms(), 30);
    }
}
