//! MIPI-DSI input and video timing configuration
//!
//! Programs the bridge's receiver for a given [`DisplayTiming`]:
//!
//! 1. DSC off, lane 3 P/N swap, D-PHY clock control, DSI input select
//! 2. Pixel clock, lane count, H/V timing, PLL M/N, post-divider (ODFC)
//! 3. M/N ready strobe, video stable count, MIPI RX power cycle
//! 4. MIPI RX enable, mute off
//!
//! Independent register writes inside a stage are all attempted and the
//! first failure is reported afterwards.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{error, info};

use crate::driver::Anx7625;
use crate::hal::SlaveAddr;
use crate::pll::{self, PllCoefficients};
use crate::regs::*;
use crate::timing::DisplayTiming;
use crate::{BestEffort, Error, Result};

impl<I2C: I2c, D: DelayNs> Anx7625<I2C, D> {
    /// Configure the MIPI-DSI receiver and start taking video
    pub fn dsi_config(&mut self, timing: &DisplayTiming) -> Result<(), I2C::Error> {
        info!("config dsi");

        let mut seq = BestEffort::new();
        seq.step(self.bus.write_and(SlaveAddr::RxP0, R_DSC_CTRL_0, !DSC_EN));
        seq.step(self.api_dsi_config(timing));
        seq.finish().map_err(|e| {
            error!("IO error: api dsi config error");
            e
        })?;

        let mut seq = BestEffort::new();
        seq.step(self.bus.write_or(SlaveAddr::RxP0, AP_AV_STATUS, AP_MIPI_RX_EN));
        seq.step(self.bus.write_and(SlaveAddr::RxP0, AP_AV_STATUS, !AP_MIPI_MUTE));
        match seq.finish() {
            Ok(()) => {
                info!("success to config DSI");
                Ok(())
            }
            Err(e) => {
                error!("IO error: enable mipi rx failed");
                Err(e)
            }
        }
    }

    fn api_dsi_config(&mut self, timing: &DisplayTiming) -> Result<(), I2C::Error> {
        self.swap_dsi_lane3().map_err(|e| {
            error!("IO error: swap dsi lane 3 failed");
            e
        })?;

        let mut seq = BestEffort::new();
        seq.step(self.bus.write(
            SlaveAddr::RxP1,
            MIPI_PHY_CONTROL_3,
            MIPI_CLK_RT_MANUAL_PD_EN | MIPI_CLK_HS_MANUAL_PD_EN,
        ));
        seq.step(self.bus.write_or(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_18, SELECT_DSI << MIPI_DPI_SELECT));
        seq.step(self.dsi_video_config(timing));
        seq.finish().map_err(|e| {
            error!("dsi video tg config failed");
            e
        })?;

        let mut seq = BestEffort::new();
        seq.step(self.toggle_mn_ready());
        seq.step(self.bus.write(SlaveAddr::RxP1, MIPI_VIDEO_STABLE_CNT, 0x02));
        // Power cycle MIPI RX
        seq.step(self.bus.write(SlaveAddr::RxP1, MIPI_LANE_CTRL_10, 0x00));
        seq.step(self.bus.write(SlaveAddr::RxP1, MIPI_LANE_CTRL_10, 0x80));
        seq.finish().map_err(|e| {
            error!("IO error: mipi dsi enable init failed");
            e
        })
    }

    fn swap_dsi_lane3(&mut self) -> Result<(), I2C::Error> {
        let val = self.bus.read(SlaveAddr::RxP1, MIPI_SWAP).map_err(|e| {
            error!("IO error: access MIPI_SWAP");
            e
        })?;
        self.bus.write(SlaveAddr::RxP1, MIPI_SWAP, val | (1 << MIPI_SWAP_CH3))
    }

    /// Program the video timing generator and the PLL for `timing`
    pub fn dsi_video_config(&mut self, timing: &DisplayTiming) -> Result<PllCoefficients, I2C::Error> {
        let coeffs = pll::calculate(timing.pixel_clock_hz()).map_err(|e| {
            error!("cannot get property m n value");
            Error::Pll(e)
        })?;
        info!(
            "compute M({}), N({}), divider({})",
            coeffs.m, coeffs.n, coeffs.post_divider
        );

        let mut seq = BestEffort::new();

        // Pixel clock, MHz
        let mhz = (timing.pixel_clock_khz / 1000) as u16;
        seq.step(self.bus.write(SlaveAddr::RxP0, PIXEL_CLOCK_L, mhz as u8));
        seq.step(self.bus.write(SlaveAddr::RxP0, PIXEL_CLOCK_H, (mhz >> 8) as u8));

        // One lane
        seq.step(self.bus.write_and(SlaveAddr::RxP1, MIPI_LANE_CTRL_0, 0xFC));
        seq.step(self.bus.write_or(SlaveAddr::RxP1, MIPI_LANE_CTRL_0, 0x01));

        let horizontal = [
            (HORIZONTAL_TOTAL_PIXELS_L, HORIZONTAL_TOTAL_PIXELS_H, timing.htotal() as u16),
            (HORIZONTAL_ACTIVE_PIXELS_L, HORIZONTAL_ACTIVE_PIXELS_H, timing.hactive),
            (HORIZONTAL_FRONT_PORCH_L, HORIZONTAL_FRONT_PORCH_H, timing.hfront_porch),
            (HORIZONTAL_SYNC_WIDTH_L, HORIZONTAL_SYNC_WIDTH_H, timing.hsync_len),
            (HORIZONTAL_BACK_PORCH_L, HORIZONTAL_BACK_PORCH_H, timing.hback_porch),
        ];
        for (low, high, value) in horizontal {
            seq.step(self.bus.write(SlaveAddr::RxP2, low, value as u8));
            seq.step(self.bus.write(SlaveAddr::RxP2, high, (value >> 8) as u8));
        }

        seq.step(self.bus.write(SlaveAddr::RxP2, ACTIVE_LINES_L, timing.vactive as u8));
        seq.step(self.bus.write(SlaveAddr::RxP2, ACTIVE_LINES_H, (timing.vactive >> 8) as u8));
        seq.step(self.bus.write(SlaveAddr::RxP2, VERTICAL_FRONT_PORCH, timing.vfront_porch as u8));
        seq.step(self.bus.write(SlaveAddr::RxP2, VERTICAL_SYNC_WIDTH, timing.vsync_len as u8));
        seq.step(self.bus.write(SlaveAddr::RxP2, VERTICAL_BACK_PORCH, timing.vback_porch as u8));

        // M and N, MSB first
        let [_, m2, m1, m0] = coeffs.m.to_be_bytes();
        let [_, n2, n1, n0] = coeffs.n.to_be_bytes();
        for (reg, value) in [
            (MIPI_PLL_M_NUM_23_16, m2),
            (MIPI_PLL_M_NUM_15_8, m1),
            (MIPI_PLL_M_NUM_7_0, m0),
            (MIPI_PLL_N_NUM_23_16, n2),
            (MIPI_PLL_N_NUM_15_8, n1),
            (MIPI_PLL_N_NUM_7_0, n0),
        ] {
            seq.step(self.bus.write(SlaveAddr::RxP1, reg, value));
        }

        seq.step(self.bus.write(SlaveAddr::RxP1, MIPI_DIGITAL_ADJ_1, 0x37));
        seq.step(self.odfc_config(coeffs.divider_field()));

        seq.finish().map_err(|e| {
            error!("mipi dsi setup IO error");
            e
        })?;
        Ok(coeffs)
    }

    /// Reference clock, post-divider and PLL reset. `post_divider` is the
    /// register field value (divider - 1).
    pub fn odfc_config(&mut self, post_divider: u8) -> Result<(), I2C::Error> {
        let ref_clk = REF_CLK_27000KHZ << MIPI_FREF_D_IND;

        let mut seq = BestEffort::new();
        seq.step(self.bus.write_and(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_16, !ref_clk));
        seq.step(self.bus.write_or(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_16, ref_clk));

        seq.step(self.bus.write_and(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_8, 0x0F));
        seq.step(self.bus.write_or(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_8, post_divider << 4));

        // ATE MBIST patch
        seq.step(self.bus.write_and(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_7, !MIPI_PLL_VCO_TUNE_REG_VAL));

        seq.step(self.bus.write_and(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_7, !MIPI_PLL_RESET_N));
        seq.step(self.bus.write_or(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_7, MIPI_PLL_RESET_N));

        if seq.failed() {
            error!("IO error");
        }
        seq.finish()
    }

    /// Drop and raise the M/N ready strobes so the PLL samples the new
    /// values together
    pub fn toggle_mn_ready(&mut self) -> Result<(), I2C::Error> {
        let strobes = MIPI_M_NUM_READY | MIPI_N_NUM_READY;

        let mut seq = BestEffort::new();
        seq.step(self.bus.write_and(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_6, !strobes));
        self.delay.delay_ms(self.config.mn_settle_ms);
        seq.step(self.bus.write_or(SlaveAddr::RxP1, MIPI_DIGITAL_PLL_6, strobes));
        seq.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pll::PllError;
    use crate::sim::{SimChip, SimDelay};
    use crate::timing::VideoMode;

    fn driver() -> Anx7625<SimChip, SimDelay> {
        Anx7625::new(SimChip::default(), SimDelay::new())
    }

    fn hd() -> DisplayTiming {
        VideoMode::Mode1280x720.timing().unwrap()
    }

    #[test]
    fn test_video_config_registers() {
        let mut drv = driver();
        let coeffs = drv.dsi_video_config(&hd()).unwrap();
        assert_eq!(coeffs.post_divider, 8);

        let chip = drv.bus().i2c();
        assert_eq!(chip.register(RX_P0_ADDR, PIXEL_CLOCK_L), 74);
        assert_eq!(chip.register(RX_P0_ADDR, PIXEL_CLOCK_H), 0);
        assert_eq!(chip.register(RX_P1_ADDR, MIPI_LANE_CTRL_0), 0x01);

        let rx_p2 = |reg| chip.register(RX_P2_ADDR, reg);
        // 1800 total, 1280 active, 110/40/370 porches
        assert_eq!((rx_p2(HORIZONTAL_TOTAL_PIXELS_L), rx_p2(HORIZONTAL_TOTAL_PIXELS_H)), (0x08, 0x07));
        assert_eq!((rx_p2(HORIZONTAL_ACTIVE_PIXELS_L), rx_p2(HORIZONTAL_ACTIVE_PIXELS_H)), (0x00, 0x05));
        assert_eq!((rx_p2(HORIZONTAL_FRONT_PORCH_L), rx_p2(HORIZONTAL_FRONT_PORCH_H)), (110, 0));
        assert_eq!((rx_p2(HORIZONTAL_SYNC_WIDTH_L), rx_p2(HORIZONTAL_SYNC_WIDTH_H)), (40, 0));
        assert_eq!((rx_p2(HORIZONTAL_BACK_PORCH_L), rx_p2(HORIZONTAL_BACK_PORCH_H)), (0x72, 0x01));
        assert_eq!((rx_p2(ACTIVE_LINES_L), rx_p2(ACTIVE_LINES_H)), (0xD0, 0x02));
        assert_eq!(rx_p2(VERTICAL_FRONT_PORCH), 5);
        assert_eq!(rx_p2(VERTICAL_SYNC_WIDTH), 20);
        assert_eq!(rx_p2(VERTICAL_BACK_PORCH), 30);

        let rx_p1 = |reg| chip.register(RX_P1_ADDR, reg);
        // M = 0xB9C000, N = 0x087000
        assert_eq!(
            [rx_p1(MIPI_PLL_M_NUM_23_16), rx_p1(MIPI_PLL_M_NUM_15_8), rx_p1(MIPI_PLL_M_NUM_7_0)],
            [0xB9, 0xC0, 0x00]
        );
        assert_eq!(
            [rx_p1(MIPI_PLL_N_NUM_23_16), rx_p1(MIPI_PLL_N_NUM_15_8), rx_p1(MIPI_PLL_N_NUM_7_0)],
            [0x08, 0x70, 0x00]
        );
        assert_eq!(rx_p1(MIPI_DIGITAL_ADJ_1), 0x37);
        assert_eq!(rx_p1(MIPI_DIGITAL_PLL_8), 0x70);
        assert_eq!(rx_p1(MIPI_DIGITAL_PLL_16), 0x10);
        assert_eq!(rx_p1(MIPI_DIGITAL_PLL_7), MIPI_PLL_RESET_N);
    }

    #[test]
    fn test_mn_written_msb_first() {
        let mut drv = driver();
        drv.dsi_video_config(&hd()).unwrap();

        let order: Vec<u8> = drv
            .bus()
            .i2c()
            .writes_to(RX_P1_ADDR)
            .into_iter()
            .map(|(offset, _)| offset)
            .filter(|offset| (MIPI_PLL_M_NUM_23_16..=MIPI_PLL_N_NUM_7_0).contains(offset))
            .collect();
        assert_eq!(
            order,
            vec![
                MIPI_PLL_M_NUM_23_16,
                MIPI_PLL_M_NUM_15_8,
                MIPI_PLL_M_NUM_7_0,
                MIPI_PLL_N_NUM_23_16,
                MIPI_PLL_N_NUM_15_8,
                MIPI_PLL_N_NUM_7_0,
            ]
        );
    }

    #[test]
    fn test_odfc_reset_pulse() {
        let mut chip = SimChip::default();
        chip.set_register(RX_P1_ADDR, MIPI_DIGITAL_PLL_7, 0x33);
        chip.set_register(RX_P1_ADDR, MIPI_DIGITAL_PLL_8, 0xA5);
        let mut drv = Anx7625::new(chip, SimDelay::new());
        drv.odfc_config(15).unwrap();

        let chip = drv.bus().i2c();
        let pll7: Vec<u8> = chip
            .writes_to(RX_P1_ADDR)
            .into_iter()
            .filter(|&(offset, _)| offset == MIPI_DIGITAL_PLL_7)
            .map(|(_, value)| value)
            .collect();
        // VCO tune cleared, then reset low, then high
        assert_eq!(pll7, vec![0x03, 0x01, 0x03]);
        assert_eq!(chip.register(RX_P1_ADDR, MIPI_DIGITAL_PLL_8), 0xF5);
    }

    #[test]
    fn test_pll_failure_writes_no_timing() {
        let mut drv = driver();
        let timing = DisplayTiming {
            pixel_clock_khz: 900_000,
            ..hd()
        };
        assert_eq!(
            drv.dsi_video_config(&timing),
            Err(Error::Pll(PllError::ClockTooHigh(900_000_000)))
        );
        assert!(drv.bus().i2c().writes_to(RX_P2_ADDR).is_empty());
    }

    #[test]
    fn test_huge_pixel_clock_is_rejected() {
        let mut drv = driver();
        let timing = DisplayTiming {
            pixel_clock_khz: 5_000_000,
            ..hd()
        };
        assert_eq!(
            drv.dsi_video_config(&timing),
            Err(Error::Pll(PllError::ClockTooHigh(u32::MAX)))
        );
        assert!(drv.bus().i2c().writes_to(RX_P2_ADDR).is_empty());
    }

    #[test]
    fn test_mn_ready_toggle() {
        let mut drv = driver();
        drv.toggle_mn_ready().unwrap();

        let strobes: Vec<(u8, u8)> = drv
            .bus()
            .i2c()
            .writes_to(RX_P1_ADDR)
            .into_iter()
            .filter(|&(offset, _)| offset == MIPI_DIGITAL_PLL_6)
            .collect();
        assert_eq!(strobes, vec![(MIPI_DIGITAL_PLL_6, 0x00), (MIPI_DIGITAL_PLL_6, 0x18)]);
        assert_eq!(drv.delay().elapsed_ms(), 1);
    }

    #[test]
    fn test_dsi_config_full() {
        let mut chip = SimChip::default();
        chip.set_register(RX_P0_ADDR, R_DSC_CTRL_0, DSC_EN);
        chip.set_register(RX_P0_ADDR, AP_AV_STATUS, AP_MIPI_MUTE);
        let mut drv = Anx7625::new(chip, SimDelay::new());

        drv.dsi_config(&hd()).unwrap();

        let chip = drv.bus().i2c();
        assert_eq!(chip.register(RX_P0_ADDR, R_DSC_CTRL_0), 0x00);
        assert_eq!(chip.register(RX_P1_ADDR, MIPI_SWAP), 1 << MIPI_SWAP_CH3);
        assert_eq!(chip.register(RX_P1_ADDR, MIPI_PHY_CONTROL_3), 0x18);
        assert_eq!(chip.register(RX_P1_ADDR, MIPI_DIGITAL_PLL_18), 1 << MIPI_DPI_SELECT);
        assert_eq!(chip.register(RX_P1_ADDR, MIPI_VIDEO_STABLE_CNT), 0x02);
        assert_eq!(chip.register(RX_P0_ADDR, AP_AV_STATUS), AP_MIPI_RX_EN);

        let lane_ctrl: Vec<u8> = chip
            .writes_to(RX_P1_ADDR)
            .into_iter()
            .filter(|&(offset, _)| offset == MIPI_LANE_CTRL_10)
            .map(|(_, value)| value)
            .collect();
        assert_eq!(lane_ctrl, vec![0x00, 0x80]);
    }

    #[test]
    fn test_dsi_config_finishes_sequence_then_reports() {
        let mut chip = SimChip::default();
        chip.fail_register(RX_P2_ADDR, HORIZONTAL_ACTIVE_PIXELS_L);
        let mut drv = Anx7625::new(chip, SimDelay::new());

        assert!(matches!(drv.dsi_config(&hd()), Err(Error::Bus(_))));

        let chip = drv.bus().i2c();
        // Writes after the failed one still happened
        assert_eq!(chip.register(RX_P1_ADDR, MIPI_PLL_N_NUM_23_16), 0x08);
        assert_eq!(chip.register(RX_P1_ADDR, MIPI_DIGITAL_PLL_7), MIPI_PLL_RESET_N);
        // The receiver is never enabled
        assert_eq!(chip.register(RX_P0_ADDR, AP_AV_STATUS) & AP_MIPI_RX_EN, 0);
    }
}
