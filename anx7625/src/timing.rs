//! Display timing
//!
//! [`DisplayTiming`] is what the configuration sequencer programs and what
//! the scan-out controller receives afterwards. It comes either from the
//! EDID's preferred detailed timing or from the table of [`VideoMode`]s.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::edid::EdidMode;

/// Video timing, pixel clock in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayTiming {
    pub pixel_clock_khz: u32,
    pub hactive: u16,
    pub hfront_porch: u16,
    pub hsync_len: u16,
    pub hback_porch: u16,
    pub vactive: u16,
    pub vfront_porch: u16,
    pub vsync_len: u16,
    pub vback_porch: u16,
    pub hsync_positive: bool,
    pub vsync_positive: bool,
}

impl DisplayTiming {
    /// Timing from an EDID detailed timing descriptor
    pub fn from_edid_mode(mode: &EdidMode) -> Self {
        Self {
            pixel_clock_khz: mode.pixel_clock_khz,
            hactive: mode.ha,
            hfront_porch: mode.hso.saturating_sub(mode.hborder),
            hsync_len: mode.hspw,
            hback_porch: mode
                .hbl
                .saturating_sub(mode.hso)
                .saturating_sub(mode.hborder)
                .saturating_sub(mode.hspw),
            vactive: mode.va,
            vfront_porch: mode.vso.saturating_sub(mode.vborder),
            vsync_len: mode.vspw,
            vback_porch: mode
                .vbl
                .saturating_sub(mode.vso)
                .saturating_sub(mode.vspw)
                .saturating_sub(mode.vborder),
            hsync_positive: mode.hsync_positive,
            vsync_positive: mode.vsync_positive,
        }
    }

    /// Pixel clock in Hz, saturating at `u32::MAX`
    pub fn pixel_clock_hz(&self) -> u32 {
        self.pixel_clock_khz.saturating_mul(1000)
    }

    pub fn htotal(&self) -> u32 {
        self.hactive as u32 + self.hfront_porch as u32 + self.hsync_len as u32 + self.hback_porch as u32
    }

    pub fn vtotal(&self) -> u32 {
        self.vactive as u32 + self.vfront_porch as u32 + self.vsync_len as u32 + self.vback_porch as u32
    }

    /// Frame rate, rounded to the nearest Hz
    pub fn refresh_hz(&self) -> u32 {
        let frame = self.htotal() as u64 * self.vtotal() as u64;
        if frame == 0 {
            return 0;
        }
        ((self.pixel_clock_khz as u64 * 1000 + frame / 2) / frame) as u32
    }
}

impl fmt::Display for DisplayTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@{}Hz pclk {} kHz h({} {} {}) v({} {} {})",
            self.hactive,
            self.vactive,
            self.refresh_hz(),
            self.pixel_clock_khz,
            self.hfront_porch,
            self.hsync_len,
            self.hback_porch,
            self.vfront_porch,
            self.vsync_len,
            self.vback_porch
        )
    }
}

// ============================================================================
// STANDARD MODES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    Mode640x480,
    Mode720x480,
    Mode800x600,
    Mode1024x768,
    Mode1280x768,
    Mode1280x720,
    /// Preferred timing from the display's EDID
    Auto,
}

impl VideoMode {
    pub const ALL: [VideoMode; 7] = [
        VideoMode::Mode640x480,
        VideoMode::Mode720x480,
        VideoMode::Mode800x600,
        VideoMode::Mode1024x768,
        VideoMode::Mode1280x768,
        VideoMode::Mode1280x720,
        VideoMode::Auto,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            VideoMode::Mode640x480 => "640x480",
            VideoMode::Mode720x480 => "720x480",
            VideoMode::Mode800x600 => "800x600",
            VideoMode::Mode1024x768 => "1024x768",
            VideoMode::Mode1280x768 => "1280x768",
            VideoMode::Mode1280x720 => "1280x720",
            VideoMode::Auto => "auto",
        }
    }

    /// Fixed timing for this mode, `None` for `Auto`
    pub const fn timing(self) -> Option<DisplayTiming> {
        let (pclk, h, v) = match self {
            VideoMode::Mode640x480 => (29_400, [640, 16, 96, 160], [480, 10, 2, 45]),
            VideoMode::Mode720x480 => (27_800, [720, 16, 62, 60], [480, 9, 6, 45]),
            VideoMode::Mode800x600 => (37_800, [800, 24, 80, 104], [600, 3, 4, 17]),
            VideoMode::Mode1024x768 => (57_800, [1024, 24, 68, 80], [768, 3, 6, 29]),
            VideoMode::Mode1280x768 => (68_300, [1280, 32, 20, 120], [768, 45, 12, 10]),
            VideoMode::Mode1280x720 => (74_300, [1280, 110, 40, 370], [720, 5, 20, 30]),
            VideoMode::Auto => return None,
        };
        Some(DisplayTiming {
            pixel_clock_khz: pclk,
            hactive: h[0],
            hfront_porch: h[1],
            hsync_len: h[2],
            hback_porch: h[3],
            vactive: v[0],
            vfront_porch: v[1],
            vsync_len: v[2],
            vback_porch: v[3],
            hsync_positive: false,
            vsync_positive: false,
        })
    }
}

impl fmt::Display for VideoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMode;

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown video mode")
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for UnknownMode {}

impl FromStr for VideoMode {
    type Err = UnknownMode;

    /// Accepts `auto`, `WxH` and `WxH@60`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let resolution = match s.split_once('@') {
            Some((res, rate)) if rate.trim_end_matches("Hz").trim_end_matches("hz") == "60" => res,
            Some(_) => return Err(UnknownMode),
            None => s,
        };
        VideoMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.name().eq_ignore_ascii_case(resolution))
            .ok_or(UnknownMode)
    }
}

// ============================================================================
// SCAN-OUT CLOCK
// ============================================================================

/// Pixel clock the scan-out controller's PLL will really produce.
///
/// Its PLL runs from a 1 MHz reference in 100 kHz steps, or 200 kHz steps
/// once the multiplier would exceed 512.
pub fn ltdc_pixel_clock(pixel_clock_khz: u32) -> u32 {
    let step = if pixel_clock_khz / 100 > 512 { 200 } else { 100 };
    (pixel_clock_khz / step) * step
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MODE_720P;

    #[test]
    fn test_from_edid_mode() {
        let timing = DisplayTiming::from_edid_mode(&MODE_720P);
        assert_eq!(timing.hfront_porch, 110);
        assert_eq!(timing.hsync_len, 40);
        assert_eq!(timing.hback_porch, 220);
        assert_eq!(timing.vfront_porch, 5);
        assert_eq!(timing.vsync_len, 5);
        assert_eq!(timing.vback_porch, 20);
        assert_eq!(timing.htotal(), 1650);
        assert_eq!(timing.vtotal(), 750);
        assert_eq!(timing.refresh_hz(), 60);
        assert!(timing.hsync_positive && timing.vsync_positive);
    }

    #[test]
    fn test_borders_subtracted() {
        let mode = EdidMode {
            hborder: 8,
            vborder: 2,
            ..MODE_720P
        };
        let timing = DisplayTiming::from_edid_mode(&mode);
        assert_eq!(timing.hfront_porch, 102);
        assert_eq!(timing.hback_porch, 212);
        assert_eq!(timing.vfront_porch, 3);
        assert_eq!(timing.vback_porch, 18);
    }

    #[test]
    fn test_mode_table() {
        let vga = VideoMode::Mode640x480.timing().unwrap();
        assert_eq!(vga.htotal(), 912);
        assert_eq!(vga.vtotal(), 537);
        assert_eq!(vga.refresh_hz(), 60);

        let hd = VideoMode::Mode1280x720.timing().unwrap();
        assert_eq!(hd.pixel_clock_hz(), 74_300_000);
        assert_eq!(VideoMode::Auto.timing(), None);
    }

    #[test]
    fn test_pixel_clock_saturates() {
        let timing = DisplayTiming {
            pixel_clock_khz: 5_000_000,
            ..DisplayTiming::default()
        };
        assert_eq!(timing.pixel_clock_hz(), u32::MAX);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("1280x720".parse::<VideoMode>(), Ok(VideoMode::Mode1280x720));
        assert_eq!("1024x768@60Hz".parse::<VideoMode>(), Ok(VideoMode::Mode1024x768));
        assert_eq!("AUTO".parse::<VideoMode>(), Ok(VideoMode::Auto));
        assert_eq!("1920x1080".parse::<VideoMode>(), Err(UnknownMode));
        assert_eq!("640x480@75".parse::<VideoMode>(), Err(UnknownMode));
        for mode in VideoMode::ALL {
            assert_eq!(mode.name().parse::<VideoMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_ltdc_snapping() {
        assert_eq!(ltdc_pixel_clock(29_450), 29_400);
        assert_eq!(ltdc_pixel_clock(51_200), 51_200);
        assert_eq!(ltdc_pixel_clock(51_300), 51_200);
        assert_eq!(ltdc_pixel_clock(74_300), 74_200);
        assert_eq!(ltdc_pixel_clock(74_250), 74_200);
    }
}
