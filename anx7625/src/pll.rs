//! MIPI PLL coefficient solver
//!
//! The bridge regenerates the pixel clock from its 27 MHz crystal with a
//! fractional PLL followed by an integer post-divider:
//!
//! ```text
//! pixel_clock = XTAL * M / N / post_divider
//! ```
//!
//! M and N are 24-bit register fields. The solver picks a post-divider that
//! puts the PLL output in range, reduces M/N and then scales both up as far
//! as the field width allows for the best fractional precision.
//!
//! Pure computation, no hardware access.

use core::fmt;

use log::error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// PLL LIMITS
// ============================================================================

/// Reference crystal
pub const XTAL_FRQ: u64 = 27_000_000;

/// Preferred PLL output range
pub const PLL_OUT_FREQ_MIN: u64 = 520_000_000;
pub const PLL_OUT_FREQ_MAX: u64 = 730_000_000;

/// Absolute PLL output range
pub const PLL_OUT_FREQ_ABS_MIN: u64 = 300_000_000;
pub const PLL_OUT_FREQ_ABS_MAX: u64 = 800_000_000;

pub const POST_DIVIDER_MIN: u64 = 1;
pub const POST_DIVIDER_MAX: u64 = 16;

/// M and N register field limit
pub const MAX_UNSIGNED_24BIT: u64 = 0xFF_FFFF;

/// Highest pixel clock the PLL can produce
pub const PIXEL_CLOCK_MAX: u64 = PLL_OUT_FREQ_ABS_MAX / POST_DIVIDER_MIN;
/// Lowest pixel clock the PLL can produce
pub const PIXEL_CLOCK_MIN: u64 = PLL_OUT_FREQ_ABS_MIN / POST_DIVIDER_MAX;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PllError {
    /// Pixel clock above what the PLL can generate
    ClockTooHigh(u32),
    /// Pixel clock below what the PLL can generate
    ClockTooLow(u32),
    /// No post-divider brings the PLL output into range
    NoPostDivider(u32),
    /// Chosen divider pushes the PLL output over the absolute maximum
    OutputTooHigh(u64),
}

impl fmt::Display for PllError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PllError::ClockTooHigh(hz) => {
                write!(f, "pixel clock {} Hz higher than {} Hz", hz, PIXEL_CLOCK_MAX)
            }
            PllError::ClockTooLow(hz) => {
                write!(f, "pixel clock {} Hz lower than {} Hz", hz, PIXEL_CLOCK_MIN)
            }
            PllError::NoPostDivider(hz) => write!(f, "no post divider for {} Hz", hz),
            PllError::OutputTooHigh(hz) => {
                write!(f, "pll output {} Hz above maximum {} Hz", hz, PLL_OUT_FREQ_ABS_MAX)
            }
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for PllError {}

/// Solved PLL settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PllCoefficients {
    pub m: u32,
    pub n: u32,
    /// Divider value, 1..=16 (the register takes `post_divider - 1`)
    pub post_divider: u8,
}

impl PllCoefficients {
    /// Pixel clock these coefficients actually generate
    pub fn pixel_clock_hz(&self) -> u64 {
        self.pll_output_hz() / self.post_divider as u64
    }

    /// Fractional PLL output before the post-divider
    pub fn pll_output_hz(&self) -> u64 {
        if self.n == 0 {
            return 0;
        }
        XTAL_FRQ * self.m as u64 / self.n as u64
    }

    /// Value for the post-divider register field
    pub fn divider_field(&self) -> u8 {
        self.post_divider - 1
    }
}

// ============================================================================
// SOLVER
// ============================================================================

/// Solve M, N and the post-divider for `pixel_clock` (Hz)
pub fn calculate(pixel_clock: u32) -> Result<PllCoefficients, PllError> {
    let clock = pixel_clock as u64;

    if clock > PIXEL_CLOCK_MAX {
        error!("pixelclock {} higher than {}, output may be unstable", clock, PIXEL_CLOCK_MAX);
        return Err(PllError::ClockTooHigh(pixel_clock));
    }
    if clock < PIXEL_CLOCK_MIN {
        error!("pixelclock {} lower than {}, output may be unstable", clock, PIXEL_CLOCK_MIN);
        return Err(PllError::ClockTooLow(pixel_clock));
    }

    let mut post_divider = smallest_divider(clock, PLL_OUT_FREQ_MIN);
    if post_divider > POST_DIVIDER_MAX {
        post_divider = smallest_divider(clock, PLL_OUT_FREQ_ABS_MIN);
        if post_divider > POST_DIVIDER_MAX {
            error!("cannot find property post_divider({})", post_divider);
            return Err(PllError::NoPostDivider(pixel_clock));
        }
    }

    // 27 MHz is not divisible by 7, 11, 13 or 14
    post_divider = match post_divider {
        7 => 8,
        11 => 12,
        13 | 14 => 15,
        pd => pd,
    };

    let output = clock * post_divider;
    if output > PLL_OUT_FREQ_ABS_MAX {
        error!("act clock({}) large than maximum({})", output, PLL_OUT_FREQ_ABS_MAX);
        return Err(PllError::OutputTooHigh(output));
    }

    let (m, n) = reduce_fraction(clock, XTAL_FRQ / post_divider);
    Ok(PllCoefficients {
        m: m as u32,
        n: n as u32,
        post_divider: post_divider as u8,
    })
}

/// Smallest divider with `clock >= bound / divider`
fn smallest_divider(clock: u64, bound: u64) -> u64 {
    let mut divider = POST_DIVIDER_MIN;
    while clock < bound / divider {
        divider += 1;
    }
    divider
}

/// Greatest common divisor by repeated subtraction
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    if a == 0 {
        return b;
    }
    while b != 0 {
        if a > b {
            a -= b;
        } else {
            b -= a;
        }
    }
    a
}

/// Reduce `a/b`, fit both into 24 bits, then scale up for precision
pub fn reduce_fraction(a: u64, b: u64) -> (u64, u64) {
    let (a, b) = fit_24bit(a, b);
    maximize_precision(a, b)
}

/// Divide by the gcd, then by the smallest denominator that fits both
/// values into 24 bits. Each try divides the reduced values afresh.
pub(crate) fn fit_24bit(a: u64, b: u64) -> (u64, u64) {
    let divisor = gcd(a, b).max(1);
    let (old_a, old_b) = (a / divisor, b / divisor);

    let (mut a, mut b) = (old_a, old_b);
    let mut denom = 1;
    while a > MAX_UNSIGNED_24BIT || b > MAX_UNSIGNED_24BIT {
        denom += 1;
        a = old_a / denom;
        b = old_b / denom;
    }
    (a, b)
}

/// Double both terms while both stay below the field limit
pub(crate) fn maximize_precision(mut a: u64, mut b: u64) -> (u64, u64) {
    if a == 0 || b == 0 {
        return (a, b);
    }
    while (a << 1) < MAX_UNSIGNED_24BIT && (b << 1) < MAX_UNSIGNED_24BIT {
        a <<= 1;
        b <<= 1;
    }
    (a, b)
}
