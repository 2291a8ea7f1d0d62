//! # Analogix ANX7625 MIPI-DSI to DisplayPort Bridge
//!
//! Control-plane driver for the ANX7625: brings the chip out of reset, waits
//! for its on-chip firmware (OCM), reads the attached display's EDID over the
//! DisplayPort AUX channel, solves the fractional PLL for the requested pixel
//! clock and programs the internal video timing generator so that an incoming
//! MIPI-DSI stream is re-serialized onto the DP/eDP link.
//!
//! # Architecture
//!
//! ```text
//!                 Anx7625 (driver facade)
//!                          │
//!        ┌─────────────────┼──────────────────┐
//!        ▼                 ▼                  ▼
//! ┌─────────────┐   ┌─────────────┐    ┌─────────────┐
//! │ Power / HPD │   │    EDID     │    │ DSI config  │◄── PLL solver
//! │   (power)   │   │   (edid)    │    │   (dsi)     │    (pll, pure)
//! └──────┬──────┘   └──────┬──────┘    └──────┬──────┘
//!        │                 ▼                  │
//!        │          ┌─────────────┐           │
//!        │          │ AUX engine  │           │
//!        │          │   (aux)     │           │
//!        │          └──────┬──────┘           │
//!        └────────┬────────┴──────────────────┘
//!                 ▼
//!          ┌─────────────┐
//!          │ RegisterBus │  address-switch workaround
//!          │  (hal::bus) │
//!          └──────┬──────┘
//!                 ▼
//!        embedded_hal::i2c::I2c
//! ```
//!
//! # Hardware Interfaces
//!
//! - I²C bus: any [`embedded_hal::i2c::I2c`] implementation
//! - Delays: any [`embedded_hal::delay::DelayNs`] implementation
//! - GPIO: video enable, video reset and OTG/VBUS control as
//!   [`embedded_hal::digital::OutputPin`]s
//!
//! The driver is single-threaded and blocking. Every polling loop is bounded
//! by the budgets in [`DriverConfig`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![allow(clippy::new_without_default)]

pub mod aux;
pub mod config;
pub mod driver;
pub mod dsi;
pub mod edid;
pub mod hal;
pub mod pll;
pub mod power;
pub mod regs;
pub mod timing;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

// Re-exports
pub use config::DriverConfig;
pub use driver::Anx7625;
pub use edid::{Edid, EdidError, EdidMode};
pub use hal::{PowerPins, RegisterBus, SlaveAddr};
pub use pll::{PllCoefficients, PllError};
pub use power::{FirmwareVersion, PowerRole, PowerState, SystemStatus};
pub use timing::{DisplayTiming, VideoMode};

// ============================================================================
// ERRORS
// ============================================================================

/// Driver errors, generic over the I²C bus error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// I²C transaction failed
    Bus(E),
    /// A control GPIO could not be driven
    Gpio,
    /// AUX operation-enable bit never cleared
    AuxTimeout,
    /// AUX completed with error flags set (low nibble of the status register)
    AuxStatus(u8),
    /// OCM firmware never reported loaded with a valid version
    FirmwareTimeout,
    /// Hot-plug detect never asserted
    HotPlugTimeout,
    /// Pixel clock cannot be generated by the MIPI PLL
    Pll(PllError),
    /// EDID could not be decoded
    Edid(EdidError),
    /// EDID chunk could not be read after all retries
    EdidUnavailable,
}

impl<E> From<PllError> for Error<E> {
    fn from(err: PllError) -> Self {
        Error::Pll(err)
    }
}

impl<E> From<EdidError> for Error<E> {
    fn from(err: EdidError) -> Self {
        Error::Edid(err)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "i2c bus error: {:?}", e),
            Error::Gpio => write!(f, "failed to drive control gpio"),
            Error::AuxTimeout => write!(f, "timed out waiting for aux operation"),
            Error::AuxStatus(status) => write!(f, "aux operation failed, status {:#04x}", status),
            Error::FirmwareTimeout => write!(f, "ocm firmware did not load"),
            Error::HotPlugTimeout => write!(f, "timed out waiting for hot plug"),
            Error::Pll(e) => write!(f, "{}", e),
            Error::Edid(e) => write!(f, "{}", e),
            Error::EdidUnavailable => write!(f, "edid read failed after retries"),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl<E: core::fmt::Debug> std::error::Error for Error<E> {}

/// Result type for driver operations
pub type Result<T, E> = core::result::Result<T, Error<E>>;

// ============================================================================
// BEST-EFFORT SEQUENCES
// ============================================================================

/// Runs a register sequence to the end and keeps the first failure.
///
/// Used for sequences whose writes do not depend on each other: every write
/// is still attempted, but the caller learns that the sequence failed.
pub(crate) struct BestEffort<E> {
    first: Option<Error<E>>,
}

impl<E> BestEffort<E> {
    pub(crate) const fn new() -> Self {
        Self { first: None }
    }

    /// Record one step, returning its value on success
    pub(crate) fn step<T>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if self.first.is_none() {
                    self.first = Some(err);
                }
                None
            }
        }
    }

    pub(crate) fn failed(&self) -> bool {
        self.first.is_some()
    }

    pub(crate) fn finish(self) -> Result<(), E> {
        match self.first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
