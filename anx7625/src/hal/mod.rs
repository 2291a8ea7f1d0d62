//! Hardware access for the ANX7625
//!
//! - Register bus over any `embedded_hal` I²C implementation
//! - Power control GPIOs

pub mod bus;
pub mod pins;

pub use bus::{RegisterBus, SlaveAddr};
pub use pins::PowerPins;
