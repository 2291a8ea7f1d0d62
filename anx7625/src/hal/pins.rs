//! Power control GPIOs
//!
//! | Signal    | Function                                        |
//! |-----------|-------------------------------------------------|
//! | VIDEO_ON  | Bridge power enable                             |
//! | VIDEO_RST | Bridge reset (active low, high releases reset)  |
//! | OTG_ON    | USB-C VBUS switch (high = VBUS off)             |

use embedded_hal::digital::OutputPin;

use crate::{Error, Result};

/// The three control outputs of the bridge
pub struct PowerPins<VON, VRST, OTG> {
    pub video_on: VON,
    pub video_rst: VRST,
    pub otg_on: OTG,
}

impl<VON, VRST, OTG> PowerPins<VON, VRST, OTG>
where
    VON: OutputPin,
    VRST: OutputPin,
    OTG: OutputPin,
{
    pub const fn new(video_on: VON, video_rst: VRST, otg_on: OTG) -> Self {
        Self {
            video_on,
            video_rst,
            otg_on,
        }
    }

    pub fn release(self) -> (VON, VRST, OTG) {
        (self.video_on, self.video_rst, self.otg_on)
    }

    pub fn power_on<E>(&mut self) -> Result<(), E> {
        self.video_on.set_high().map_err(|_| Error::Gpio)
    }

    pub fn release_reset<E>(&mut self) -> Result<(), E> {
        self.video_rst.set_high().map_err(|_| Error::Gpio)
    }

    /// OTG_ON high switches VBUS off
    pub fn vbus_off<E>(&mut self) -> Result<(), E> {
        self.otg_on.set_high().map_err(|_| Error::Gpio)
    }

    pub fn vbus_on<E>(&mut self) -> Result<(), E> {
        self.otg_on.set_low().map_err(|_| Error::Gpio)
    }
}
