//! DisplayPort AUX channel engine
//!
//! The chip runs AUX transactions itself; the host loads the buffer and
//! command registers, sets OP_EN and polls until the engine clears it.
//! Status errors are reported in the low nibble of AP_AUX_CTRL_STATUS.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, error};

use crate::driver::Anx7625;
use crate::hal::SlaveAddr;
use crate::regs::*;
use crate::{BestEffort, Error, Result};

impl<I2C: I2c, D: DelayNs> Anx7625<I2C, D> {
    /// Poll the AUX engine until OP_EN clears, then check its error flags
    pub fn wait_aux_op_finish(&mut self) -> Result<(), I2C::Error> {
        let mut finished = false;
        for _ in 0..self.config.aux_poll_attempts {
            self.delay.delay_ms(self.config.aux_poll_interval_ms);
            // A failed status read counts as still busy
            if let Ok(val) = self.bus.read(SlaveAddr::RxP0, AP_AUX_CTRL_STATUS) {
                if val & AP_AUX_CTRL_OP_EN == 0 {
                    finished = true;
                    break;
                }
            }
        }

        if !finished {
            error!("Timed out waiting aux operation");
            return Err(Error::AuxTimeout);
        }

        let status = self.bus.read(SlaveAddr::RxP0, AP_AUX_CTRL_STATUS)?;
        if status & AP_AUX_CTRL_ERR_MASK != 0 {
            debug!("aux status {:02x}", status);
            return Err(Error::AuxStatus(status & AP_AUX_CTRL_ERR_MASK));
        }
        Ok(())
    }

    /// One-byte native AUX write of `offset` to the current target
    pub fn aux_write(&mut self, offset: u8) -> Result<(), I2C::Error> {
        self.bus.write(SlaveAddr::RxP0, AP_AUX_BUFF_START, offset)?;
        self.bus.write(SlaveAddr::RxP0, AP_AUX_COMMAND, AUX_CMD_WRITE)?;
        self.bus.write_or(SlaveAddr::RxP0, AP_AUX_CTRL_STATUS, AP_AUX_CTRL_OP_EN)?;
        self.wait_aux_op_finish()
    }

    /// AUX read; `len_cmd` encodes the operation and length. Data lands in
    /// the AUX buffer registers.
    pub fn aux_read(&mut self, len_cmd: u8) -> Result<(), I2C::Error> {
        self.bus.write(SlaveAddr::RxP0, AP_AUX_COMMAND, len_cmd)?;
        self.bus.write_or(SlaveAddr::RxP0, AP_AUX_CTRL_STATUS, AP_AUX_CTRL_OP_EN)?;
        self.wait_aux_op_finish()
    }

    /// Pulse the AUX channel reset
    pub fn reset_aux(&mut self) -> Result<(), I2C::Error> {
        let mut seq = BestEffort::new();
        seq.step(self.bus.write_or(SlaveAddr::TxP2, RST_CTRL2, AUX_RST));
        seq.step(self.bus.write_and(SlaveAddr::TxP2, RST_CTRL2, !AUX_RST));
        seq.finish()
    }

    /// Copy the AUX data buffer out of the chip
    pub fn aux_buffer(&mut self, buf: &mut [u8]) -> Result<(), I2C::Error> {
        self.bus.read_block(SlaveAddr::RxP0, AP_AUX_BUFF_START, buf)
    }
}
