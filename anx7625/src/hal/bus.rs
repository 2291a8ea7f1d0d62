//! ANX7625 register bus
//!
//! Byte-wide register access to the chip's logical sub-devices.
//!
//! # Address-Switch Workaround
//!
//! The host CPU and the chip's on-chip firmware (OCM) race on the I²C slave
//! interface. Whenever the host moves to a different sub-device it first
//! writes zero to a reserved offset of that sub-device. The write is issued
//! once per address change, never per access.

use embedded_hal::i2c::I2c;
use log::{error, warn};

use crate::regs;
use crate::{Error, Result};

/// Logical sub-devices of the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveAddr {
    /// Type-C port controller interface
    Tcpc,
    TxP0,
    TxP1,
    TxP2,
    /// OCM, AUX engine and AV status
    RxP0,
    /// MIPI PHY and PLL
    RxP1,
    /// Video timing generator
    RxP2,
}

impl SlaveAddr {
    pub const ALL: [SlaveAddr; 7] = [
        SlaveAddr::Tcpc,
        SlaveAddr::TxP0,
        SlaveAddr::TxP1,
        SlaveAddr::TxP2,
        SlaveAddr::RxP0,
        SlaveAddr::RxP1,
        SlaveAddr::RxP2,
    ];

    /// 7-bit I²C address
    pub const fn addr(self) -> u8 {
        match self {
            SlaveAddr::Tcpc => regs::TCPC_INTERFACE_ADDR,
            SlaveAddr::TxP0 => regs::TX_P0_ADDR,
            SlaveAddr::TxP1 => regs::TX_P1_ADDR,
            SlaveAddr::TxP2 => regs::TX_P2_ADDR,
            SlaveAddr::RxP0 => regs::RX_P0_ADDR,
            SlaveAddr::RxP1 => regs::RX_P1_ADDR,
            SlaveAddr::RxP2 => regs::RX_P2_ADDR,
        }
    }

    pub fn from_addr(addr: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.addr() == addr)
    }

    /// Reserved offset written by the address-switch workaround
    pub const fn reserved_offset(self) -> u8 {
        match self {
            SlaveAddr::Tcpc => regs::RSVD_00_ADDR,
            SlaveAddr::TxP0 => regs::RSVD_D1_ADDR,
            SlaveAddr::TxP1 => regs::RSVD_60_ADDR,
            SlaveAddr::RxP0 => regs::RSVD_39_ADDR,
            SlaveAddr::RxP1 => regs::RSVD_7F_ADDR,
            SlaveAddr::TxP2 | SlaveAddr::RxP2 => regs::RSVD_00_ADDR,
        }
    }
}

/// Register access layer with the address-switch workaround
pub struct RegisterBus<I2C> {
    i2c: I2C,
    /// Sub-device of the previous access
    last_addr: Option<SlaveAddr>,
}

impl<I2C: I2c> RegisterBus<I2C> {
    pub const fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            last_addr: None,
        }
    }

    /// Give the I²C bus back
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn i2c(&self) -> &I2C {
        &self.i2c
    }

    pub fn i2c_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    pub fn last_addr(&self) -> Option<SlaveAddr> {
        self.last_addr
    }

    fn access_workaround(&mut self, addr: SlaveAddr) {
        if self.last_addr == Some(addr) {
            return;
        }
        self.last_addr = Some(addr);

        let offset = addr.reserved_offset();
        if self.i2c.write(addr.addr(), &[offset, 0x00]).is_err() {
            warn!("Failed to access {:02x}:{:02x}", addr.addr(), offset);
        }
    }

    /// Read one register
    pub fn read(&mut self, addr: SlaveAddr, offset: u8) -> Result<u8, I2C::Error> {
        self.access_workaround(addr);
        let mut val = [0u8; 1];
        self.i2c
            .write_read(addr.addr(), &[offset], &mut val)
            .map_err(|e| {
                error!("Failed to read i2c reg={:02x}:{:02x}", addr.addr(), offset);
                Error::Bus(e)
            })?;
        Ok(val[0])
    }

    /// Read consecutive registers starting at `offset`
    pub fn read_block(
        &mut self,
        addr: SlaveAddr,
        offset: u8,
        buf: &mut [u8],
    ) -> Result<(), I2C::Error> {
        self.access_workaround(addr);
        self.i2c.write_read(addr.addr(), &[offset], buf).map_err(|e| {
            error!(
                "Failed to read i2c block={:02x}:{:02x}[len={:02x}]",
                addr.addr(),
                offset,
                buf.len()
            );
            Error::Bus(e)
        })
    }

    /// Write one register
    pub fn write(&mut self, addr: SlaveAddr, offset: u8, value: u8) -> Result<(), I2C::Error> {
        self.access_workaround(addr);
        self.i2c.write(addr.addr(), &[offset, value]).map_err(|e| {
            error!("Failed to write i2c id={:02x}:{:02x}", addr.addr(), offset);
            Error::Bus(e)
        })
    }

    /// Read-modify-write: set the bits in `mask`
    pub fn write_or(&mut self, addr: SlaveAddr, offset: u8, mask: u8) -> Result<(), I2C::Error> {
        let val = self.read(addr, offset)?;
        self.write(addr, offset, val | mask)
    }

    /// Read-modify-write: keep only the bits in `mask`
    pub fn write_and(&mut self, addr: SlaveAddr, offset: u8, mask: u8) -> Result<(), I2C::Error> {
        let val = self.read(addr, offset)?;
        self.write(addr, offset, val & mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimChip, Transfer};

    fn workaround_writes(chip: &SimChip) -> Vec<(u8, u8)> {
        chip.log()
            .iter()
            .filter_map(|t| match *t {
                Transfer::Write { addr, offset, .. } => {
                    let slave = SlaveAddr::from_addr(addr)?;
                    (offset == slave.reserved_offset()).then_some((addr, offset))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_workaround_once_per_address() {
        let mut bus = RegisterBus::new(SimChip::default());
        bus.read(SlaveAddr::RxP0, regs::FLASH_LOAD_STA).unwrap();
        bus.read(SlaveAddr::RxP0, regs::OCM_FW_VERSION).unwrap();
        bus.write(SlaveAddr::RxP0, regs::AP_AUX_COMMAND, 0x04).unwrap();

        let chip = bus.release();
        assert_eq!(workaround_writes(&chip), vec![(regs::RX_P0_ADDR, regs::RSVD_39_ADDR)]);
    }

    #[test]
    fn test_workaround_fires_on_every_switch() {
        let mut bus = RegisterBus::new(SimChip::default());
        bus.read(SlaveAddr::RxP1, regs::MIPI_SWAP).unwrap();
        bus.read(SlaveAddr::RxP0, regs::FLASH_LOAD_STA).unwrap();
        bus.read(SlaveAddr::RxP1, regs::MIPI_SWAP).unwrap();
        bus.write(SlaveAddr::RxP2, regs::VERTICAL_SYNC_WIDTH, 5).unwrap();

        let chip = bus.release();
        assert_eq!(
            workaround_writes(&chip),
            vec![
                (regs::RX_P1_ADDR, regs::RSVD_7F_ADDR),
                (regs::RX_P0_ADDR, regs::RSVD_39_ADDR),
                (regs::RX_P1_ADDR, regs::RSVD_7F_ADDR),
                (regs::RX_P2_ADDR, regs::RSVD_00_ADDR),
            ]
        );
    }

    #[test]
    fn test_workaround_precedes_access() {
        let mut bus = RegisterBus::new(SimChip::default());
        bus.write(SlaveAddr::TxP2, regs::RST_CTRL2, regs::AUX_RST).unwrap();

        let chip = bus.release();
        assert_eq!(
            chip.log(),
            &[
                Transfer::Write { addr: regs::TX_P2_ADDR, offset: 0x00, value: 0x00 },
                Transfer::Write { addr: regs::TX_P2_ADDR, offset: regs::RST_CTRL2, value: regs::AUX_RST },
            ]
        );
    }

    #[test]
    fn test_workaround_failure_does_not_abort() {
        let mut chip = SimChip::default();
        chip.fail_register(regs::RX_P0_ADDR, regs::RSVD_39_ADDR);
        let mut bus = RegisterBus::new(chip);

        assert!(bus.write(SlaveAddr::RxP0, regs::AP_AUX_COMMAND, 0x01).is_ok());
        assert_eq!(bus.last_addr(), Some(SlaveAddr::RxP0));
        assert_eq!(bus.i2c().register(regs::RX_P0_ADDR, regs::AP_AUX_COMMAND), 0x01);
    }

    #[test]
    fn test_bus_error_propagates() {
        let mut chip = SimChip::default();
        chip.fail_register(regs::RX_P1_ADDR, regs::MIPI_SWAP);
        let mut bus = RegisterBus::new(chip);

        assert!(matches!(bus.read(SlaveAddr::RxP1, regs::MIPI_SWAP), Err(Error::Bus(_))));
        // Read failed, so the write half of the read-modify-write never runs
        assert!(bus.write_or(SlaveAddr::RxP1, regs::MIPI_SWAP, 0x10).is_err());
    }

    #[test]
    fn test_read_modify_write() {
        let mut bus = RegisterBus::new(SimChip::default());
        bus.write(SlaveAddr::RxP1, regs::MIPI_LANE_CTRL_0, 0xA7).unwrap();
        bus.write_and(SlaveAddr::RxP1, regs::MIPI_LANE_CTRL_0, 0xFC).unwrap();
        bus.write_or(SlaveAddr::RxP1, regs::MIPI_LANE_CTRL_0, 0x01).unwrap();
        assert_eq!(bus.read(SlaveAddr::RxP1, regs::MIPI_LANE_CTRL_0).unwrap(), 0xA5);
    }

    #[test]
    fn test_read_block() {
        let mut chip = SimChip::default();
        for i in 0..4u8 {
            chip.set_register(regs::RX_P0_ADDR, regs::AP_AUX_BUFF_START + i, 0x10 + i);
        }
        let mut bus = RegisterBus::new(chip);
        let mut buf = [0u8; 4];
        bus.read_block(SlaveAddr::RxP0, regs::AP_AUX_BUFF_START, &mut buf).unwrap();
        assert_eq!(buf, [0x10, 0x11, 0x12, 0x13]);
    }

    #[test]
    fn test_slave_addr_lookup() {
        for slave in SlaveAddr::ALL {
            assert_eq!(SlaveAddr::from_addr(slave.addr()), Some(slave));
        }
        assert_eq!(SlaveAddr::from_addr(0x50), None);
    }
}
