//! EDID acquisition over the AUX channel
//!
//! The sink's EDID is read through the chip's I²C-over-AUX bridge in 16-byte
//! chunks. The first 256 bytes (block groups 0 and 1) are addressed directly
//! through DDC address 0x50; blocks 2 and 3 need the E-DDC segment pointer at
//! 0x30 selected first.
//!
//! ```text
//! group  segment  offsets            buffer position
//!   0      -      0x00..=0x70        0x000..0x080
//!   1      -      0x80..=0xF0        0x080..0x100
//!   2      1      0x00..=0x70        0x100..0x180
//!   3      1      0x80..=0xF0        0x180..0x200
//! ```

pub mod decode;

pub use decode::{decode, Edid, EdidError, EdidMode};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{error, info, warn};

use crate::driver::Anx7625;
use crate::hal::SlaveAddr;
use crate::regs::*;
use crate::{BestEffort, Error, Result};

/// Chunks per 128-byte block
const CHUNKS_PER_BLOCK: usize = ONE_BLOCK_SIZE / MAX_DPCD_BUFFER_SIZE;

/// One 16-byte EDID read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// E-DDC segment, `None` for direct reads
    pub segment: Option<u8>,
    /// Offset on the DDC bus
    pub offset: u8,
    /// Destination in the EDID buffer
    pub position: usize,
}

/// Chunks that make up block group `group`
pub fn chunk_plan(group: usize) -> impl Iterator<Item = Chunk> {
    let segment = match group {
        0 | 1 => None,
        _ => Some((group / 2) as u8),
    };
    (0..CHUNKS_PER_BLOCK).map(move |i| Chunk {
        segment,
        offset: ((group % 2) * ONE_BLOCK_SIZE + i * MAX_DPCD_BUFFER_SIZE) as u8,
        position: (group * CHUNKS_PER_BLOCK + i) * MAX_DPCD_BUFFER_SIZE,
    })
}

impl<I2C: I2c, D: DelayNs> Anx7625<I2C, D> {
    /// Extension block count announced by the sink, 0-based.
    ///
    /// Counts above 3 are taken as 1.
    pub fn edid_block_count(&mut self) -> Result<u8, I2C::Error> {
        self.aux_write(EDID_EXTENSION_FLAG)?;
        self.aux_read(AUX_CMD_READ_1)?;
        let val = self.bus.read(SlaveAddr::RxP0, AP_AUX_BUFF_START).map_err(|e| {
            error!("IO error: access AUX BUFF");
            e
        })?;

        info!("EDID Block = {}", val as u32 + 1);
        Ok(if val > 3 { 1 } else { val })
    }

    /// Read 16 EDID bytes at `offset` of the current segment
    pub fn edid_read_chunk(
        &mut self,
        offset: u8,
        buf: &mut [u8; MAX_DPCD_BUFFER_SIZE],
    ) -> Result<(), I2C::Error> {
        self.read_chunk(None, offset, buf)
    }

    /// Read 16 EDID bytes at `offset` of E-DDC segment `segment`
    pub fn edid_read_segment(
        &mut self,
        segment: u8,
        offset: u8,
        buf: &mut [u8; MAX_DPCD_BUFFER_SIZE],
    ) -> Result<(), I2C::Error> {
        self.read_chunk(Some(segment), offset, buf)
    }

    fn read_chunk(
        &mut self,
        segment: Option<u8>,
        offset: u8,
        buf: &mut [u8; MAX_DPCD_BUFFER_SIZE],
    ) -> Result<(), I2C::Error> {
        for attempt in 1..=self.config.edid_read_attempts {
            match self.read_chunk_once(segment, offset, buf) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    error!("edid read failed at {:02x} ({}, attempt {}), reset!", offset, e, attempt);
                    if let Err(e) = self.reset_aux() {
                        warn!("aux reset failed: {}", e);
                    }
                }
            }
        }
        Err(Error::EdidUnavailable)
    }

    /// One attempt. The segment pointer is selected again every time since
    /// an AUX reset drops it.
    fn read_chunk_once(
        &mut self,
        segment: Option<u8>,
        offset: u8,
        buf: &mut [u8; MAX_DPCD_BUFFER_SIZE],
    ) -> Result<(), I2C::Error> {
        if let Some(segment) = segment {
            self.select_segment(segment)?;
        }
        self.aux_write(offset)?;
        self.aux_read(AUX_CMD_I2C_READ_16)?;
        self.aux_buffer(buf)
    }

    fn select_segment(&mut self, segment: u8) -> Result<(), I2C::Error> {
        // Address-only transaction to the segment pointer
        self.bus.write(SlaveAddr::RxP0, AP_AUX_ADDR_7_0, DDC_SEGMENT_ADDR)?;
        self.bus.write(SlaveAddr::RxP0, AP_AUX_COMMAND, AUX_CMD_WRITE)?;
        self.bus.write(
            SlaveAddr::RxP0,
            AP_AUX_CTRL_STATUS,
            AP_AUX_CTRL_ADDRONLY | AP_AUX_CTRL_OP_EN,
        )?;
        self.wait_aux_op_finish()?;

        self.aux_write(segment)?;
        self.bus.write(SlaveAddr::RxP0, AP_AUX_ADDR_7_0, DDC_EDID_ADDR)
    }

    /// Read the sink's EDID into `buf` and return the 0-based block count.
    ///
    /// Chunks that do not fit in `buf` are read but dropped. A chunk that
    /// fails all its attempts ends collection; bytes already copied stay.
    /// The AUX channel is reset once addressing is done, whatever happens.
    pub fn read_edid(&mut self, buf: &mut [u8]) -> Result<u8, I2C::Error> {
        let mut seq = BestEffort::new();
        seq.step(self.bus.write(SlaveAddr::RxP0, AP_AUX_ADDR_7_0, DDC_EDID_ADDR));
        seq.step(self.bus.write(SlaveAddr::RxP0, AP_AUX_ADDR_15_8, 0));
        seq.step(self.bus.write_and(SlaveAddr::RxP0, AP_AUX_ADDR_19_16, 0xF0));
        seq.finish().map_err(|e| {
            error!("access aux channel IO error");
            e
        })?;

        let blocks = self.edid_block_count();
        if let Ok(count) = blocks {
            self.read_blocks(count, buf);
        }

        if let Err(e) = self.reset_aux() {
            warn!("aux reset failed: {}", e);
        }
        blocks
    }

    fn read_blocks(&mut self, blocks: u8, buf: &mut [u8]) {
        let mut chunk = [0u8; MAX_DPCD_BUFFER_SIZE];

        for group in 0..=blocks as usize {
            for plan in chunk_plan(group) {
                let read = match plan.segment {
                    None => self.edid_read_chunk(plan.offset, &mut chunk),
                    Some(segment) => self.edid_read_segment(segment, plan.offset, &mut chunk),
                };
                if read.is_err() {
                    error!("giving up on edid at position {:#05x}", plan.position);
                    return;
                }
                if let Some(dst) = buf.get_mut(plan.position..plan.position + MAX_DPCD_BUFFER_SIZE) {
                    dst.copy_from_slice(&chunk);
                }
            }
        }
    }

    /// Read and decode the sink's EDID
    pub fn dp_get_edid(&mut self) -> Result<Edid, I2C::Error> {
        let mut raw = [0u8; FOUR_BLOCK_SIZE];
        let blocks = self.read_edid(&mut raw).map_err(|e| {
            error!("Failed to get eDP EDID");
            e
        })?;

        let len = (blocks as usize + 1) * ONE_BLOCK_SIZE;
        let edid = decode(&raw[..len]).map_err(|e| {
            error!("Failed to decode EDID: {}", e);
            Error::Edid(e)
        })?;

        info!(
            "EDID: {} {} ({} extension blocks)",
            edid.manufacturer(),
            edid.name().unwrap_or("unnamed"),
            edid.extensions
        );
        Ok(edid)
    }
}
