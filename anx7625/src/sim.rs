//! Simulated ANX7625
//!
//! A register-level model of the bridge for host testing and for the debug
//! tool. It implements `embedded_hal::i2c::I2c` and models:
//!
//! - Register banks for every sub-device, with a transfer log
//! - OCM flash-load and firmware version timing
//! - The AUX engine: busy polls, a stuck engine, injected chunk and segment
//!   failures
//! - The sink's DDC bus: EDID store with E-DDC segment pointer
//! - Hot-plug detect timing and the power role

use core::convert::Infallible;
use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital;
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::edid::EdidMode;
use crate::hal::SlaveAddr;
use crate::regs;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Behaviour of the simulated chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Flash-load polls that report "not loaded"
    pub firmware_ready_after: u32,
    /// Version reads that return 0/0 after the loaded bit is set
    pub zero_version_reads: u32,
    pub firmware_version: u8,
    pub firmware_revision: u8,
    pub secure_ocm_version: u8,
    /// System status reads before HPD goes high
    pub hpd_after: u32,
    /// HPD never asserts
    pub hpd_stuck_low: bool,
    /// Status polls that still show the AUX operation busy
    pub aux_busy_polls: u32,
    /// AUX operation never completes
    pub aux_stuck: bool,
    /// 16-byte chunk reads that succeed before injected failures start
    pub aux_failures_after: u32,
    /// 16-byte chunk reads that fail, once failures have started
    pub aux_failures: u32,
    /// E-DDC segment pointer writes the sink does not acknowledge
    pub segment_failures: u32,
    /// Chip reports itself as VBUS provider
    pub power_provider: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            firmware_ready_after: 3,
            zero_version_reads: 0,
            firmware_version: 0x14,
            firmware_revision: 0x08,
            secure_ocm_version: 0x03,
            hpd_after: 2,
            hpd_stuck_low: false,
            aux_busy_polls: 1,
            aux_stuck: false,
            aux_failures_after: 0,
            aux_failures: 0,
            segment_failures: 0,
            power_provider: true,
        }
    }
}

// ============================================================================
// ERRORS AND LOG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// No sub-device at this address
    Nack(u8),
    /// Failure injected with `fail_register`
    Injected { addr: u8, offset: u8 },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Nack(addr) => write!(f, "no device at {:#04x}", addr),
            SimError::Injected { addr, offset } => {
                write!(f, "injected failure at {:02x}:{:02x}", addr, offset)
            }
        }
    }
}

impl std::error::Error for SimError {}

impl i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        match self {
            SimError::Nack(_) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            SimError::Injected { .. } => ErrorKind::Bus,
        }
    }
}

/// One register-level bus access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Write { addr: u8, offset: u8, value: u8 },
    Read { addr: u8, offset: u8, len: usize },
}

/// Counters for the protocol events tests care about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    pub flash_polls: u32,
    pub version_reads: u32,
    pub status_reads: u32,
    pub aux_ops: u32,
    /// 16-byte I²C-over-AUX reads, failed ones included
    pub chunk_reads: u32,
    pub segment_selects: u32,
    pub aux_resets: u32,
}

#[derive(Debug, Default)]
struct AuxEngine {
    active: bool,
    busy_left: u32,
    error: u8,
    segment: u8,
    offset: u8,
    failures_left: u32,
    segment_failures_left: u32,
}

// ============================================================================
// SIMULATED CHIP
// ============================================================================

pub struct SimChip {
    config: SimConfig,
    banks: [[u8; 256]; 7],
    edid: Vec<u8>,
    log: Vec<Transfer>,
    failing: Vec<(u8, u8)>,
    stats: SimStats,
    aux: AuxEngine,
}

impl Default for SimChip {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimChip {
    /// Chip with a 1280x720 single-block EDID attached
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            banks: [[0; 256]; 7],
            edid: sample_edid(0),
            log: Vec::new(),
            failing: Vec::new(),
            stats: SimStats::default(),
            aux: AuxEngine {
                failures_left: config.aux_failures,
                segment_failures_left: config.segment_failures,
                ..AuxEngine::default()
            },
        }
    }

    pub fn with_edid(mut self, edid: Vec<u8>) -> Self {
        self.edid = edid;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    pub fn log(&self) -> &[Transfer] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Writes to `addr`, in order, as (offset, value)
    pub fn writes_to(&self, addr: u8) -> Vec<(u8, u8)> {
        self.log
            .iter()
            .filter_map(|t| match *t {
                Transfer::Write { addr: a, offset, value } if a == addr => Some((offset, value)),
                _ => None,
            })
            .collect()
    }

    /// Stored register value, without read side effects
    pub fn register(&self, addr: u8, offset: u8) -> u8 {
        match SlaveAddr::from_addr(addr) {
            Some(bank) => self.banks[bank_index(bank)][offset as usize],
            None => 0,
        }
    }

    pub fn set_register(&mut self, addr: u8, offset: u8, value: u8) {
        if let Some(bank) = SlaveAddr::from_addr(addr) {
            self.banks[bank_index(bank)][offset as usize] = value;
        }
    }

    /// Make every access to `addr:offset` fail
    pub fn fail_register(&mut self, addr: u8, offset: u8) {
        self.failing.push((addr, offset));
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    fn check(&self, addr: u8, offset: u8) -> Result<(), SimError> {
        if self.failing.contains(&(addr, offset)) {
            return Err(SimError::Injected { addr, offset });
        }
        Ok(())
    }

    fn stored(&self, bank: SlaveAddr, offset: u8) -> u8 {
        self.banks[bank_index(bank)][offset as usize]
    }

    fn read_register(&mut self, bank: SlaveAddr, offset: u8) -> u8 {
        let stored = self.stored(bank, offset);
        match (bank, offset) {
            (SlaveAddr::RxP0, regs::FLASH_LOAD_STA) => {
                self.stats.flash_polls += 1;
                if self.stats.flash_polls > self.config.firmware_ready_after {
                    stored | regs::FLASH_LOAD_STA_CHK
                } else {
                    stored & !regs::FLASH_LOAD_STA_CHK
                }
            }
            (SlaveAddr::RxP0, regs::OCM_FW_VERSION) => {
                self.stats.version_reads += 1;
                if self.stats.version_reads <= self.config.zero_version_reads {
                    0
                } else {
                    self.config.firmware_version
                }
            }
            (SlaveAddr::RxP0, regs::OCM_FW_REVERSION) => {
                if self.stats.version_reads <= self.config.zero_version_reads {
                    0
                } else {
                    self.config.firmware_revision
                }
            }
            (SlaveAddr::RxP0, regs::AP_AUX_CTRL_STATUS) => self.aux_status(),
            (SlaveAddr::RxP0, regs::SYSTEM_STSTUS) => {
                self.stats.status_reads += 1;
                self.system_status()
            }
            (SlaveAddr::RxP1, regs::SECURE_OCM_VERSION) => self.config.secure_ocm_version,
            _ => stored,
        }
    }

    fn write_register(&mut self, bank: SlaveAddr, offset: u8, value: u8) {
        self.banks[bank_index(bank)][offset as usize] = value;
        match (bank, offset) {
            (SlaveAddr::RxP0, regs::AP_AUX_CTRL_STATUS) if value & regs::AP_AUX_CTRL_OP_EN != 0 => {
                self.start_aux(value)
            }
            (SlaveAddr::TxP2, regs::RST_CTRL2) if value & regs::AUX_RST != 0 => {
                self.stats.aux_resets += 1;
                self.finish_aux();
                self.aux.error = 0;
                self.aux.segment = 0;
            }
            _ => {}
        }
    }

    fn system_status(&self) -> u8 {
        let mut status = 0;
        if self.config.power_provider {
            status |= regs::VBUS_STATUS | regs::VCONN_STATUS | regs::DATA_ROLE_STATUS;
        }
        if !self.config.hpd_stuck_low && self.stats.status_reads > self.config.hpd_after {
            status |= regs::HPD_STATUS;
        }
        status
    }

    fn aux_status(&mut self) -> u8 {
        if self.aux.active {
            if self.config.aux_stuck || self.aux.busy_left > 0 {
                self.aux.busy_left = self.aux.busy_left.saturating_sub(1);
                return (self.stored(SlaveAddr::RxP0, regs::AP_AUX_CTRL_STATUS)
                    & !regs::AP_AUX_CTRL_ERR_MASK)
                    | regs::AP_AUX_CTRL_OP_EN;
            }
            self.finish_aux();
        }
        let base = self.stored(SlaveAddr::RxP0, regs::AP_AUX_CTRL_STATUS)
            & !(regs::AP_AUX_CTRL_OP_EN | regs::AP_AUX_CTRL_ERR_MASK);
        base | self.aux.error
    }

    /// Engine done: the command bits clear themselves
    fn finish_aux(&mut self) {
        self.aux.active = false;
        self.banks[bank_index(SlaveAddr::RxP0)][regs::AP_AUX_CTRL_STATUS as usize] &=
            !(regs::AP_AUX_CTRL_OP_EN | regs::AP_AUX_CTRL_ADDRONLY);
    }

    fn edid_byte(&self, index: usize) -> u8 {
        let pos = self.aux.segment as usize * 256 + self.aux.offset as usize + index;
        self.edid.get(pos).copied().unwrap_or(0)
    }

    fn start_aux(&mut self, ctrl: u8) {
        self.stats.aux_ops += 1;
        self.aux.active = true;
        self.aux.busy_left = self.config.aux_busy_polls;
        self.aux.error = 0;

        if ctrl & regs::AP_AUX_CTRL_ADDRONLY != 0 {
            return;
        }

        let target = self.stored(SlaveAddr::RxP0, regs::AP_AUX_ADDR_7_0);
        let buff = regs::AP_AUX_BUFF_START as usize;
        match self.stored(SlaveAddr::RxP0, regs::AP_AUX_COMMAND) {
            regs::AUX_CMD_WRITE => {
                let data = self.stored(SlaveAddr::RxP0, regs::AP_AUX_BUFF_START);
                if target == regs::DDC_SEGMENT_ADDR {
                    if self.aux.segment_failures_left > 0 {
                        self.aux.segment_failures_left -= 1;
                        self.aux.error = 0x01;
                        return;
                    }
                    self.aux.segment = data;
                    self.stats.segment_selects += 1;
                } else {
                    self.aux.offset = data;
                }
            }
            regs::AUX_CMD_READ_1 => {
                let byte = self.edid_byte(0);
                self.banks[bank_index(SlaveAddr::RxP0)][buff] = byte;
            }
            regs::AUX_CMD_I2C_READ_16 => {
                self.stats.chunk_reads += 1;
                if self.stats.chunk_reads > self.config.aux_failures_after
                    && self.aux.failures_left > 0
                {
                    self.aux.failures_left -= 1;
                    self.aux.error = 0x01;
                    return;
                }
                for i in 0..regs::MAX_DPCD_BUFFER_SIZE {
                    let byte = self.edid_byte(i);
                    self.banks[bank_index(SlaveAddr::RxP0)][buff + i] = byte;
                }
                // E-DDC: the segment pointer only applies to the next read
                self.aux.segment = 0;
            }
            _ => {}
        }
    }
}

fn bank_index(bank: SlaveAddr) -> usize {
    match bank {
        SlaveAddr::Tcpc => 0,
        SlaveAddr::TxP0 => 1,
        SlaveAddr::TxP1 => 2,
        SlaveAddr::TxP2 => 3,
        SlaveAddr::RxP0 => 4,
        SlaveAddr::RxP1 => 5,
        SlaveAddr::RxP2 => 6,
    }
}

impl i2c::ErrorType for SimChip {
    type Error = SimError;
}

impl I2c for SimChip {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let bank = SlaveAddr::from_addr(address).ok_or(SimError::Nack(address))?;
        let mut pointer = 0u8;

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let Some((&offset, data)) = bytes.split_first() else {
                        continue;
                    };
                    pointer = offset;
                    for &value in data {
                        self.check(address, pointer)?;
                        self.log.push(Transfer::Write { addr: address, offset: pointer, value });
                        self.write_register(bank, pointer, value);
                        pointer = pointer.wrapping_add(1);
                    }
                }
                Operation::Read(buf) => {
                    self.check(address, pointer)?;
                    self.log.push(Transfer::Read { addr: address, offset: pointer, len: buf.len() });
                    for byte in buf.iter_mut() {
                        *byte = self.read_register(bank, pointer);
                        pointer = pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// DELAY AND PINS
// ============================================================================

/// Delay that only records how long it was asked to wait
#[derive(Debug, Clone, Copy, Default)]
pub struct SimDelay {
    elapsed_ns: u64,
    calls: u32,
}

impl SimDelay {
    pub const fn new() -> Self {
        Self {
            elapsed_ns: 0,
            calls: 0,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }

    /// Number of delay requests
    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
        self.calls += 1;
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_ns += us as u64 * 1_000;
        self.calls += 1;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ns += ms as u64 * 1_000_000;
        self.calls += 1;
    }
}

/// Output pin that remembers its level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimPin {
    high: bool,
    edges: u32,
}

impl SimPin {
    pub const fn new() -> Self {
        Self { high: false, edges: 0 }
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Level changes so far
    pub fn edges(&self) -> u32 {
        self.edges
    }

    fn set(&mut self, high: bool) {
        if self.high != high {
            self.edges += 1;
        }
        self.high = high;
    }
}

impl digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

// ============================================================================
// EDID FIXTURES
// ============================================================================

/// CEA-861 1280x720@60 detailed timing
pub const MODE_720P: EdidMode = EdidMode {
    pixel_clock_khz: 74_250,
    ha: 1280,
    hbl: 370,
    hso: 110,
    hspw: 40,
    hborder: 0,
    va: 720,
    vbl: 30,
    vso: 5,
    vspw: 5,
    vborder: 0,
    hsync_positive: true,
    vsync_positive: true,
    refresh_hz: 60,
};

/// Pack a detailed timing descriptor
pub fn encode_dtd(mode: &EdidMode) -> [u8; 18] {
    let mut d = [0u8; 18];
    let clock = (mode.pixel_clock_khz / 10) as u16;
    d[0..2].copy_from_slice(&clock.to_le_bytes());
    d[2] = mode.ha as u8;
    d[3] = mode.hbl as u8;
    d[4] = (((mode.ha >> 8) as u8 & 0x0F) << 4) | ((mode.hbl >> 8) as u8 & 0x0F);
    d[5] = mode.va as u8;
    d[6] = mode.vbl as u8;
    d[7] = (((mode.va >> 8) as u8 & 0x0F) << 4) | ((mode.vbl >> 8) as u8 & 0x0F);
    d[8] = mode.hso as u8;
    d[9] = mode.hspw as u8;
    d[10] = ((mode.vso as u8 & 0x0F) << 4) | (mode.vspw as u8 & 0x0F);
    d[11] = (((mode.hso >> 8) as u8 & 0x03) << 6)
        | (((mode.hspw >> 8) as u8 & 0x03) << 4)
        | (((mode.vso >> 4) as u8 & 0x03) << 2)
        | ((mode.vspw >> 4) as u8 & 0x03);
    // 527 x 296 mm
    d[12] = 0x0F;
    d[13] = 0x28;
    d[14] = 0x21;
    d[15] = mode.hborder as u8;
    d[16] = mode.vborder as u8;
    // Digital separate sync
    let mut flags = 0x18;
    if mode.hsync_positive {
        flags |= 0x02;
    }
    if mode.vsync_positive {
        flags |= 0x04;
    }
    d[17] = flags;
    d
}

fn fix_checksum(block: &mut [u8]) {
    let sum = block[..127].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    block[127] = 0u8.wrapping_sub(sum);
}

/// EDID with a 1280x720 preferred mode and `extensions` CEA blocks
pub fn sample_edid(extensions: u8) -> Vec<u8> {
    let mut base = vec![0u8; regs::ONE_BLOCK_SIZE];
    base[0..8].copy_from_slice(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00]);
    // "ANX"
    base[8..10].copy_from_slice(&[0x05, 0xD8]);
    base[10..12].copy_from_slice(&0x7625u16.to_le_bytes());
    base[18] = 1;
    base[19] = 4;
    base[20] = 0xA5;
    base[21] = 53;
    base[22] = 30;
    base[54..72].copy_from_slice(&encode_dtd(&MODE_720P));
    base[72..77].copy_from_slice(&[0x00, 0x00, 0x00, 0xFC, 0x00]);
    base[77..90].copy_from_slice(b"ANX SIM\n     ");
    base[126] = extensions;
    fix_checksum(&mut base);

    let mut edid = base;
    for n in 0..extensions {
        let mut ext = vec![0u8; regs::ONE_BLOCK_SIZE];
        ext[0] = 0x02;
        ext[1] = 0x03;
        ext[2] = 0x04;
        // Distinguishable payload per block
        for (i, byte) in ext.iter_mut().enumerate().take(127).skip(4) {
            *byte = (i as u8) ^ (n + 1);
        }
        fix_checksum(&mut ext);
        edid.extend_from_slice(&ext);
    }
    edid
}
