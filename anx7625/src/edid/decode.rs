//! EDID base block decoder
//!
//! Extracts what the bridge needs from a VESA EDID 1.3/1.4 base block: the
//! vendor identity, the product name and the preferred detailed timing.
//!
//! # Detailed Timing Descriptor
//!
//! | Bytes | Field                                            |
//! |-------|--------------------------------------------------|
//! | 0-1   | Pixel clock, 10 kHz units, little endian         |
//! | 2-4   | H active / H blanking (low bytes, high nibbles)  |
//! | 5-7   | V active / V blanking (low bytes, high nibbles)  |
//! | 8-11  | Sync offsets and pulse widths                    |
//! | 12-14 | Image size in mm                                 |
//! | 15-16 | Borders                                          |
//! | 17    | Flags (sync type and polarity)                   |

use core::fmt;

use crate::regs::ONE_BLOCK_SIZE;
use crate::timing::DisplayTiming;

pub const EDID_HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];

const MANUFACTURER_OFFSET: usize = 8;
const PRODUCT_OFFSET: usize = 10;
const SERIAL_OFFSET: usize = 12;
const VERSION_OFFSET: usize = 18;
const INPUT_OFFSET: usize = 20;
const SIZE_OFFSET: usize = 21;
const DESCRIPTOR_OFFSET: usize = 54;
const DESCRIPTOR_LEN: usize = 18;
const EXTENSIONS_OFFSET: usize = 126;

const TAG_PRODUCT_NAME: u8 = 0xFC;
const NAME_LEN: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdidError {
    /// Header pattern missing, no EDID present
    Absent,
    /// Checksum mismatch or missing preferred timing
    NotConformant,
    /// Fewer bytes than one block
    TooShort(usize),
}

impl fmt::Display for EdidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdidError::Absent => write!(f, "no edid header"),
            EdidError::NotConformant => write!(f, "edid not conformant"),
            EdidError::TooShort(len) => write!(f, "edid too short ({} bytes)", len),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for EdidError {}

/// One detailed timing, in EDID terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdidMode {
    pub pixel_clock_khz: u32,
    pub ha: u16,
    /// Horizontal blanking
    pub hbl: u16,
    /// Horizontal sync offset from end of active
    pub hso: u16,
    /// Horizontal sync pulse width
    pub hspw: u16,
    pub hborder: u16,
    pub va: u16,
    pub vbl: u16,
    pub vso: u16,
    pub vspw: u16,
    pub vborder: u16,
    pub hsync_positive: bool,
    pub vsync_positive: bool,
    pub refresh_hz: u32,
}

/// Decoded EDID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edid {
    manufacturer: [u8; 3],
    pub product_code: u16,
    pub serial: u32,
    pub version: u8,
    pub revision: u8,
    /// Bits per color for digital inputs
    pub panel_bits_per_color: Option<u8>,
    pub width_cm: u8,
    pub height_cm: u8,
    /// Extension blocks announced by the base block
    pub extensions: u8,
    name: [u8; NAME_LEN],
    name_len: usize,
    pub preferred: Option<EdidMode>,
}

impl Edid {
    /// Three-letter PNP vendor ID
    pub fn manufacturer(&self) -> &str {
        core::str::from_utf8(&self.manufacturer).unwrap_or("???")
    }

    /// Monitor name descriptor
    pub fn name(&self) -> Option<&str> {
        if self.name_len == 0 {
            return None;
        }
        core::str::from_utf8(&self.name[..self.name_len]).ok()
    }

    /// Timing of the preferred detailed mode
    pub fn preferred_timing(&self) -> Result<DisplayTiming, EdidError> {
        self.preferred
            .as_ref()
            .map(DisplayTiming::from_edid_mode)
            .ok_or(EdidError::NotConformant)
    }
}

fn checksum_ok(block: &[u8]) -> bool {
    block.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) == 0
}

/// Decode an EDID. `bytes` holds the base block and any extension blocks
/// that were read; every complete block must checksum to zero.
pub fn decode(bytes: &[u8]) -> Result<Edid, EdidError> {
    if bytes.len() < ONE_BLOCK_SIZE {
        return Err(EdidError::TooShort(bytes.len()));
    }
    let base = &bytes[..ONE_BLOCK_SIZE];
    if base[..8] != EDID_HEADER {
        return Err(EdidError::Absent);
    }
    if !bytes.chunks_exact(ONE_BLOCK_SIZE).all(checksum_ok) {
        return Err(EdidError::NotConformant);
    }

    let mut edid = Edid {
        manufacturer: manufacturer_id(base[MANUFACTURER_OFFSET], base[MANUFACTURER_OFFSET + 1]),
        product_code: u16::from_le_bytes([base[PRODUCT_OFFSET], base[PRODUCT_OFFSET + 1]]),
        serial: u32::from_le_bytes([
            base[SERIAL_OFFSET],
            base[SERIAL_OFFSET + 1],
            base[SERIAL_OFFSET + 2],
            base[SERIAL_OFFSET + 3],
        ]),
        version: base[VERSION_OFFSET],
        revision: base[VERSION_OFFSET + 1],
        panel_bits_per_color: bits_per_color(base[INPUT_OFFSET]),
        width_cm: base[SIZE_OFFSET],
        height_cm: base[SIZE_OFFSET + 1],
        extensions: base[EXTENSIONS_OFFSET],
        name: [0; NAME_LEN],
        name_len: 0,
        preferred: None,
    };

    for desc in base[DESCRIPTOR_OFFSET..DESCRIPTOR_OFFSET + 4 * DESCRIPTOR_LEN].chunks_exact(DESCRIPTOR_LEN) {
        if desc[0] != 0 || desc[1] != 0 {
            if edid.preferred.is_none() {
                edid.preferred = Some(parse_dtd(desc));
            }
        } else if desc[3] == TAG_PRODUCT_NAME {
            let text = &desc[5..];
            let end = text.iter().position(|&c| c == b'\n').unwrap_or(NAME_LEN);
            let len = text[..end].iter().rposition(|&c| c != b' ').map_or(0, |p| p + 1);
            edid.name[..len].copy_from_slice(&text[..len]);
            edid.name_len = len;
        }
    }

    Ok(edid)
}

fn manufacturer_id(hi: u8, lo: u8) -> [u8; 3] {
    let id = u16::from_be_bytes([hi, lo]);
    let letter = |shift: u16| b'@' + ((id >> shift) & 0x1F) as u8;
    [letter(10), letter(5), letter(0)]
}

fn bits_per_color(input: u8) -> Option<u8> {
    // Analog input or undefined depth
    if input & 0x80 == 0 {
        return None;
    }
    match (input >> 4) & 0x07 {
        depth @ 1..=6 => Some(4 + depth * 2),
        _ => None,
    }
}

fn parse_dtd(d: &[u8]) -> EdidMode {
    let hi = |b: u8| (b >> 4) as u16;
    let lo = |b: u8| (b & 0x0F) as u16;

    let ha = d[2] as u16 | hi(d[4]) << 8;
    let hbl = d[3] as u16 | lo(d[4]) << 8;
    let va = d[5] as u16 | hi(d[7]) << 8;
    let vbl = d[6] as u16 | lo(d[7]) << 8;
    let pixel_clock_khz = u16::from_le_bytes([d[0], d[1]]) as u32 * 10;

    let frame = (ha as u64 + hbl as u64) * (va as u64 + vbl as u64);
    let refresh_hz = if frame == 0 {
        0
    } else {
        ((pixel_clock_khz as u64 * 1000 + frame / 2) / frame) as u32
    };

    // Polarity bits only mean something for digital separate sync
    let separate = (d[17] >> 3) & 0x03 == 0x03;

    EdidMode {
        pixel_clock_khz,
        ha,
        hbl,
        hso: d[8] as u16 | (((d[11] >> 6) & 0x03) as u16) << 8,
        hspw: d[9] as u16 | (((d[11] >> 4) & 0x03) as u16) << 8,
        hborder: d[15] as u16,
        va,
        vbl,
        vso: hi(d[10]) | (((d[11] >> 2) & 0x03) as u16) << 4,
        vspw: lo(d[10]) | ((d[11] & 0x03) as u16) << 4,
        vborder: d[16] as u16,
        hsync_positive: separate && d[17] & 0x02 != 0,
        vsync_positive: separate && d[17] & 0x04 != 0,
        refresh_hz,
    }
}
