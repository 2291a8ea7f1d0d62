//! ANX7625 register map
//!
//! The chip exposes several logical sub-devices on the I²C bus, each with its
//! own 8-bit register space. Addresses below are 7-bit.

// ============================================================================
// SUB-DEVICE ADDRESSES
// ============================================================================

pub const TCPC_INTERFACE_ADDR: u8 = 0x2C;
pub const TX_P0_ADDR: u8 = 0x38;
pub const TX_P1_ADDR: u8 = 0x3D;
pub const TX_P2_ADDR: u8 = 0x39;
pub const RX_P0_ADDR: u8 = 0x3F;
pub const RX_P1_ADDR: u8 = 0x42;
pub const RX_P2_ADDR: u8 = 0x2A;

// Reserved offsets touched by the address-switch workaround
pub const RSVD_00_ADDR: u8 = 0x00;
pub const RSVD_D1_ADDR: u8 = 0xD1;
pub const RSVD_60_ADDR: u8 = 0x60;
pub const RSVD_39_ADDR: u8 = 0x39;
pub const RSVD_7F_ADDR: u8 = 0x7F;

// ============================================================================
// RX_P0: OCM, AUX ENGINE, AV STATUS
// ============================================================================

/// Crystal frequency select
pub const XTAL_FRQ_SEL: u8 = 0x3F;
pub const XTAL_FRQ_27M: u8 = 4 << 5;

/// OCM flash load status
pub const FLASH_LOAD_STA: u8 = 0x05;
pub const FLASH_LOAD_STA_CHK: u8 = 1 << 7;

pub const OCM_FW_VERSION: u8 = 0x31;
pub const OCM_FW_REVERSION: u8 = 0x32;

pub const R_DSC_CTRL_0: u8 = 0x40;
pub const DSC_EN: u8 = 0x01;

// AUX target address (20-bit)
pub const AP_AUX_ADDR_7_0: u8 = 0x11;
pub const AP_AUX_ADDR_15_8: u8 = 0x12;
pub const AP_AUX_ADDR_19_16: u8 = 0x13;

/// AUX control/status
pub const AP_AUX_CTRL_STATUS: u8 = 0x14;
pub const AP_AUX_CTRL_OP_EN: u8 = 0x10;
pub const AP_AUX_CTRL_ADDRONLY: u8 = 0x20;
/// Error flags in the low nibble of AP_AUX_CTRL_STATUS
pub const AP_AUX_CTRL_ERR_MASK: u8 = 0x0F;

/// AUX data buffer (16 bytes)
pub const AP_AUX_BUFF_START: u8 = 0x15;

/// Pixel clock in MHz
pub const PIXEL_CLOCK_L: u8 = 0x25;
pub const PIXEL_CLOCK_H: u8 = 0x26;

pub const AP_AUX_COMMAND: u8 = 0x27;

pub const AP_AV_STATUS: u8 = 0x28;
pub const AP_MIPI_MUTE: u8 = 1 << 4;
pub const AP_MIPI_RX_EN: u8 = 1 << 5;

/// System status (0x7E:0x45 in 8-bit notation)
pub const SYSTEM_STSTUS: u8 = 0x45;
pub const VCONN_STATUS: u8 = 1 << 2;
pub const VBUS_STATUS: u8 = 1 << 3;
pub const DATA_ROLE_STATUS: u8 = 1 << 5;
pub const HPD_STATUS: u8 = 1 << 7;

// ============================================================================
// RX_P1: MIPI PHY AND PLL
// ============================================================================

pub const MIPI_PHY_CONTROL_3: u8 = 0x03;
pub const MIPI_CLK_RT_MANUAL_PD_EN: u8 = 1 << 4;
pub const MIPI_CLK_HS_MANUAL_PD_EN: u8 = 1 << 3;

pub const MIPI_LANE_CTRL_0: u8 = 0x05;
pub const MIPI_VIDEO_STABLE_CNT: u8 = 0x0A;
pub const MIPI_LANE_CTRL_10: u8 = 0x0F;
pub const MIPI_DIGITAL_ADJ_1: u8 = 0x1B;

// PLL M/N numerator and denominator, 24 bits each
pub const MIPI_PLL_M_NUM_23_16: u8 = 0x1E;
pub const MIPI_PLL_M_NUM_15_8: u8 = 0x1F;
pub const MIPI_PLL_M_NUM_7_0: u8 = 0x20;
pub const MIPI_PLL_N_NUM_23_16: u8 = 0x21;
pub const MIPI_PLL_N_NUM_15_8: u8 = 0x22;
pub const MIPI_PLL_N_NUM_7_0: u8 = 0x23;

pub const MIPI_DIGITAL_PLL_6: u8 = 0x2A;
pub const MIPI_M_NUM_READY: u8 = 0x10;
pub const MIPI_N_NUM_READY: u8 = 0x08;

pub const MIPI_DIGITAL_PLL_7: u8 = 0x2B;
pub const MIPI_PLL_VCO_TUNE_REG_VAL: u8 = 0x30;
pub const MIPI_PLL_RESET_N: u8 = 0x02;

/// Post divider lives in the high nibble
pub const MIPI_DIGITAL_PLL_8: u8 = 0x33;

pub const MIPI_DIGITAL_PLL_16: u8 = 0x3B;
pub const MIPI_FREF_D_IND: u8 = 4;
pub const REF_CLK_27000KHZ: u8 = 1;

pub const MIPI_DIGITAL_PLL_18: u8 = 0x3D;
pub const MIPI_DPI_SELECT: u8 = 5;
pub const SELECT_DSI: u8 = 1;

pub const MIPI_SWAP: u8 = 0x4A;
pub const MIPI_SWAP_CH3: u8 = 4;

// Secondary OCM
pub const HDCP_CTRL: u8 = 0xEE;
pub const HDCP_DISABLE_MASK: u8 = 0x9F;
pub const AUTH_CTRL: u8 = 0xEC;
pub const AUTH_FLAG: u8 = 0x10;
pub const INT_CTRL: u8 = 0xFF;
pub const INT_DRM: u8 = 0x01;
pub const SECURE_OCM_VERSION: u8 = 0x86;

// ============================================================================
// RX_P2: VIDEO TIMING GENERATOR
// ============================================================================

pub const ACTIVE_LINES_L: u8 = 0x14;
pub const ACTIVE_LINES_H: u8 = 0x15;
pub const VERTICAL_FRONT_PORCH: u8 = 0x16;
pub const VERTICAL_SYNC_WIDTH: u8 = 0x17;
pub const VERTICAL_BACK_PORCH: u8 = 0x18;
pub const HORIZONTAL_TOTAL_PIXELS_L: u8 = 0x19;
pub const HORIZONTAL_TOTAL_PIXELS_H: u8 = 0x1A;
pub const HORIZONTAL_ACTIVE_PIXELS_L: u8 = 0x1B;
pub const HORIZONTAL_ACTIVE_PIXELS_H: u8 = 0x1C;
pub const HORIZONTAL_FRONT_PORCH_L: u8 = 0x1D;
pub const HORIZONTAL_FRONT_PORCH_H: u8 = 0x1E;
pub const HORIZONTAL_SYNC_WIDTH_L: u8 = 0x1F;
pub const HORIZONTAL_SYNC_WIDTH_H: u8 = 0x20;
pub const HORIZONTAL_BACK_PORCH_L: u8 = 0x21;
pub const HORIZONTAL_BACK_PORCH_H: u8 = 0x22;

// ============================================================================
// TX_P2: RESET CONTROL
// ============================================================================

pub const RST_CTRL2: u8 = 0x07;
pub const AUX_RST: u8 = 0x04;

// ============================================================================
// AUX COMMANDS AND SIZES
// ============================================================================

/// Native AUX write, one byte
pub const AUX_CMD_WRITE: u8 = 0x04;
/// Native AUX read, one byte
pub const AUX_CMD_READ_1: u8 = 0x01;
/// I²C-over-AUX read, MOT=0, 16 bytes
pub const AUX_CMD_I2C_READ_16: u8 = 0xF1;

/// DDC segment pointer and EDID device on the sink's I²C bus
pub const DDC_SEGMENT_ADDR: u8 = 0x30;
pub const DDC_EDID_ADDR: u8 = 0x50;

/// EDID extension block count offset
pub const EDID_EXTENSION_FLAG: u8 = 0x7E;

pub const MAX_DPCD_BUFFER_SIZE: usize = 16;
pub const ONE_BLOCK_SIZE: usize = 128;
pub const FOUR_BLOCK_SIZE: usize = ONE_BLOCK_SIZE * 4;
