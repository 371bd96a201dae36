use packed_struct::prelude::*;
use thiserror::Error;

use super::hid_report::{Direction, SetStatePackedOutputData};

// Source: https://github.com/torvalds/linux/blob/master/drivers/hid/hid-playstation.c
pub const DS5_EDGE_NAME: &str = "Sony Interactive Entertainment DualSense Edge Wireless Controller";
pub const DS5_EDGE_PID: u16 = 0x0df2;

pub const DS5_NAME: &str = "Sony Interactive Entertainment DualSense Wireless Controller";
pub const DS5_PID: u16 = 0x0ce6;

/// Name of the device that only carries the motions of a left controller half
pub const DS5_LEFT_NAME: &str = "Handheld Daemon Left Motions Device (Dualsense)";

pub const DS5_VID: u16 = 0x054c;
pub const DS5_VERSION: u32 = 256;
pub const DS5_COUNTRY: u32 = 0;

pub const PIDS: [u16; 2] = [DS5_EDGE_PID, DS5_PID];

pub const FEATURE_REPORT_PAIRING_INFO: u8 = 0x09;
pub const FEATURE_REPORT_PAIRING_INFO_SIZE: usize = 20;
pub const FEATURE_REPORT_FIRMWARE_INFO: u8 = 0x20;
pub const FEATURE_REPORT_FIRMWARE_INFO_SIZE: usize = 64;
pub const FEATURE_REPORT_CALIBRATION: u8 = 0x05;
pub const FEATURE_REPORT_CALIBRATION_SIZE: usize = 41;

pub const INPUT_REPORT_USB: u8 = 0x01;
pub const INPUT_REPORT_USB_SIZE: usize = 64;
pub const INPUT_REPORT_USB_OFS: usize = 1;
pub const INPUT_REPORT_BT: u8 = 0x31;
pub const INPUT_REPORT_BT_SIZE: usize = 78;
pub const INPUT_REPORT_BT_OFS: usize = 2;
pub const OUTPUT_REPORT_USB: u8 = 0x02;
pub const OUTPUT_REPORT_USB_SIZE: usize = 63;
pub const OUTPUT_REPORT_USB_SHORT_SIZE: usize = 48;
pub const OUTPUT_REPORT_BT: u8 = 0x31;
pub const OUTPUT_REPORT_BT_SIZE: usize = 78;
/// Size of [SetStatePackedOutputData]
pub const OUTPUT_STATE_SIZE: usize = 47;

pub const INPUT_CRC32_SEED: u8 = 0xa1;
pub const OUTPUT_CRC32_SEED: u8 = 0xa2;
pub const FEATURE_CRC32_SEED: u8 = 0xa3;

pub const MIN_REPORT_FREQ: u32 = 25;
pub const MAX_REPORT_FREQ: u32 = 1000;

/// Resolution of the sensor timestamp in nanoseconds
pub const DELTA_TIME_NS: f64 = 333.0;

// DualSense hardware limits
pub const DS5_TOUCHPAD_WIDTH: u32 = 1920;
pub const DS5_TOUCHPAD_HEIGHT: u32 = 1080;

/// Timestamp reported before the first IMU sample arrives
pub const PREFILL_TIMESTAMP: u32 = 415068494;

/// The first four bytes are shared by every emulated controller, the fourth
/// is replaced by the controller id.
pub const MAC_ADDR: [u8; 6] = [0x74, 0xe7, 0xd6, 0x3a, 0x53, 0x35];

/// Lightbar colors written by host drivers while initializing. They are not
/// user choices and are never forwarded.
pub const SENTINEL_COLORS: [(u8, u8, u8); 3] = [
    // hid-playstation
    (0, 0, 128),
    // SDL
    (0, 0, 64),
    // SDL, offset by a byte
    (64, 0, 0),
];

pub const FIRMWARE_INFO_REPORT: [u8; FEATURE_REPORT_FIRMWARE_INFO_SIZE] = [
    0x20, 0x4a, 0x75, 0x6e, 0x20, 0x31, 0x39, 0x20, 0x32, 0x30, 0x32, 0x33, 0x31, 0x34, 0x3a, 0x34,
    0x37, 0x3a, 0x33, 0x34, 0x03, 0x00, 0x44, 0x00, 0x08, 0x02, 0x00, 0x01, 0x36, 0x00, 0x00, 0x01,
    0xc1, 0xc8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x54, 0x01, 0x00, 0x00,
    0x14, 0x00, 0x00, 0x00, 0x0b, 0x00, 0x01, 0x00, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// IMU calibration with zero bias and symmetric ranges
pub const CALIBRATION_REPORT: [u8; FEATURE_REPORT_CALIBRATION_SIZE] = [
    0x05, // report id
    0x00, 0x00, // gyro pitch bias
    0x00, 0x00, // gyro yaw bias
    0x00, 0x00, // gyro roll bias
    0x10, 0x27, 0xf0, 0xd8, // gyro pitch plus/minus
    0x10, 0x27, 0xf0, 0xd8, // gyro yaw plus/minus
    0x10, 0x27, 0xf0, 0xd8, // gyro roll plus/minus
    0xf4, 0x01, 0xf4, 0x01, // gyro speed plus/minus
    0x10, 0x27, 0xf0, 0xd8, // accel x plus/minus
    0x10, 0x27, 0xf0, 0xd8, // accel y plus/minus
    0x10, 0x27, 0xf0, 0xd8, // accel z plus/minus
    0x0b, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Pairing report carrying the MAC address of the controller. A non-zero
/// `controller_id` replaces the fourth MAC byte.
pub fn pairing_report(controller_id: u8) -> [u8; FEATURE_REPORT_PAIRING_INFO_SIZE] {
    let mac_byte = if controller_id == 0 {
        MAC_ADDR[3]
    } else {
        controller_id
    };
    [
        FEATURE_REPORT_PAIRING_INFO,
        MAC_ADDR[0],
        MAC_ADDR[1],
        MAC_ADDR[2],
        mac_byte,
        MAC_ADDR[4],
        MAC_ADDR[5],
        0x08,
        0x25,
        0x00,
        0x1e,
        0x00,
        0xee,
        0x74,
        0xd0,
        0xbc,
        0x00,
        0x00,
        0x00,
        0x00,
    ]
}

/// Reply to a GET_REPORT request, or `None` for unknown report ids
pub fn feature_report(report_id: u8, controller_id: u8, bluetooth: bool) -> Option<Vec<u8>> {
    let report = match report_id {
        FEATURE_REPORT_PAIRING_INFO => pairing_report(controller_id).to_vec(),
        FEATURE_REPORT_FIRMWARE_INFO => FIRMWARE_INFO_REPORT.to_vec(),
        FEATURE_REPORT_CALIBRATION => CALIBRATION_REPORT.to_vec(),
        _ => return None,
    };
    if bluetooth {
        return Some(sign_crc32_append(&report, FEATURE_CRC32_SEED));
    }
    Some(report)
}

fn crc32(seed: u8, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[seed]);
    hasher.update(data);
    hasher.finalize()
}

/// Overwrite the last four bytes of a Bluetooth report with its CRC
pub fn sign_crc32_inplace(buf: &mut [u8], seed: u8) {
    if buf.len() < 4 {
        return;
    }
    let body = buf.len() - 4;
    let crc = crc32(seed, &buf[..body]);
    buf[body..].copy_from_slice(&crc.to_le_bytes());
}

/// Return the report with its CRC appended
pub fn sign_crc32_append(buf: &[u8], seed: u8) -> Vec<u8> {
    let mut signed = buf.to_vec();
    signed.extend_from_slice(&crc32(seed, buf).to_le_bytes());
    signed
}

/// Check the trailing CRC of a Bluetooth report
pub fn verify_crc32(buf: &[u8], seed: u8) -> bool {
    if buf.len() < 4 {
        return false;
    }
    let body = buf.len() - 4;
    buf[body..] == crc32(seed, &buf[..body]).to_le_bytes()
}

/// Dpad direction of the hat axes
pub fn hat_direction(x: f64, y: f64) -> Direction {
    match (x, y) {
        (x, y) if y < -0.5 && x == 0.0 => Direction::North,
        (x, y) if y < -0.5 && x > 0.5 => Direction::NorthEast,
        (x, y) if y == 0.0 && x > 0.5 => Direction::East,
        (x, y) if y > 0.5 && x > 0.5 => Direction::SouthEast,
        (x, y) if y > 0.5 && x == 0.0 => Direction::South,
        (x, y) if y > 0.5 && x < -0.5 => Direction::SouthWest,
        (x, y) if y == 0.0 && x < -0.5 => Direction::West,
        (x, y) if y < -0.5 && x < -0.5 => Direction::NorthWest,
        _ => Direction::None,
    }
}

/// Write the hat direction into the low nibble of the dpad byte
pub fn patch_dpad(report: &mut [u8], ofs: usize, x: f64, y: f64) {
    if let Some(byte) = report.get_mut(ofs + 7) {
        *byte = (*byte & 0xf0) | hat_direction(x, y).to_primitive();
    }
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("unexpected output report id {0:#04x}")]
    InvalidReport(u8),
    #[error("output report is too short ({0} bytes)")]
    TooShort(usize),
    #[error("failed to unpack output report: {0}")]
    Unpack(#[from] PackingError),
}

/// Extract the state section of an output report written by the host.
///
/// Bluetooth reports carry a sequence tag after the report id when written
/// by the kernel. SDL omits it, in which case the next byte is 0x02.
pub fn parse_output_report(
    data: &[u8],
    bluetooth: bool,
) -> Result<SetStatePackedOutputData, OutputError> {
    let Some(&report_id) = data.first() else {
        return Err(OutputError::TooShort(0));
    };
    let expected = if bluetooth {
        OUTPUT_REPORT_BT
    } else {
        OUTPUT_REPORT_USB
    };
    if report_id != expected {
        return Err(OutputError::InvalidReport(report_id));
    }

    let skip = match (bluetooth, data.get(1)) {
        (false, _) => 1,
        (true, Some(0x02)) => 2,
        (true, _) => 3,
    };
    let Some(state) = data.get(skip..skip + OUTPUT_STATE_SIZE) else {
        return Err(OutputError::TooShort(data.len()));
    };
    Ok(SetStatePackedOutputData::unpack_from_slice(state)?)
}

/// Result of inspecting the lightbar section of an output report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightbarUpdate {
    Unchanged,
    /// Initialization color of a host driver
    Sentinel,
    Color(u8, u8, u8),
}

pub fn lightbar(state: &SetStatePackedOutputData) -> LightbarUpdate {
    if !state.allow_led_color {
        return LightbarUpdate::Unchanged;
    }
    let color = (state.led_red, state.led_green, state.led_blue);
    if SENTINEL_COLORS.contains(&color) {
        return LightbarUpdate::Sentinel;
    }
    // Steam dims the lightbar to near zero values instead of disabling it
    if color.0 < 3 && color.1 < 3 && color.2 < 3 {
        return LightbarUpdate::Color(0, 0, 0);
    }
    LightbarUpdate::Color(color.0, color.1, color.2)
}

/// Rumble magnitudes as (strong, weak) in [0, 1], or `None` if the report
/// does not set rumble. The compatibility encoding only reaches half scale.
pub fn rumble(state: &SetStatePackedOutputData) -> Option<(f32, f32)> {
    if !state.enable_rumble_emulation && !state.enable_improved_rumble_emulation {
        return None;
    }
    let scale = if state.enable_rumble_emulation { 2.0 } else { 1.0 };
    let strong = (state.rumble_emulation_left as f32 / 255.0 * scale).min(1.0);
    let weak = (state.rumble_emulation_right as f32 / 255.0 * scale).min(1.0);
    Some((strong, weak))
}
