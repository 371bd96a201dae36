pub mod driver;
pub mod hid_report;

/// Vendor ID
pub const VID: u16 = 0x17ef;

/// Product IDs, one per controller mode selected on the device
pub const PID_XINPUT: u16 = 0x6182;
pub const PID_DINPUT: u16 = 0x6183;
pub const PID_DUAL_DINPUT: u16 = 0x6184;
pub const PID_FPS: u16 = 0x6185;
pub const PIDS: [u16; 4] = [PID_XINPUT, PID_DINPUT, PID_DUAL_DINPUT, PID_FPS];

/// Vendor interface that carries the full controller state
pub const USAGE_PAGE: u16 = 0xffa0;
pub const USAGE: u16 = 0x0001;
pub const REPORT_ID: u8 = 0x74;
pub const REPORT_SIZE: usize = 64;
