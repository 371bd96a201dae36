//! Packed DualSense reports. Only the fields the emulated controller
//! prefills or reads back are named; the remaining bytes pack as zero.
//! Layouts: https://controllers.fandom.com/wiki/Sony_DualSense
use packed_struct::prelude::*;

use super::driver::{INPUT_REPORT_BT, INPUT_REPORT_USB, OUTPUT_REPORT_USB, PREFILL_TIMESTAMP};

/// Hat switch values of byte 7
#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Debug, Default)]
pub enum Direction {
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
    #[default]
    None = 8,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Debug, Default)]
pub enum ChargeState {
    #[default]
    Discharging = 0x00,
    Charging = 0x01,
    Full = 0x02,
}

/// One touch point. Coordinates are 12 bit, split across bytes 1 to 3.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct TouchPoint {
    /// Bit 7 set while lifted, low bits are the touch counter
    #[packed_field(bytes = "0")]
    pub context: u8,
    #[packed_field(bytes = "1")]
    pub x_lo: u8,
    #[packed_field(bits = "16..=19")]
    pub y_lo: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "20..=23")]
    pub x_hi: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bytes = "3")]
    pub y_hi: u8,
}

impl Default for TouchPoint {
    fn default() -> Self {
        Self {
            context: 0x80,
            x_lo: 0,
            y_lo: Integer::from_primitive(0),
            x_hi: Integer::from_primitive(0),
            y_hi: 0,
        }
    }
}

impl TouchPoint {
    pub fn is_touching(&self) -> bool {
        self.context & 0x80 == 0
    }

    pub fn x(&self) -> u16 {
        (self.x_hi.to_primitive() as u16) << 8 | self.x_lo as u16
    }

    pub fn y(&self) -> u16 {
        (self.y_hi as u16) << 4 | self.y_lo.to_primitive() as u16
    }

    pub fn set_x(&mut self, x: u16) {
        self.x_lo = (x & 0xff) as u8;
        self.x_hi = Integer::from_primitive(((x >> 8) & 0x0f) as u8);
    }

    pub fn set_y(&mut self, y: u16) {
        self.y_lo = Integer::from_primitive((y & 0x0f) as u8);
        self.y_hi = ((y >> 4) & 0xff) as u8;
    }
}

/// Input state shared by the USB and Bluetooth reports
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "63")]
pub struct InputState {
    #[packed_field(bytes = "0")]
    pub left_x: u8,
    #[packed_field(bytes = "1")]
    pub left_y: u8,
    #[packed_field(bytes = "2")]
    pub right_x: u8,
    #[packed_field(bytes = "3")]
    pub right_y: u8,
    #[packed_field(bytes = "4")]
    pub l2: u8,
    #[packed_field(bytes = "5")]
    pub r2: u8,
    #[packed_field(bytes = "6")]
    pub seq_number: u8,
    #[packed_field(bits = "60..=63", ty = "enum")]
    pub dpad: Direction,

    #[packed_field(bytes = "15..=16", endian = "lsb")]
    pub gyro_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "17..=18", endian = "lsb")]
    pub gyro_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "19..=20", endian = "lsb")]
    pub gyro_z: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "21..=22", endian = "lsb")]
    pub accel_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "23..=24", endian = "lsb")]
    pub accel_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "25..=26", endian = "lsb")]
    pub accel_z: Integer<i16, packed_bits::Bits<16>>,
    /// In units of [super::driver::DELTA_TIME_NS]
    #[packed_field(bytes = "27..=30", endian = "lsb")]
    pub sensor_timestamp: Integer<u32, packed_bits::Bits<32>>,

    #[packed_field(bytes = "32..=35")]
    pub touch_0: TouchPoint,
    #[packed_field(bytes = "36..=39")]
    pub touch_1: TouchPoint,

    #[packed_field(bits = "416..=419", ty = "enum")]
    pub charge: ChargeState,
    /// Tenths of the battery capacity, 0 to 10
    #[packed_field(bits = "420..=423")]
    pub battery: Integer<u8, packed_bits::Bits<4>>,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            left_x: 0x80,
            left_y: 0x80,
            right_x: 0x80,
            right_y: 0x80,
            l2: 0,
            r2: 0,
            seq_number: 0,
            dpad: Direction::None,
            gyro_x: Integer::from_primitive(0),
            gyro_y: Integer::from_primitive(0),
            gyro_z: Integer::from_primitive(0),
            accel_x: Integer::from_primitive(0),
            accel_y: Integer::from_primitive(0),
            accel_z: Integer::from_primitive(0),
            sensor_timestamp: Integer::from_primitive(PREFILL_TIMESTAMP),
            touch_0: TouchPoint::default(),
            touch_1: TouchPoint::default(),
            charge: ChargeState::Discharging,
            // 85% until a battery event arrives
            battery: Integer::from_primitive(8),
        }
    }
}

impl InputState {
    pub fn has_touches(&self) -> bool {
        self.touch_0.is_touching() || self.touch_1.is_touching()
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "64")]
pub struct UsbInputReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1..=63")]
    pub state: InputState,
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "78")]
pub struct BluetoothInputReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    /// Upper nibble is the sequence number
    #[packed_field(bits = "8..=11")]
    pub seq_number: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "15")]
    pub has_hid: bool,
    #[packed_field(bytes = "2..=64")]
    pub state: InputState,
}

/// Input report of either transport, as first sent after creating the device
#[derive(Debug, Copy, Clone)]
pub enum PackedInputDataReport {
    Usb(UsbInputReport),
    Bluetooth(BluetoothInputReport),
}

impl PackedInputDataReport {
    /// Report with centered sticks, no touches and a neutral dpad
    pub fn template(bluetooth: bool) -> Self {
        if bluetooth {
            Self::Bluetooth(BluetoothInputReport {
                report_id: INPUT_REPORT_BT,
                seq_number: Integer::from_primitive(0),
                has_hid: true,
                state: InputState::default(),
            })
        } else {
            Self::Usb(UsbInputReport {
                report_id: INPUT_REPORT_USB,
                state: InputState::default(),
            })
        }
    }

    pub fn pack_to_vec(&self) -> Result<Vec<u8>, PackingError> {
        match self {
            Self::Usb(report) => Ok(report.pack()?.to_vec()),
            Self::Bluetooth(report) => Ok(report.pack()?.to_vec()),
        }
    }

    pub fn state(&self) -> &InputState {
        match self {
            Self::Usb(report) => &report.state,
            Self::Bluetooth(report) => &report.state,
        }
    }
}

/// Set-state section of an output report written by the host
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "47")]
pub struct SetStatePackedOutputData {
    /// Compatibility rumble, half scale
    #[packed_field(bits = "7")]
    pub enable_rumble_emulation: bool,
    #[packed_field(bits = "13")]
    pub allow_led_color: bool,
    #[packed_field(bytes = "2")]
    pub rumble_emulation_right: u8,
    #[packed_field(bytes = "3")]
    pub rumble_emulation_left: u8,
    #[packed_field(bits = "309")]
    pub enable_improved_rumble_emulation: bool,
    #[packed_field(bytes = "44")]
    pub led_red: u8,
    #[packed_field(bytes = "45")]
    pub led_green: u8,
    #[packed_field(bytes = "46")]
    pub led_blue: u8,
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "63")]
pub struct UsbPackedOutputReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1..=47")]
    pub state: SetStatePackedOutputData,
}

impl Default for UsbPackedOutputReport {
    fn default() -> Self {
        Self {
            report_id: OUTPUT_REPORT_USB,
            state: Default::default(),
        }
    }
}
