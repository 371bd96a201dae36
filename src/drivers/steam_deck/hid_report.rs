//! Packed reports of the Steam Deck controller. Layouts follow the opensd
//! project and the kernel's hid-steam driver; bytes without a field pack as
//! zero.
use packed_struct::prelude::*;

// Input report axis ranges. The hardware y axes are inverted.
pub const STICK_X_MIN: f64 = -32767.0;
pub const STICK_X_MAX: f64 = 32767.0;
pub const STICK_Y_MIN: f64 = 32767.0;
pub const STICK_Y_MAX: f64 = -32767.0;
pub const PAD_X_MIN: f64 = -32767.0;
pub const PAD_X_MAX: f64 = 32767.0;
pub const PAD_Y_MIN: f64 = 32767.0;
pub const PAD_Y_MAX: f64 = -32767.0;
pub const PAD_FORCE_MAX: f64 = 32767.0;
pub const TRIGG_MAX: f64 = 32767.0;

/// Command ids of the feature report protocol, the first byte of a feature
/// report. Steam sends more commands than these; the rest are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    InputData = 0x09,
    SetMappings = 0x80,
    ClearMappings = 0x81,
    GetAttributesValues = 0x83,
    DefaultMappings = 0x85,
    WriteRegister = 0x87,
    ClearRegister = 0x88,
    SetMode = 0x8d,
    GetStringAttribute = 0xae,
    GetChipId = 0xba,
    TriggerHapticCommand = 0xea,
    TriggerRumbleCommand = 0xeb,
}

impl TryFrom<u8> for ReportType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let kind = match value {
            0x09 => Self::InputData,
            0x80 => Self::SetMappings,
            0x81 => Self::ClearMappings,
            0x83 => Self::GetAttributesValues,
            0x85 => Self::DefaultMappings,
            0x87 => Self::WriteRegister,
            0x88 => Self::ClearRegister,
            0x8d => Self::SetMode,
            0xae => Self::GetStringAttribute,
            0xba => Self::GetChipId,
            0xea => Self::TriggerHapticCommand,
            0xeb => Self::TriggerRumbleCommand,
            other => return Err(other),
        };
        Ok(kind)
    }
}

/// Input report 0x09, 64 bytes
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "64")]
pub struct PackedInputDataReport {
    #[packed_field(bytes = "0")]
    pub major_ver: u8,
    #[packed_field(bytes = "1")]
    pub minor_ver: u8,
    #[packed_field(bytes = "2")]
    pub report_type: u8,
    #[packed_field(bytes = "3")]
    pub report_size: u8,
    #[packed_field(bytes = "4..=7", endian = "lsb")]
    pub frame: Integer<u32, packed_bits::Bits<32>>,

    // byte 8
    #[packed_field(bits = "64")]
    pub a: bool,
    #[packed_field(bits = "65")]
    pub x: bool,
    #[packed_field(bits = "66")]
    pub b: bool,
    #[packed_field(bits = "67")]
    pub y: bool,
    #[packed_field(bits = "68")]
    pub l1: bool,
    #[packed_field(bits = "69")]
    pub r1: bool,
    /// Digital trigger clicks
    #[packed_field(bits = "70")]
    pub l2: bool,
    #[packed_field(bits = "71")]
    pub r2: bool,

    // byte 9
    #[packed_field(bits = "72")]
    pub l5: bool,
    #[packed_field(bits = "73")]
    pub menu: bool,
    #[packed_field(bits = "74")]
    pub steam: bool,
    #[packed_field(bits = "75")]
    pub options: bool,
    #[packed_field(bits = "76")]
    pub down: bool,
    #[packed_field(bits = "77")]
    pub left: bool,
    #[packed_field(bits = "78")]
    pub right: bool,
    #[packed_field(bits = "79")]
    pub up: bool,

    // byte 10
    #[packed_field(bits = "81")]
    pub l3: bool,
    #[packed_field(bits = "83")]
    pub r_pad_touch: bool,
    #[packed_field(bits = "85")]
    pub r_pad_press: bool,
    #[packed_field(bits = "87")]
    pub r5: bool,

    #[packed_field(bits = "93")]
    pub r3: bool,
    #[packed_field(bits = "109")]
    pub r4: bool,
    #[packed_field(bits = "110")]
    pub l4: bool,
    #[packed_field(bits = "117")]
    pub quick_access: bool,

    // byte 16-23
    #[packed_field(bytes = "16..=17", endian = "lsb")]
    pub l_pad_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "18..=19", endian = "lsb")]
    pub l_pad_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "20..=21", endian = "lsb")]
    pub r_pad_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "22..=23", endian = "lsb")]
    pub r_pad_y: Integer<i16, packed_bits::Bits<16>>,

    // byte 24-35
    #[packed_field(bytes = "24..=25", endian = "lsb")]
    pub accel_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "26..=27", endian = "lsb")]
    pub accel_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "28..=29", endian = "lsb")]
    pub accel_z: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "30..=31", endian = "lsb")]
    pub pitch: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "32..=33", endian = "lsb")]
    pub yaw: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "34..=35", endian = "lsb")]
    pub roll: Integer<i16, packed_bits::Bits<16>>,

    // byte 44-55
    #[packed_field(bytes = "44..=45", endian = "lsb")]
    pub l_trigg: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "46..=47", endian = "lsb")]
    pub r_trigg: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "48..=49", endian = "lsb")]
    pub l_stick_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "50..=51", endian = "lsb")]
    pub l_stick_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "52..=53", endian = "lsb")]
    pub r_stick_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "54..=55", endian = "lsb")]
    pub r_stick_y: Integer<i16, packed_bits::Bits<16>>,

    #[packed_field(bytes = "58..=59", endian = "lsb")]
    pub r_pad_force: Integer<u16, packed_bits::Bits<16>>,
}

impl PackedInputDataReport {
    pub fn new() -> Self {
        let zero = || Integer::from_primitive(0);
        PackedInputDataReport {
            major_ver: 0x01,
            minor_ver: 0x00,
            report_type: ReportType::InputData as u8,
            report_size: 64,
            frame: Integer::from_primitive(0),
            a: false,
            x: false,
            b: false,
            y: false,
            l1: false,
            r1: false,
            l2: false,
            r2: false,
            l5: false,
            menu: false,
            steam: false,
            options: false,
            down: false,
            left: false,
            right: false,
            up: false,
            l3: false,
            r_pad_touch: false,
            r_pad_press: false,
            r5: false,
            r3: false,
            r4: false,
            l4: false,
            quick_access: false,
            l_pad_x: zero(),
            l_pad_y: zero(),
            r_pad_x: zero(),
            r_pad_y: zero(),
            accel_x: zero(),
            accel_y: zero(),
            accel_z: zero(),
            pitch: zero(),
            yaw: zero(),
            roll: zero(),
            l_trigg: Integer::from_primitive(0),
            r_trigg: Integer::from_primitive(0),
            l_stick_x: zero(),
            l_stick_y: zero(),
            r_stick_x: zero(),
            r_stick_y: zero(),
            r_pad_force: Integer::from_primitive(0),
        }
    }
}

impl Default for PackedInputDataReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Debug)]
pub enum PadSide {
    Left = 0,
    Right = 1,
    Both = 2,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Debug)]
pub enum Intensity {
    Default = 0,
    Short = 1,
    Medium = 2,
    Long = 3,
    Insane = 4,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Debug)]
pub enum CommandType {
    Off = 0,
    Tick = 1,
    Click = 2,
}

/// Command 0xeb
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "64")]
pub struct PackedRumbleReport {
    #[packed_field(bytes = "0")]
    pub cmd_id: u8,
    #[packed_field(bytes = "1")]
    pub report_size: u8,
    #[packed_field(bytes = "5..=6", endian = "lsb")]
    pub left_speed: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "7..=8", endian = "lsb")]
    pub right_speed: Integer<u16, packed_bits::Bits<16>>,
}

impl PackedRumbleReport {
    pub fn new() -> Self {
        Self {
            cmd_id: ReportType::TriggerRumbleCommand as u8,
            report_size: 9,
            left_speed: Integer::from_primitive(0),
            right_speed: Integer::from_primitive(0),
        }
    }
}

impl Default for PackedRumbleReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Command 0xea, a trackpad haptic pulse
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "64")]
pub struct PackedHapticReport {
    #[packed_field(bytes = "0")]
    pub cmd_id: u8,
    #[packed_field(bytes = "1")]
    pub report_size: u8,
    #[packed_field(bytes = "2", ty = "enum")]
    pub side: PadSide,
    #[packed_field(bytes = "3", ty = "enum")]
    pub cmd_type: CommandType,
    #[packed_field(bytes = "4", ty = "enum")]
    pub intensity: Intensity,
    #[packed_field(bytes = "5")]
    pub gain: i8,
}

impl PackedHapticReport {
    pub fn new() -> Self {
        Self {
            cmd_id: ReportType::TriggerHapticCommand as u8,
            report_size: 13,
            side: PadSide::Left,
            cmd_type: CommandType::Off,
            intensity: Intensity::Default,
            gain: 0,
        }
    }
}

impl Default for PackedHapticReport {
    fn default() -> Self {
        Self::new()
    }
}
