//! Vendor protocol of the MSI Claw controller. Commands are written to the
//! vendor hidraw interface, zero padded to [COMMAND_SIZE].

/// Vendor ID
pub const VID: u16 = 0x0db0;

/// Product IDs, one per controller mode
pub const PID_XINPUT: u16 = 0x1901;
pub const PID_DINPUT: u16 = 0x1902;
/// Firmware test mode. The controller ignores led commands.
pub const PID_TEST: u16 = 0x1903;
pub const PIDS: [u16; 3] = [PID_XINPUT, PID_DINPUT, PID_TEST];

/// Usage pages of the vendor interfaces
pub const USAGE_PAGES: [u16; 3] = [0xfff0, 0xff00, 0xffa0];

pub const COMMAND_SIZE: usize = 64;

/// Vendor command header, followed by the opcode
const HEADER: [u8; 4] = [0x0f, 0x00, 0x00, 0x3c];
const OP_WRITE_PROFILE: u8 = 0x21;
const OP_SYNC_ROM: u8 = 0x22;
const OP_SET_MODE: u8 = 0x24;

/// Controller mode selected through [set_mode]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Xinput = 0x01,
    Dinput = 0x02,
    Msi = 0x03,
    Desktop = 0x04,
}

/// Profile addresses of a firmware. They moved in firmware 1.66.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileAddresses {
    pub rgb: [u8; 2],
    pub m1: [u8; 2],
    pub m2: [u8; 2],
}

pub const ADDR_0163: ProfileAddresses = ProfileAddresses {
    rgb: [0x01, 0xfa],
    m1: [0x00, 0x7a],
    m2: [0x01, 0x1f],
};

pub const ADDR_0166: ProfileAddresses = ProfileAddresses {
    rgb: [0x02, 0x4a],
    m1: [0x00, 0xba],
    m2: [0x01, 0x63],
};

impl ProfileAddresses {
    /// Addresses for the firmware with the given bcd release number
    pub fn for_release(release: u16) -> Self {
        let major = release >> 8;
        let newer = match major {
            0 => false,
            1 => release >= 0x0166,
            2 => release >= 0x0217,
            _ => true,
        };
        if newer {
            ADDR_0166
        } else {
            ADDR_0163
        }
    }
}

fn command(body: &[u8]) -> Vec<u8> {
    let mut cmd = Vec::with_capacity(COMMAND_SIZE);
    cmd.extend_from_slice(&HEADER);
    cmd.extend_from_slice(body);
    cmd.resize(COMMAND_SIZE.max(cmd.len()), 0);
    cmd
}

pub fn set_mode(mode: Mode) -> Vec<u8> {
    command(&[OP_SET_MODE, mode as u8, 0x00])
}

/// Persist the written profile
pub fn sync_rom() -> Vec<u8> {
    command(&[OP_SYNC_ROM])
}

/// Map a back button to a dinput button so it can be told apart
pub fn map_back_button(addr: [u8; 2]) -> Vec<u8> {
    command(&[
        OP_WRITE_PROFILE,
        0x01,
        addr[0],
        addr[1],
        0x05,
        0x01,
        0x00,
        0x00,
        0x12,
        0x00,
    ])
}

/// Solid color on all 9 zones. Brightness is in [0, 1].
pub fn set_rgb(addr: &ProfileAddresses, brightness: f32, color: (u8, u8, u8)) -> Vec<u8> {
    let brightness = (brightness.clamp(0.0, 1.0) * 100.0) as u8;
    let mut body = vec![
        OP_WRITE_PROFILE,
        0x01,
        addr.rgb[0],
        addr.rgb[1],
        // Length of the rest
        0x20,
        // Index, frame count, effect, speed
        0x00,
        0x01,
        0x09,
        0x03,
        brightness,
    ];
    for _ in 0..9 {
        body.extend_from_slice(&[color.0, color.1, color.2]);
    }
    command(&body)
}

/// Output report driving the rumble motors, values in [0, 1]
pub fn rumble(strong: f32, weak: f32) -> [u8; 11] {
    let scale = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
    [0x05, 0x01, 0x00, 0x00, scale(weak), scale(strong), 0, 0, 0, 0, 0]
}
