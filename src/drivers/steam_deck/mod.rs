pub mod driver;
pub mod hid_report;
pub mod report_descriptor;

/// Product ids reported by the emulated controller, used by SDL and Steam
/// to pick the controller layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductId {
    SteamDeck = 0x1205,
    Generic = 0x12f0,
    LenovoLegionGo = 0x12fe,
}

/// Vendor ID
pub const VID: u16 = 0x28de;

impl ProductId {
    pub fn to_u16(&self) -> u16 {
        *self as u16
    }
}
