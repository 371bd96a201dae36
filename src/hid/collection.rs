use std::fmt::Display;

/// Type of a HID collection as carried by the Collection main item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionType {
    Physical,
    Application,
    Logical,
    Report,
    NamedArray,
    UsageSwitch,
    UsageModifier,
    Reserved(u8),
    Vendor(u8),
}

impl CollectionType {
    pub fn from_value(value: u32) -> Self {
        match value {
            0x00 => Self::Physical,
            0x01 => Self::Application,
            0x02 => Self::Logical,
            0x03 => Self::Report,
            0x04 => Self::NamedArray,
            0x05 => Self::UsageSwitch,
            0x06 => Self::UsageModifier,
            0x80..=0xFF => Self::Vendor(value as u8),
            v => Self::Reserved(v as u8),
        }
    }

    pub fn value(&self) -> u32 {
        match *self {
            Self::Physical => 0x00,
            Self::Application => 0x01,
            Self::Logical => 0x02,
            Self::Report => 0x03,
            Self::NamedArray => 0x04,
            Self::UsageSwitch => 0x05,
            Self::UsageModifier => 0x06,
            Self::Reserved(v) => v as u32,
            Self::Vendor(v) => v as u32,
        }
    }

    /// Parse the name written by [Display]. Numeric values are accepted too.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let kind = match name.to_lowercase().as_str() {
            "physical" => Self::Physical,
            "application" => Self::Application,
            "logical" => Self::Logical,
            "report" => Self::Report,
            "named array" => Self::NamedArray,
            "usage switch" => Self::UsageSwitch,
            "usage modifier" => Self::UsageModifier,
            _ => {
                let value = match name.strip_prefix("0x") {
                    Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                    None => name.parse().ok()?,
                };
                return Some(Self::from_value(value));
            }
        };
        Some(kind)
    }
}

impl Display for CollectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Physical => write!(f, "Physical"),
            Self::Application => write!(f, "Application"),
            Self::Logical => write!(f, "Logical"),
            Self::Report => write!(f, "Report"),
            Self::NamedArray => write!(f, "Named Array"),
            Self::UsageSwitch => write!(f, "Usage Switch"),
            Self::UsageModifier => write!(f, "Usage Modifier"),
            Self::Reserved(v) | Self::Vendor(v) => write!(f, "0x{v:02x}"),
        }
    }
}
