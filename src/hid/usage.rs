//! HID usage tables loaded from the `.hut` files shipped with the crate.
//!
//! The format is one page header followed by its usages:
//!
//! ```text
//! (01)	Generic Desktop
//! 30	X
//! 31	Y
//! ```
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    sync::OnceLock,
};

const HUT_FILES: &[&str] = &[
    include_str!("hut/01_generic_desktop.hut"),
    include_str!("hut/02_simulation.hut"),
    include_str!("hut/05_game.hut"),
    include_str!("hut/06_generic_device.hut"),
    include_str!("hut/07_keyboard.hut"),
    include_str!("hut/08_led.hut"),
    include_str!("hut/0c_consumer.hut"),
    include_str!("hut/0d_digitizers.hut"),
    include_str!("hut/0f_pid.hut"),
    include_str!("hut/20_sensor.hut"),
    include_str!("hut/84_power_device.hut"),
    include_str!("hut/85_battery_system.hut"),
];

pub const BUTTON_PAGE: u16 = 0x09;
pub const ORDINAL_PAGE: u16 = 0x0A;
pub const DIGITIZER_PAGE: u16 = 0x0D;

/// Usages that may legally exceed their logical range when encoded
pub const CONTACT_ID: u32 = 0x000D_0051;
pub const CONTACT_COUNT: u32 = 0x000D_0054;
pub const CONTACT_MAX: u32 = 0x000D_0055;

/// Usage reported by Windows 8 certified touch devices in a Feature report
pub const WIN8_BLOB: u32 = 0xFF00_00C5;

/// A single named usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub page_id: u16,
    pub id: u16,
    pub name: String,
}

impl Usage {
    /// The full 32 bit usage: page in the high half, id in the low half
    pub fn usage(&self) -> u32 {
        (self.page_id as u32) << 16 | self.id as u32
    }
}

impl Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A usage page with its usages, addressable by id or by name
#[derive(Debug, Clone, Default)]
pub struct UsagePage {
    pub page_id: u16,
    pub name: String,
    usages: BTreeMap<u16, Usage>,
    by_name: HashMap<String, u16>,
}

impl UsagePage {
    fn new(page_id: u16, name: &str) -> Self {
        Self {
            page_id,
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn insert(&mut self, id: u16, name: &str) {
        self.by_name.insert(name.to_string(), id);
        self.usages.insert(
            id,
            Usage {
                page_id: self.page_id,
                id,
                name: name.to_string(),
            },
        );
    }

    pub fn get(&self, id: u16) -> Option<&Usage> {
        self.usages.get(&id)
    }

    pub fn from_name(&self, name: &str) -> Option<&Usage> {
        let id = self.by_name.get(name)?;
        self.usages.get(id)
    }

    pub fn usages(&self) -> impl Iterator<Item = &Usage> {
        self.usages.values()
    }
}

/// The complete set of usage tables
#[derive(Debug, Default)]
pub struct UsageTables {
    pages: BTreeMap<u16, UsagePage>,
}

impl UsageTables {
    /// Parse a set of `.hut` documents. Ranges and reserved rows are skipped.
    pub fn parse(files: &[&str]) -> Self {
        let mut pages = BTreeMap::new();
        for file in files {
            let mut current: Option<UsagePage> = None;
            for line in file.lines() {
                let line = line.trim_end();
                if line.is_empty() || line.to_lowercase().contains("reserved") {
                    continue;
                }
                let Some((id, name)) = line.split_once('\t') else {
                    log::trace!("Skipping usage table line: {line}");
                    continue;
                };
                if let Some(page) = id.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
                    if let Some(page) = current.take() {
                        pages.insert(page.page_id, page);
                    }
                    let Ok(page_id) = u16::from_str_radix(page, 16) else {
                        continue;
                    };
                    current = Some(UsagePage::new(page_id, name.trim()));
                    continue;
                }
                if id.contains(':') {
                    continue;
                }
                let (Some(page), Ok(id)) = (current.as_mut(), u16::from_str_radix(id, 16)) else {
                    continue;
                };
                page.insert(id, name.trim());
            }
            if let Some(page) = current.take() {
                pages.insert(page.page_id, page);
            }
        }

        // The button and ordinal pages are generated
        let mut buttons = UsagePage::new(BUTTON_PAGE, "Button");
        buttons.insert(0, "No Button Pressed");
        let mut ordinals = UsagePage::new(ORDINAL_PAGE, "Ordinal");
        for i in 1..=0x3FF {
            buttons.insert(i, &format!("B{i}"));
            ordinals.insert(i, &format!("Instance {i}"));
        }
        pages.insert(BUTTON_PAGE, buttons);
        pages.insert(ORDINAL_PAGE, ordinals);

        Self { pages }
    }

    pub fn page(&self, page_id: u16) -> Option<&UsagePage> {
        self.pages.get(&page_id)
    }

    pub fn page_from_name(&self, name: &str) -> Option<&UsagePage> {
        self.pages.values().find(|page| page.name == name)
    }

    /// Look up a full 32 bit usage
    pub fn usage(&self, usage: u32) -> Option<&Usage> {
        self.page((usage >> 16) as u16)?.get(usage as u16)
    }

    /// Human readable name of the given usage page
    pub fn page_name(&self, page_id: u16) -> String {
        match self.page(page_id) {
            Some(page) => page.name.clone(),
            None => format!("Vendor Defined Page 0x{page_id:04X}"),
        }
    }

    /// Human readable name of the given usage id within a page
    pub fn usage_name(&self, page_id: u16, id: u32) -> String {
        if id <= 0xFFFF {
            if let Some(usage) = self.page(page_id).and_then(|p| p.get(id as u16)) {
                return usage.name.clone();
            }
        }
        format!("Vendor Usage 0x{id:04X}")
    }

    pub fn pages(&self) -> impl Iterator<Item = &UsagePage> {
        self.pages.values()
    }
}

/// Returns the process wide usage tables, loading them on first use
pub fn hut() -> &'static UsageTables {
    static TABLES: OnceLock<UsageTables> = OnceLock::new();
    TABLES.get_or_init(|| UsageTables::parse(HUT_FILES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_pages() {
        let hut = hut();
        let desktop = hut.page(0x01).unwrap();
        assert_eq!(desktop.name, "Generic Desktop");
        assert_eq!(desktop.get(0x05).unwrap().name, "Game Pad");
        assert_eq!(desktop.from_name("Hat switch").unwrap().id, 0x39);
        assert_eq!(hut.usage(0x0009_0003).unwrap().name, "B3");
        assert_eq!(hut.usage(CONTACT_ID).unwrap().name, "Contact Id");
        assert_eq!(hut.page_name(0xFF00), "Vendor Defined Page 0xFF00");
        assert_eq!(hut.usage_name(0xFF00, 0x21), "Vendor Usage 0x0021");
    }

    #[test]
    fn skips_ranges_and_reserved() {
        let tables = UsageTables::parse(&["(42)\tTest\n01\tOne\n02:0F\tRange\n10\tReserved\n11\tEleven\n"]);
        let page = tables.page(0x42).unwrap();
        assert_eq!(page.usages().count(), 2);
        assert!(page.get(0x10).is_none());
        assert_eq!(page.get(0x11).unwrap().name, "Eleven");
    }

    #[test]
    fn names_are_unique_per_page() {
        for page in hut().pages() {
            for usage in page.usages() {
                assert_eq!(page.from_name(&usage.name).map(|u| u.id), Some(usage.id));
            }
        }
    }
}
