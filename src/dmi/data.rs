use glob_match::glob_match;
use serde::Serialize;
use tabled::Tabled;

/// Container for system DMI data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Tabled)]
pub struct DmiData {
    pub sys_vendor: String,
    pub product_name: String,
    pub product_family: String,
    pub product_version: String,
    pub board_vendor: String,
    pub board_name: String,
    pub bios_version: String,
    pub cpu_vendor: String,
}

/// Glob patterns over DMI data. Unset fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DmiMatch {
    pub sys_vendor: Option<&'static str>,
    pub product_name: Option<&'static str>,
    pub board_name: Option<&'static str>,
    pub cpu_vendor: Option<&'static str>,
}

impl DmiMatch {
    pub fn matches(&self, data: &DmiData) -> bool {
        let fields = [
            (self.sys_vendor, data.sys_vendor.as_str()),
            (self.product_name, data.product_name.as_str()),
            (self.board_name, data.board_name.as_str()),
            (self.cpu_vendor, data.cpu_vendor.as_str()),
        ];
        fields
            .iter()
            .all(|(pattern, value)| pattern.map(|p| glob_match(p, value)).unwrap_or(true))
    }
}
