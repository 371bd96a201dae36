//! DMI data of the running system, used to detect the handheld model
use std::{fs, path::Path};

use procfs::{CpuInfo, Current};

use self::data::DmiData;

pub mod data;

pub const DMI_PATH: &str = "/sys/devices/virtual/dmi/id";

/// Returns DMI data from the system
pub fn get_dmi_data() -> DmiData {
    let mut data = read_dmi_data(Path::new(DMI_PATH));
    data.cpu_vendor = get_cpu_vendor().unwrap_or_default();
    data
}

/// Read the DMI properties under `root`. Missing properties are empty.
pub fn read_dmi_data(root: &Path) -> DmiData {
    let get = |name: &str| get_dmi_property(root, name);
    DmiData {
        sys_vendor: get("sys_vendor"),
        product_name: get("product_name"),
        product_family: get("product_family"),
        product_version: get("product_version"),
        board_vendor: get("board_vendor"),
        board_name: get("board_name"),
        bios_version: get("bios_version"),
        cpu_vendor: String::new(),
    }
}

/// Returns the vendor of the first CPU, e.g. "AuthenticAMD"
pub fn get_cpu_vendor() -> Option<String> {
    match CpuInfo::current() {
        Ok(info) => info.get_field(0, "vendor_id").map(str::to_string),
        Err(e) => {
            log::debug!("Unable to read cpu info: {e}");
            None
        }
    }
}

/// Read the given DMI property
fn get_dmi_property(root: &Path, name: &str) -> String {
    fs::read_to_string(root.join(name))
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{data::DmiMatch, *};

    #[test]
    fn reads_and_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sys_vendor"), "LENOVO\n").unwrap();
        fs::write(dir.path().join("product_name"), "83E1\n").unwrap();

        let data = read_dmi_data(dir.path());
        assert_eq!(data.sys_vendor, "LENOVO");
        assert_eq!(data.product_name, "83E1");
        assert_eq!(data.board_name, "");

        let matcher = DmiMatch {
            sys_vendor: Some("LENOVO"),
            product_name: Some("83E1"),
            ..Default::default()
        };
        assert!(matcher.matches(&data));
        let matcher = DmiMatch {
            product_name: Some("83[LNQ][236]"),
            ..Default::default()
        };
        assert!(!matcher.matches(&data));
        assert!(DmiMatch::default().matches(&data));
    }
}
