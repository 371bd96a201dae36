//! Battery charge limit, charge bypass and low battery alarm
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::config::ChargeBypass;

use super::{read_attr, read_int, write_attr, PowerError};

/// Charge limits accepted by the firmware, in percent
pub const CHARGE_LIMITS: [u8; 7] = [65, 70, 80, 85, 90, 95, 100];
/// Battery level that triggers hibernation, in percent
pub const BATTERY_LOW_THRESHOLD: i64 = 5;

/// Returns the directory of the first battery under `power_supply`
pub fn find_battery(power_supply: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(power_supply)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("BAT"))
        })
        .collect();
    entries.sort();
    entries.into_iter().find(|path| {
        read_attr(&path.join("type"))
            .map(|kind| kind.contains("Battery"))
            .unwrap_or(false)
    })
}

/// File used for charge bypass
#[derive(Debug, Clone, PartialEq)]
enum BypassFile {
    /// `Standard | BypassS0 | Bypass`
    ChargeType(PathBuf),
    /// `auto | inhibit-charge-awake | inhibit-charge`
    ChargeBehaviour { path: PathBuf, awake: bool },
}

#[derive(Debug, Clone)]
pub struct Battery {
    dir: PathBuf,
    limit: Option<PathBuf>,
    bypass: Option<BypassFile>,
}

impl fmt::Display for Battery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} (limit: {}, bypass: {})",
            self.dir,
            self.limit.is_some(),
            self.bypass.is_some()
        )
    }
}

impl Battery {
    /// Find a battery with charge controls. `charge_type` bypass is only
    /// known to work on OneXPlayer devices.
    pub fn find(power_supply: &Path, sys_vendor: &str) -> Option<Self> {
        let dir = find_battery(power_supply)?;

        let limit = Some(dir.join("charge_control_end_threshold")).filter(|p| p.exists());

        let mut bypass = None;
        let charge_type = dir.join("charge_type");
        if charge_type.exists() {
            if sys_vendor.contains("ONE-NETBOOK") {
                bypass = Some(BypassFile::ChargeType(charge_type));
            } else {
                log::warn!("Found charge type, but charge bypass is only supported on OneXPlayer");
            }
        }
        let behaviour = dir.join("charge_behaviour");
        if behaviour.exists() {
            match read_attr(&behaviour) {
                Ok(choices) => {
                    bypass = Some(BypassFile::ChargeBehaviour {
                        path: behaviour,
                        awake: choices.contains("inhibit-charge-awake"),
                    })
                }
                Err(e) => log::error!("Failed to read charge behaviour: {e}"),
            }
        }

        Some(Self { dir, limit, bypass })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn supports_limit(&self) -> bool {
        self.limit.is_some()
    }

    pub fn supports_bypass(&self) -> bool {
        self.bypass.is_some()
    }

    /// Set the charge limit. 0 disables the limit.
    pub fn set_charge_limit(&self, limit: u8) -> Result<(), PowerError> {
        let Some(path) = self.limit.as_ref() else {
            return Err(PowerError::Unsupported("charge limit"));
        };
        let limit = if limit == 0 { 100 } else { limit };
        if !CHARGE_LIMITS.contains(&limit) {
            return Err(PowerError::InvalidValue(format!("charge limit {limit}")));
        }
        log::info!("Setting charge limit to {limit} %");
        write_attr(path, limit)
    }

    pub fn set_charge_bypass(&self, bypass: ChargeBypass) -> Result<(), PowerError> {
        let (path, value) = match self.bypass.as_ref() {
            None => return Err(PowerError::Unsupported("charge bypass")),
            Some(BypassFile::ChargeType(path)) => (
                path,
                match bypass {
                    ChargeBypass::Disabled => "Standard",
                    ChargeBypass::Awake => "BypassS0",
                    ChargeBypass::Always => "Bypass",
                },
            ),
            Some(BypassFile::ChargeBehaviour { path, awake }) => (
                path,
                match bypass {
                    ChargeBypass::Disabled => "auto",
                    ChargeBypass::Awake if *awake => "inhibit-charge-awake",
                    ChargeBypass::Awake => {
                        return Err(PowerError::Unsupported("charge bypass while awake"))
                    }
                    ChargeBypass::Always => "inhibit-charge",
                },
            ),
        };
        log::info!("Setting charge type to '{value}' (for bypass {bypass:?})");
        write_attr(path, value)
    }

    /// Charge level in percent
    pub fn capacity(&self) -> Result<i64, PowerError> {
        read_int(&self.dir.join("capacity"))
    }

    pub fn is_discharging(&self) -> Result<bool, PowerError> {
        Ok(read_attr(&self.dir.join("status"))?
            .to_lowercase()
            .contains("discharging"))
    }

    /// Point the firmware alarm slightly below the low battery threshold,
    /// so that the device wakes up to hibernate.
    pub fn set_alarm(&self) -> Result<(), PowerError> {
        let alarm = self.dir.join("alarm");
        if !alarm.exists() {
            return Ok(());
        }
        let energy_full = self.dir.join("energy_full");
        let full = if energy_full.exists() {
            read_int(&energy_full)?
        } else {
            read_int(&self.dir.join("charge_full"))?
        };
        let level = alarm_level(full);
        log::warn!("Setting battery alarm to {level}/{full} ({BATTERY_LOW_THRESHOLD}%)");
        write_attr(&alarm, level)
    }
}

/// Alarm level for a battery of the given capacity
pub fn alarm_level(full: i64) -> i64 {
    BATTERY_LOW_THRESHOLD * 85 * full / 100 / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery(files: &[(&str, &str)]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        // Not a battery
        let ac = dir.path().join("ACAD");
        fs::create_dir_all(&ac).unwrap();
        fs::write(ac.join("type"), "Mains\n").unwrap();

        let bat = dir.path().join("BAT1");
        fs::create_dir_all(&bat).unwrap();
        fs::write(bat.join("type"), "Battery\n").unwrap();
        for (name, content) in files {
            fs::write(bat.join(name), content).unwrap();
        }
        (dir, bat)
    }

    #[test]
    fn charge_limit() {
        let (dir, bat) = battery(&[("charge_control_end_threshold", "100\n")]);
        let battery = Battery::find(dir.path(), "LENOVO").unwrap();
        assert_eq!(battery.path(), bat);
        assert!(!battery.supports_bypass());

        battery.set_charge_limit(80).unwrap();
        assert_eq!(read_attr(&bat.join("charge_control_end_threshold")).unwrap(), "80");
        battery.set_charge_limit(0).unwrap();
        assert_eq!(read_attr(&bat.join("charge_control_end_threshold")).unwrap(), "100");
        assert!(matches!(
            battery.set_charge_limit(50),
            Err(PowerError::InvalidValue(_))
        ));
    }

    #[test]
    fn charge_type_bypass_needs_onexplayer() {
        let (dir, bat) = battery(&[("charge_type", "Standard\n")]);
        assert!(!Battery::find(dir.path(), "LENOVO").unwrap().supports_bypass());

        let battery = Battery::find(dir.path(), "ONE-NETBOOK").unwrap();
        battery.set_charge_bypass(ChargeBypass::Awake).unwrap();
        assert_eq!(read_attr(&bat.join("charge_type")).unwrap(), "BypassS0");
        battery.set_charge_bypass(ChargeBypass::Always).unwrap();
        assert_eq!(read_attr(&bat.join("charge_type")).unwrap(), "Bypass");
    }

    #[test]
    fn charge_behaviour_bypass() {
        let (dir, bat) = battery(&[("charge_behaviour", "[auto] inhibit-charge\n")]);
        let battery = Battery::find(dir.path(), "").unwrap();
        assert!(matches!(
            battery.set_charge_bypass(ChargeBypass::Awake),
            Err(PowerError::Unsupported(_))
        ));
        battery.set_charge_bypass(ChargeBypass::Always).unwrap();
        assert_eq!(read_attr(&bat.join("charge_behaviour")).unwrap(), "inhibit-charge");
        assert!(battery.set_charge_limit(80).is_err());
    }

    #[test]
    fn alarm_and_status() {
        let (dir, bat) = battery(&[
            ("alarm", "0\n"),
            ("energy_full", "50000000\n"),
            ("capacity", "4\n"),
            ("status", "Discharging\n"),
        ]);
        let battery = Battery::find(dir.path(), "").unwrap();
        battery.set_alarm().unwrap();
        assert_eq!(read_attr(&bat.join("alarm")).unwrap(), "2125000");
        assert_eq!(battery.capacity().unwrap(), 4);
        assert!(battery.is_discharging().unwrap());
    }
}
