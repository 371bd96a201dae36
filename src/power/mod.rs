//! Power collaborators: battery charging, TDP, fan curves, thermal watchdog
//! and hibernation. Every sysfs driver takes its root directory so it can
//! run against a fake tree.
pub mod battery;
pub mod fan;
pub mod hibernate;
pub mod platform;
pub mod tdp;
pub mod thermal;

use std::{fs, io, path::Path};

use thiserror::Error;

use crate::config::{BatteryConfig, Config, FanConfig, FanMode, TdpConfig};

use self::{battery::Battery, fan::FanCurve, tdp::MsiTdp};

/// Possible errors of the power collaborators
#[derive(Error, Debug)]
pub enum PowerError {
    #[error("sysfs access failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("'{0}' is not supported on this device")]
    Unsupported(&'static str),
    #[error("command '{cmd}' failed: {status}")]
    Command { cmd: String, status: String },
    #[error("unable to read system info: {0}")]
    Proc(#[from] procfs::ProcError),
}

/// Write a sysfs attribute
pub(crate) fn write_attr(path: &Path, value: impl std::fmt::Display) -> Result<(), PowerError> {
    log::debug!("Writing '{value}' to {path:?}");
    fs::write(path, format!("{value}\n"))?;
    Ok(())
}

/// Read a sysfs attribute, trimmed
pub(crate) fn read_attr(path: &Path) -> Result<String, PowerError> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

pub(crate) fn read_int(path: &Path) -> Result<i64, PowerError> {
    let value = read_attr(path)?;
    value
        .parse()
        .map_err(|_| PowerError::InvalidValue(format!("{value} in {path:?}")))
}

/// Applies the power sections of the config, only touching the hardware
/// when a section changed.
#[derive(Debug)]
pub struct PowerManager {
    battery: Option<Battery>,
    tdp: Option<MsiTdp>,
    fan: Option<FanCurve>,
    prev_battery: Option<BatteryConfig>,
    prev_tdp: Option<TdpConfig>,
    prev_fan: Option<FanConfig>,
    /// Untouched settings are left alone on the first apply
    startup: bool,
}

impl PowerManager {
    /// Probe the devices under the given sysfs root (usually "/")
    pub fn new(root: &Path, sys_vendor: &str) -> Self {
        let battery = Battery::find(&root.join("sys/class/power_supply"), sys_vendor);
        let tdp = MsiTdp::find(root, tdp::CLAW_8A);
        let fan = FanCurve::find(&root.join("sys/class/hwmon"));

        if let Some(battery) = battery.as_ref() {
            log::info!("Found battery: {battery}");
        }
        if tdp.is_some() {
            log::info!("Found MSI TDP controls");
        }
        if let Some(fan) = fan.as_ref() {
            log::info!("Found fan curve controls at {:?}", fan.path());
        }

        Self {
            battery,
            tdp,
            fan,
            prev_battery: None,
            prev_tdp: None,
            prev_fan: None,
            startup: true,
        }
    }

    pub fn battery(&self) -> Option<&Battery> {
        self.battery.as_ref()
    }

    pub fn tdp(&self) -> Option<&MsiTdp> {
        self.tdp.as_ref()
    }

    /// Apply the changed sections. Errors are logged and the remaining
    /// sections are still applied.
    pub fn apply(&mut self, config: &Config) {
        if let Err(e) = self.apply_battery(&config.battery) {
            log::error!("Failed to apply battery settings: {e}");
        }
        if let Err(e) = self.apply_tdp(&config.tdp) {
            log::error!("Failed to apply TDP settings: {e}");
        }
        if let Err(e) = self.apply_fan(&config.fan) {
            log::error!("Failed to apply fan settings: {e}");
        }
        self.startup = false;
    }

    fn apply_battery(&mut self, config: &BatteryConfig) -> Result<(), PowerError> {
        let Some(battery) = self.battery.as_ref() else {
            return Ok(());
        };
        let prev = self.prev_battery.replace(config.clone());

        if prev.as_ref().map(|p| p.charge_bypass) != Some(config.charge_bypass)
            && !(self.startup && config.charge_bypass == Default::default())
            && battery.supports_bypass()
        {
            battery.set_charge_bypass(config.charge_bypass)?;
        }

        // A disabled limit is not written on startup so that a limit set
        // outside of the daemon is kept
        if prev.as_ref().map(|p| p.charge_limit) != Some(config.charge_limit)
            && !(self.startup && config.charge_limit == 0)
            && battery.supports_limit()
        {
            battery.set_charge_limit(config.charge_limit)?;
        }
        Ok(())
    }

    fn apply_tdp(&mut self, config: &TdpConfig) -> Result<(), PowerError> {
        let Some(tdp) = self.tdp.as_ref() else {
            return Ok(());
        };
        if !config.enabled || self.prev_tdp.as_ref() == Some(config) {
            self.prev_tdp = Some(config.clone());
            return Ok(());
        }
        self.prev_tdp = Some(config.clone());
        tdp.apply(config)?;
        Ok(())
    }

    fn apply_fan(&mut self, config: &FanConfig) -> Result<(), PowerError> {
        let Some(fan) = self.fan.as_ref() else {
            return Ok(());
        };
        let prev = self.prev_fan.replace(config.clone());
        if prev.as_ref() == Some(config) {
            return Ok(());
        }
        match config.mode {
            FanMode::Manual => fan.set_curve(&config.points),
            // The firmware curve is already active at boot
            FanMode::Auto if self.startup => Ok(()),
            FanMode::Auto => fan.disable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChargeBypass, TdpMode};

    fn fake_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let bat = dir.path().join("sys/class/power_supply/BAT0");
        fs::create_dir_all(&bat).unwrap();
        fs::write(bat.join("type"), "Battery\n").unwrap();
        fs::write(bat.join("charge_control_end_threshold"), "100\n").unwrap();
        fs::write(
            bat.join("charge_behaviour"),
            "[auto] inhibit-charge inhibit-charge-awake\n",
        )
        .unwrap();

        let attrs = dir
            .path()
            .join("sys/class/firmware-attributes/msi-wmi-platform/attributes");
        for attr in ["ppt_pl1_spl", "ppt_pl2_sppt", "ppt_pl3_fppt"] {
            fs::create_dir_all(attrs.join(attr)).unwrap();
            fs::write(attrs.join(attr).join("current_value"), "0\n").unwrap();
        }
        fs::create_dir_all(dir.path().join("sys/firmware/acpi")).unwrap();
        fs::write(dir.path().join("sys/firmware/acpi/platform_profile"), "balanced\n").unwrap();
        dir
    }

    #[test]
    fn applies_only_changes() {
        let root = fake_root();
        let mut power = PowerManager::new(root.path(), "LENOVO");
        assert!(power.battery().is_some());
        assert!(power.tdp().is_some());

        let limit = root
            .path()
            .join("sys/class/power_supply/BAT0/charge_control_end_threshold");
        let behaviour = root.path().join("sys/class/power_supply/BAT0/charge_behaviour");
        let spl = root
            .path()
            .join("sys/class/firmware-attributes/msi-wmi-platform/attributes/ppt_pl1_spl/current_value");

        // Defaults do not touch anything on startup
        power.apply(&Config::default());
        assert_eq!(read_attr(&limit).unwrap(), "100");
        assert_eq!(read_attr(&spl).unwrap(), "0");

        let mut config = Config::default();
        config.battery.charge_limit = 80;
        config.battery.charge_bypass = ChargeBypass::Awake;
        config.tdp.enabled = true;
        config.tdp.mode = TdpMode::Quiet;
        power.apply(&config);
        assert_eq!(read_attr(&limit).unwrap(), "80");
        assert_eq!(read_attr(&behaviour).unwrap(), "inhibit-charge-awake");
        assert_eq!(read_attr(&spl).unwrap(), "15");

        // Unchanged sections are not rewritten
        fs::write(&limit, "90\n").unwrap();
        power.apply(&config);
        assert_eq!(read_attr(&limit).unwrap(), "90");

        config.battery.charge_limit = 0;
        power.apply(&config);
        assert_eq!(read_attr(&limit).unwrap(), "100");
    }
}
