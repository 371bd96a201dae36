//! Manual fan curves through hwmon
use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use super::{read_attr, write_attr, PowerError};

/// hwmon device exposing the fan curve
pub const FAN_CURVE_NAME: &str = "msi_wmi_platform";
/// Temperatures of the curve points, in °C
pub const POINTS: [u8; 6] = [0, 50, 60, 70, 80, 88];
const FANS: [u8; 2] = [1, 2];
const ENABLE_DELAY: Duration = Duration::from_millis(100);

/// Convert a duty cycle in percent to a pwm value
pub fn pwm_from_percent(percent: u8) -> u8 {
    (percent as f64 * 2.55).min(255.0) as u8
}

#[derive(Debug, Clone)]
pub struct FanCurve {
    dir: PathBuf,
}

impl FanCurve {
    /// Find the hwmon device with the fan curve under `hwmon`
    pub fn find(hwmon: &Path) -> Option<Self> {
        fs::read_dir(hwmon)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .find(|dir| {
                read_attr(&dir.join("name"))
                    .map(|name| name == FAN_CURVE_NAME)
                    .unwrap_or(false)
            })
            .map(|dir| Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write the curve to both fans and enable it. `duty` holds the duty
    /// cycle in percent for each of [POINTS].
    pub fn set_curve(&self, duty: &[u8; 6]) -> Result<(), PowerError> {
        let curve: Vec<u8> = duty.iter().map(|pct| pwm_from_percent(*pct)).collect();
        log::info!("Setting fan curve: {POINTS:?} °C -> {curve:?} / 255");

        for fan in FANS {
            for (i, (temp, pwm)) in POINTS.iter().zip(curve.iter()).enumerate() {
                let point = i + 1;
                write_attr(
                    &self.dir.join(format!("pwm{fan}_auto_point{point}_temp")),
                    temp,
                )?;
                write_attr(
                    &self.dir.join(format!("pwm{fan}_auto_point{point}_pwm")),
                    pwm,
                )?;
            }
        }
        self.set_enable(1)
    }

    /// Give control back to the firmware
    pub fn disable(&self) -> Result<(), PowerError> {
        log::info!("Disabling custom fan curve");
        self.set_enable(2)
    }

    fn set_enable(&self, value: u8) -> Result<(), PowerError> {
        for fan in FANS {
            write_attr(&self.dir.join(format!("pwm{fan}_enable")), value)?;
            if fan == 1 {
                thread::sleep(ENABLE_DELAY);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_to_pwm() {
        assert_eq!(pwm_from_percent(0), 0);
        assert_eq!(pwm_from_percent(40), 102);
        assert_eq!(pwm_from_percent(75), 191);
        assert_eq!(pwm_from_percent(100), 254);
        assert_eq!(pwm_from_percent(200), 255);
    }

    #[test]
    fn writes_curve() {
        let dir = tempfile::tempdir().unwrap();
        for (hwmon, name) in [("hwmon0", "acpitz"), ("hwmon3", FAN_CURVE_NAME)] {
            fs::create_dir_all(dir.path().join(hwmon)).unwrap();
            fs::write(dir.path().join(hwmon).join("name"), format!("{name}\n")).unwrap();
        }

        let fan = FanCurve::find(dir.path()).unwrap();
        assert_eq!(fan.path(), dir.path().join("hwmon3"));

        fan.set_curve(&[0, 40, 49, 58, 67, 75]).unwrap();
        let read = |name: &str| read_attr(&fan.path().join(name)).unwrap();
        assert_eq!(read("pwm1_auto_point2_temp"), "50");
        assert_eq!(read("pwm2_auto_point6_pwm"), "191");
        assert_eq!(read("pwm1_enable"), "1");
        assert_eq!(read("pwm2_enable"), "1");

        fan.disable().unwrap();
        assert_eq!(read("pwm2_enable"), "2");
    }
}
