//! Emergency hibernation when the device overheats or runs out of battery
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use super::{
    battery::{Battery, BATTERY_LOW_THRESHOLD},
    read_attr, read_int, PowerError,
};

pub const TEMP_CHECK_INTERVAL: Duration = Duration::from_secs(10);
/// Grace period after startup, so a faulty sensor cannot brick an install
pub const TEMP_CHECK_INITIALIZE: Duration = Duration::from_secs(300);
/// Ignore triggers this soon after an attempt, unless woken up
pub const LAST_ATTEMPT_WAIT: Duration = Duration::from_secs(5);
/// Waking up this soon after an attempt means hibernation failed
pub const LAST_ATTEMPT_BAIL: Duration = Duration::from_secs(30);

/// An ACPI thermal zone and its "hot" trip point, in m°C
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalZone {
    pub temp: PathBuf,
    pub hot: i64,
}

/// Find the `acpitz` zones with a "hot" trip point
pub fn find_zones(thermal: &Path) -> Vec<ThermalZone> {
    let Ok(entries) = fs::read_dir(thermal) else {
        return vec![];
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("thermal_zone"))
        })
        .collect();
    dirs.sort();

    let mut zones = vec![];
    for dir in dirs {
        if !read_attr(&dir.join("type")).is_ok_and(|kind| kind.contains("acpitz")) {
            continue;
        }
        let Ok(trips) = fs::read_dir(&dir) else {
            continue;
        };
        let mut trips: Vec<String> = trips
            .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
            .filter(|name| name.starts_with("trip_point_") && name.ends_with("_type"))
            .collect();
        trips.sort();

        for trip in trips {
            if !read_attr(&dir.join(&trip)).is_ok_and(|kind| kind.contains("hot")) {
                continue;
            }
            match read_int(&dir.join(trip.replace("_type", "_temp"))) {
                Ok(hot) => {
                    log::info!("Found thermal zone {dir:?}: hot @ {}C", hot / 1000);
                    zones.push(ThermalZone {
                        temp: dir.join("temp"),
                        hot,
                    });
                    break;
                }
                Err(e) => log::warn!("Unable to read trip point of {dir:?}: {e}"),
            }
        }
    }
    zones
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalAction {
    Hibernate,
    /// Hibernation already failed, power off
    Shutdown,
}

#[derive(Debug)]
pub struct ThermalWatchdog {
    zones: Vec<ThermalZone>,
    battery: Option<Battery>,
    started: Instant,
    last_check: Option<Instant>,
    last_attempt: Option<Instant>,
    alarm_set: bool,
}

impl ThermalWatchdog {
    pub fn new(zones: Vec<ThermalZone>, battery: Option<Battery>, now: Instant) -> Self {
        Self {
            zones,
            battery,
            started: now,
            last_check: None,
            last_attempt: None,
            alarm_set: false,
        }
    }

    pub fn system(battery: Option<Battery>) -> Self {
        Self::new(
            find_zones(Path::new("/sys/class/thermal")),
            battery,
            Instant::now(),
        )
    }

    /// True if a zone is hot or the battery is almost empty
    fn critical(&self) -> Result<bool, PowerError> {
        for zone in self.zones.iter() {
            let temp = read_int(&zone.temp)?;
            if temp >= zone.hot {
                log::warn!("Thermal zone {:?} reached {}C", zone.temp, temp / 1000);
                return Ok(true);
            }
        }
        if let Some(battery) = self.battery.as_ref() {
            let level = battery.capacity()?;
            if battery.is_discharging()? && level <= BATTERY_LOW_THRESHOLD {
                log::warn!("Battery level reached {level}%");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Decide what to do right now. `wakeup` is set when the system just
    /// resumed.
    pub fn check(&mut self, now: Instant, wakeup: bool) -> Result<Option<ThermalAction>, PowerError> {
        if !self.critical()? {
            return Ok(None);
        }

        let since = self.last_attempt.map(|last| now.duration_since(last));
        let action = match since {
            // The previous attempt may still be in progress
            Some(since) if !wakeup && since < LAST_ATTEMPT_WAIT => return Ok(None),
            Some(since) if since < LAST_ATTEMPT_BAIL => ThermalAction::Shutdown,
            _ => ThermalAction::Hibernate,
        };
        self.last_attempt = Some(now);
        Ok(Some(action))
    }

    fn set_alarm(&mut self) {
        let Some(battery) = self.battery.as_ref() else {
            return;
        };
        if let Err(e) = battery.set_alarm() {
            log::error!("Failed to set battery alarm: {e}");
        }
    }

    /// Periodic check, rate limited to [TEMP_CHECK_INTERVAL]
    pub fn poll(&mut self, now: Instant) -> Option<ThermalAction> {
        if !self.alarm_set {
            self.alarm_set = true;
            self.set_alarm();
        }
        if now.duration_since(self.started) < TEMP_CHECK_INITIALIZE {
            return None;
        }
        if self
            .last_check
            .is_some_and(|last| now.duration_since(last) < TEMP_CHECK_INTERVAL)
        {
            return None;
        }
        self.last_check = Some(now);
        self.checked(now, false)
    }

    /// Check right after resume. The alarm is reset by the firmware.
    pub fn wakeup(&mut self, now: Instant) -> Option<ThermalAction> {
        self.set_alarm();
        self.checked(now, true)
    }

    fn checked(&mut self, now: Instant, wakeup: bool) -> Option<ThermalAction> {
        match self.check(now, wakeup) {
            Ok(action) => action,
            Err(e) => {
                log::error!("Failed to check thermal zones, disabling watchdog: {e}");
                self.zones.clear();
                self.battery = None;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(dir: &Path, name: &str, kind: &str, temp: i64) {
        let zone = dir.join(name);
        fs::create_dir_all(&zone).unwrap();
        fs::write(zone.join("type"), format!("{kind}\n")).unwrap();
        fs::write(zone.join("temp"), format!("{temp}\n")).unwrap();
        fs::write(zone.join("trip_point_0_type"), "critical\n").unwrap();
        fs::write(zone.join("trip_point_0_temp"), "105000\n").unwrap();
        fs::write(zone.join("trip_point_1_type"), "hot\n").unwrap();
        fs::write(zone.join("trip_point_1_temp"), "95000\n").unwrap();
    }

    #[test]
    fn finds_acpi_zones() {
        let dir = tempfile::tempdir().unwrap();
        zone(dir.path(), "thermal_zone0", "acpitz", 40000);
        zone(dir.path(), "thermal_zone1", "x86_pkg_temp", 40000);

        let zones = find_zones(dir.path());
        assert_eq!(
            zones,
            vec![ThermalZone {
                temp: dir.path().join("thermal_zone0/temp"),
                hot: 95000
            }]
        );
    }

    #[test]
    fn escalates_on_repeated_triggers() {
        let dir = tempfile::tempdir().unwrap();
        zone(dir.path(), "thermal_zone0", "acpitz", 40000);
        let now = Instant::now();
        let mut watchdog = ThermalWatchdog::new(find_zones(dir.path()), None, now);

        // Grace period
        fs::write(dir.path().join("thermal_zone0/temp"), "96000\n").unwrap();
        assert_eq!(watchdog.poll(now), None);

        let t = now + TEMP_CHECK_INITIALIZE;
        assert_eq!(watchdog.poll(t), Some(ThermalAction::Hibernate));
        // Rate limited
        assert_eq!(watchdog.poll(t + Duration::from_secs(1)), None);
        // Still hot after resuming soon after: hibernation did not work
        assert_eq!(
            watchdog.wakeup(t + Duration::from_secs(20)),
            Some(ThermalAction::Shutdown)
        );

        let t = t + Duration::from_secs(100);
        assert_eq!(watchdog.poll(t), Some(ThermalAction::Hibernate));

        fs::write(dir.path().join("thermal_zone0/temp"), "50000\n").unwrap();
        assert_eq!(watchdog.poll(t + TEMP_CHECK_INTERVAL * 10), None);
    }

    #[test]
    fn low_battery_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let bat = dir.path().join("BAT0");
        fs::create_dir_all(&bat).unwrap();
        fs::write(bat.join("type"), "Battery\n").unwrap();
        fs::write(bat.join("capacity"), "5\n").unwrap();
        fs::write(bat.join("status"), "Charging\n").unwrap();
        let battery = Battery::find(dir.path(), "");

        let now = Instant::now();
        let mut watchdog = ThermalWatchdog::new(vec![], battery, now);
        assert_eq!(watchdog.check(now, false).unwrap(), None);

        fs::write(bat.join("status"), "Discharging\n").unwrap();
        assert_eq!(
            watchdog.check(now, false).unwrap(),
            Some(ThermalAction::Hibernate)
        );
    }
}
