//! TDP control through the msi-wmi-platform firmware attributes
use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use crate::config::{TdpConfig, TdpMode};

use super::{
    platform::{set_platform_profile, PlatformProfile},
    write_attr, PowerError,
};

const ATTRIBUTES: &str = "sys/class/firmware-attributes/msi-wmi-platform/attributes";
/// Pause between consecutive limit writes
const TDP_DELAY: Duration = Duration::from_millis(100);

/// Sustained, slow and fast power limits in watts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TdpPreset {
    pub spl: u32,
    pub sppt: u32,
    pub fppt: Option<u32>,
}

impl TdpPreset {
    pub const fn new(spl: u32, sppt: u32, fppt: Option<u32>) -> Self {
        Self { spl, sppt, fppt }
    }
}

/// Power envelope of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TdpLimits {
    pub quiet: TdpPreset,
    pub balanced: TdpPreset,
    pub performance: TdpPreset,
    /// Lowest sustained limit using the balanced profile
    pub balanced_min: u32,
    /// Lowest sustained limit using the performance profile
    pub performance_min: u32,
    pub min_tdp: u32,
    pub max_tdp: u32,
    pub max_sppt: Option<u32>,
    pub max_fppt: Option<u32>,
}

/// MSI Claw 8 AI+
pub const CLAW_8A: TdpLimits = TdpLimits {
    quiet: TdpPreset::new(15, 28, Some(33)),
    balanced: TdpPreset::new(20, 33, Some(43)),
    performance: TdpPreset::new(28, 45, Some(55)),
    balanced_min: 17,
    performance_min: 23,
    min_tdp: 8,
    max_tdp: 35,
    max_sppt: Some(37),
    max_fppt: Some(55),
};

impl TdpLimits {
    /// Limits and platform profile to use for the given config
    pub fn resolve(&self, config: &TdpConfig) -> (PlatformProfile, TdpPreset) {
        match config.mode {
            TdpMode::Quiet => (PlatformProfile::LowPower, self.quiet),
            TdpMode::Balanced => (PlatformProfile::Balanced, self.balanced),
            TdpMode::Performance => (PlatformProfile::Performance, self.performance),
            TdpMode::Custom => {
                let spl = config.spl.clamp(self.min_tdp, self.max_tdp);
                let sppt = config
                    .sppt
                    .clamp(spl, self.max_sppt.unwrap_or(self.max_tdp).max(spl));
                let fppt = config.fppt.map(|fppt| {
                    fppt.clamp(sppt, self.max_fppt.unwrap_or(self.max_tdp).max(sppt))
                });
                let profile = if spl < self.balanced_min {
                    PlatformProfile::LowPower
                } else if spl < self.performance_min {
                    PlatformProfile::Balanced
                } else {
                    PlatformProfile::Performance
                };
                (profile, TdpPreset::new(spl, sppt, fppt))
            }
        }
    }
}

/// Firmware attributes of the MSI driver
#[derive(Debug, Clone)]
pub struct MsiTdp {
    root: PathBuf,
    attributes: PathBuf,
    limits: TdpLimits,
}

impl MsiTdp {
    /// Returns the TDP controls if the driver exposes the sustained and slow
    /// limits
    pub fn find(root: &Path, limits: TdpLimits) -> Option<Self> {
        let attributes = root.join(ATTRIBUTES);
        let tdp = Self {
            root: root.to_path_buf(),
            attributes,
            limits,
        };
        (tdp.attribute("ppt_pl1_spl").exists() && tdp.attribute("ppt_pl2_sppt").exists())
            .then_some(tdp)
    }

    fn attribute(&self, name: &str) -> PathBuf {
        self.attributes.join(name).join("current_value")
    }

    pub fn limits(&self) -> &TdpLimits {
        &self.limits
    }

    /// Apply the config, returning the limits that were written
    pub fn apply(&self, config: &TdpConfig) -> Result<TdpPreset, PowerError> {
        let (profile, preset) = self.limits.resolve(config);
        set_platform_profile(&self.root, profile)?;

        let fppt = self.attribute("ppt_pl3_fppt");
        if let (Some(value), true) = (preset.fppt, fppt.exists()) {
            log::info!("Setting fast TDP limit to {value} W");
            write_attr(&fppt, value)?;
            thread::sleep(TDP_DELAY);
        }
        log::info!("Setting slow TDP limit to {} W", preset.sppt);
        write_attr(&self.attribute("ppt_pl2_sppt"), preset.sppt)?;
        thread::sleep(TDP_DELAY);
        log::info!("Setting sustained TDP limit to {} W", preset.spl);
        write_attr(&self.attribute("ppt_pl1_spl"), preset.spl)?;
        Ok(preset)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::power::read_attr;

    #[test]
    fn custom_limits_are_clamped() {
        let config = TdpConfig {
            enabled: true,
            mode: TdpMode::Custom,
            spl: 50,
            sppt: 10,
            fppt: Some(70),
        };
        let (profile, preset) = CLAW_8A.resolve(&config);
        assert_eq!(profile, PlatformProfile::Performance);
        assert_eq!(preset, TdpPreset::new(35, 35, Some(55)));

        let config = TdpConfig {
            spl: 4,
            sppt: 12,
            fppt: None,
            ..config
        };
        let (profile, preset) = CLAW_8A.resolve(&config);
        assert_eq!(profile, PlatformProfile::LowPower);
        assert_eq!(preset, TdpPreset::new(8, 12, None));

        let config = TdpConfig { spl: 20, ..config };
        assert_eq!(CLAW_8A.resolve(&config).0, PlatformProfile::Balanced);
    }

    #[test]
    fn writes_attributes() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MsiTdp::find(dir.path(), CLAW_8A).is_none());

        let attrs = dir.path().join(ATTRIBUTES);
        for attr in ["ppt_pl1_spl", "ppt_pl2_sppt"] {
            fs::create_dir_all(attrs.join(attr)).unwrap();
        }
        fs::create_dir_all(dir.path().join("sys/firmware/acpi")).unwrap();
        let tdp = MsiTdp::find(dir.path(), CLAW_8A).unwrap();

        let config = TdpConfig {
            enabled: true,
            mode: TdpMode::Performance,
            ..Default::default()
        };
        tdp.apply(&config).unwrap();
        assert_eq!(read_attr(&tdp.attribute("ppt_pl1_spl")).unwrap(), "28");
        assert_eq!(read_attr(&tdp.attribute("ppt_pl2_sppt")).unwrap(), "45");
        // No fast limit attribute, nothing written
        assert!(!tdp.attribute("ppt_pl3_fppt").exists());
        assert_eq!(
            read_attr(&dir.path().join("sys/firmware/acpi/platform_profile")).unwrap(),
            "performance"
        );
    }
}
