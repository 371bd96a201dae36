//! ACPI platform profile
use std::path::{Path, PathBuf};

use super::{read_attr, write_attr, PowerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformProfile {
    LowPower,
    Balanced,
    Performance,
}

impl PlatformProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformProfile::LowPower => "low-power",
            PlatformProfile::Balanced => "balanced",
            PlatformProfile::Performance => "performance",
        }
    }
}

fn profile_path(root: &Path) -> PathBuf {
    root.join("sys/firmware/acpi/platform_profile")
}

/// Profiles offered by the firmware, if it supports platform profiles
pub fn get_platform_choices(root: &Path) -> Option<Vec<String>> {
    let choices = read_attr(&root.join("sys/firmware/acpi/platform_profile_choices")).ok()?;
    Some(choices.split_whitespace().map(str::to_string).collect())
}

pub fn get_platform_profile(root: &Path) -> Result<String, PowerError> {
    read_attr(&profile_path(root))
}

pub fn set_platform_profile(root: &Path, profile: PlatformProfile) -> Result<(), PowerError> {
    log::info!("Setting platform profile to '{}'", profile.as_str());
    write_attr(&profile_path(root), profile.as_str())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn profile_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let acpi = dir.path().join("sys/firmware/acpi");
        fs::create_dir_all(&acpi).unwrap();
        fs::write(
            acpi.join("platform_profile_choices"),
            "low-power balanced performance\n",
        )
        .unwrap();

        assert_eq!(
            get_platform_choices(dir.path()).unwrap(),
            vec!["low-power", "balanced", "performance"]
        );
        set_platform_profile(dir.path(), PlatformProfile::LowPower).unwrap();
        assert_eq!(get_platform_profile(dir.path()).unwrap(), "low-power");
        assert!(get_platform_choices(&dir.path().join("missing")).is_none());
    }
}
