//! Module for locating Handheld Daemon config files

use std::path::PathBuf;

/// Base system fallback path to use if one cannot be found with XDG
const FALLBACK_BASE_PATH: &str = "/etc/hhd";
pub const CONFIG_FILE: &str = "hhd.yaml";

/// Returns the base path for configuration data (e.g. "~/.config/hhd")
pub fn get_base_path() -> PathBuf {
    let Ok(base_dirs) = xdg::BaseDirectories::with_prefix("hhd") else {
        log::warn!("Unable to determine config base path. Using fallback path.");
        return PathBuf::from(FALLBACK_BASE_PATH);
    };

    let config_home = base_dirs.get_config_home();
    if config_home.exists() {
        return config_home;
    }

    // Fall back to a system-wide config before creating the user one
    let fallback = PathBuf::from(FALLBACK_BASE_PATH);
    if fallback.join(CONFIG_FILE).exists() {
        return fallback;
    }

    config_home
}

/// Returns the path of the daemon settings file
pub fn get_config_path() -> PathBuf {
    get_base_path().join(CONFIG_FILE)
}

/// Returns the directory for stored profiles (e.g. "~/.config/hhd/profiles")
pub fn get_profiles_path() -> PathBuf {
    get_base_path().join("profiles")
}

/// Returns the Steam library cache used to look up game artwork
pub fn get_steam_library_cache() -> Option<PathBuf> {
    let base_dirs = xdg::BaseDirectories::new().ok()?;
    Some(
        base_dirs
            .get_data_home()
            .join("Steam/appcache/librarycache"),
    )
}
