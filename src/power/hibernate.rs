//! Emergency hibernation, creating a temporary swap file if the system
//! does not have enough swap to hold the memory image.
use std::{
    env,
    path::{Path, PathBuf},
};

use nix::sys::statfs::{statfs, BTRFS_SUPER_MAGIC};
use procfs::{Current, Meminfo};
use tokio::process::Command;

use super::{write_attr, PowerError};

/// Extra space for the hibernation image
pub const SWAP_SAFETY_BUFFER: f64 = 1.3;
/// zram is swapped out to disk before hibernating
pub const ZRAM_MULTIPLIER: f64 = 1.5;

const DEFAULT_SWAP_SUBVOL: &str = "/var/swap";
const DEFAULT_SWAP_FILE: &str = "/var/swap/hhdswap";

/// Where and whether to create a temporary swap file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapSettings {
    pub create: bool,
    pub subvol: PathBuf,
    pub file: PathBuf,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            create: false,
            subvol: DEFAULT_SWAP_SUBVOL.into(),
            file: DEFAULT_SWAP_FILE.into(),
        }
    }
}

impl SwapSettings {
    /// Read `HHD_SWAP_CREATE`, `HHD_SWAP_SUBVOL` and `HHD_SWAP_FILE`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            create: env::var("HHD_SWAP_CREATE").is_ok_and(|v| v == "1"),
            subvol: env::var_os("HHD_SWAP_SUBVOL")
                .map(PathBuf::from)
                .unwrap_or(defaults.subvol),
            file: env::var_os("HHD_SWAP_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.file),
        }
    }
}

/// An active swap device from `/proc/swaps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapEntry {
    pub name: String,
    pub kind: String,
    /// In kB
    pub size: u64,
    pub used: u64,
}

impl SwapEntry {
    pub fn is_zram(&self) -> bool {
        self.name.contains("zram")
    }
}

/// Parse the content of `/proc/swaps`
pub fn parse_swaps(content: &str) -> Vec<SwapEntry> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?.to_string();
            let kind = parts.next()?.to_string();
            let size = parts.next()?.parse().ok()?;
            let used = parts.next()?.parse().ok()?;
            Some(SwapEntry {
                name,
                kind,
                size,
                used,
            })
        })
        .collect()
}

/// Swap needed to hibernate, in kB
pub fn required_swap(mem_total: u64, mem_free: u64, has_zram: bool) -> u64 {
    let used = mem_total.saturating_sub(mem_free) as f64;
    let mult = if has_zram {
        SWAP_SAFETY_BUFFER * ZRAM_MULTIPLIER
    } else {
        SWAP_SAFETY_BUFFER
    };
    (used * mult) as u64
}

/// Disk swap (not zram) in kB
fn disk_swap(swaps: &[SwapEntry]) -> u64 {
    swaps
        .iter()
        .filter(|swap| !swap.is_zram())
        .map(|swap| swap.size.saturating_sub(swap.used))
        .sum()
}

fn read_swaps() -> Result<Vec<SwapEntry>, PowerError> {
    Ok(parse_swaps(&std::fs::read_to_string("/proc/swaps")?))
}

fn is_btrfs(path: &Path) -> bool {
    statfs(path).is_ok_and(|fs| fs.filesystem_type() == BTRFS_SUPER_MAGIC)
}

async fn run(cmd: &str, args: &[&str]) -> Result<(), PowerError> {
    log::debug!("Running {cmd} {args:?}");
    let status = Command::new(cmd).args(args).status().await?;
    if !status.success() {
        return Err(PowerError::Command {
            cmd: format!("{cmd} {}", args.join(" ")),
            status: status.to_string(),
        });
    }
    Ok(())
}

/// Create and enable a swap file large enough to hibernate
pub async fn create_temporary_swap(settings: &SwapSettings) -> Result<(), PowerError> {
    let swaps = read_swaps()?;
    let mem = Meminfo::current()?;
    let has_zram = swaps.iter().any(SwapEntry::is_zram);
    let required = required_swap(mem.mem_total / 1024, mem.mem_free / 1024, has_zram);
    let available = disk_swap(&swaps);
    if available >= required {
        log::info!("Swap is sufficient for hibernation ({available} kB >= {required} kB)");
        return Ok(());
    }

    let file = settings.file.to_string_lossy().to_string();
    let size = format!("{}k", required.saturating_sub(available));
    log::warn!("Creating temporary swap file {file} of {size}");

    let parent = settings.file.parent().unwrap_or(&settings.subvol);
    tokio::fs::create_dir_all(parent).await?;
    if is_btrfs(parent) {
        run("btrfs", &["filesystem", "mkswapfile", "--size", &size, &file]).await?;
    } else {
        run("fallocate", &["-l", &size, &file]).await?;
        run("chmod", &["600", &file]).await?;
        run("mkswap", &[&file]).await?;
    }
    run("swapon", &[&file]).await?;

    // Let systemd pick the resume device again
    for (attr, value) in [("/sys/power/resume", "0:0"), ("/sys/power/resume_offset", "0")] {
        if let Err(e) = write_attr(Path::new(attr), value) {
            log::warn!("Failed to reset {attr}: {e}");
        }
    }

    // zram would otherwise have to be paged into the new swap
    for swap in swaps.iter().filter(|swap| swap.is_zram()) {
        if let Err(e) = run("swapoff", &[&swap.name]).await {
            log::warn!("Failed to disable zram swap {}: {e}", swap.name);
        }
    }
    Ok(())
}

/// Disable and remove the temporary swap file, if any
pub async fn delete_temporary_swap(settings: &SwapSettings) -> Result<(), PowerError> {
    if !settings.file.exists() {
        return Ok(());
    }
    let file = settings.file.to_string_lossy().to_string();
    log::info!("Removing temporary swap file {file}");
    if read_swaps()?.iter().any(|swap| swap.name == file) {
        run("swapoff", &[&file]).await?;
    }
    tokio::fs::remove_file(&settings.file).await?;
    Ok(())
}

/// Hibernate now, or power off if `shutdown` is set. If hibernation fails
/// and swap creation is allowed, retry with a temporary swap file.
pub async fn emergency_hibernate(settings: &SwapSettings, shutdown: bool) -> Result<(), PowerError> {
    if shutdown {
        log::error!("Hibernation failed previously, shutting down");
        return emergency_shutdown().await;
    }

    log::warn!("Hibernating due to critical temperature or battery");
    if let Err(e) = write_attr(Path::new("/proc/sys/vm/drop_caches"), 3) {
        log::warn!("Failed to drop caches: {e}");
    }
    match run("systemctl", &["hibernate"]).await {
        Ok(()) => Ok(()),
        Err(e) if settings.create => {
            log::error!("Hibernation failed ({e}), retrying with a temporary swap file");
            create_temporary_swap(settings).await?;
            run("systemctl", &["hibernate"]).await
        }
        Err(e) => Err(e),
    }
}

pub async fn emergency_shutdown() -> Result<(), PowerError> {
    log::error!("Powering off");
    run("systemctl", &["poweroff"]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPS: &str = "\
Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority
/dev/zram0                              partition\t8388604\t\t1024\t\t100
/var/swap/swapfile                      file\t\t4194300\t\t194300\t\t-2
";

    #[test]
    fn swaps_are_parsed() {
        let swaps = parse_swaps(SWAPS);
        assert_eq!(swaps.len(), 2);
        assert!(swaps[0].is_zram());
        assert_eq!(swaps[1].name, "/var/swap/swapfile");
        assert_eq!(swaps[1].size, 4194300);
        assert_eq!(disk_swap(&swaps), 4000000);
        assert!(parse_swaps("").is_empty());
    }

    #[test]
    fn swap_requirement() {
        assert_eq!(required_swap(16_000_000, 6_000_000, false), 13_000_000);
        assert_eq!(required_swap(16_000_000, 6_000_000, true), 19_500_000);
        assert_eq!(required_swap(1000, 2000, false), 0);
    }

    #[test]
    fn default_swap_settings() {
        let settings = SwapSettings::default();
        assert!(!settings.create);
        assert_eq!(settings.file, PathBuf::from("/var/swap/hhdswap"));
    }
}
