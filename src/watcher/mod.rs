use std::{
    io,
    path::{Path, PathBuf},
};

use inotify::{EventMask, Inotify, WatchMask};
use tokio::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The file was written, created or moved in place
    Modified { name: String, base_path: PathBuf },
    Delete { name: String, base_path: PathBuf },
}

impl WatchEvent {
    pub fn name(&self) -> &str {
        match self {
            WatchEvent::Modified { name, .. } | WatchEvent::Delete { name, .. } => name,
        }
    }
}

/// Translate an inotify event mask into a [WatchEvent]
fn to_event(mask: EventMask, name: String, base_path: &Path) -> Option<WatchEvent> {
    let base_path = base_path.to_path_buf();
    if mask.intersects(EventMask::CLOSE_WRITE | EventMask::MOVED_TO | EventMask::CREATE) {
        Some(WatchEvent::Modified { name, base_path })
    } else if mask.intersects(EventMask::DELETE | EventMask::MOVED_FROM) {
        Some(WatchEvent::Delete { name, base_path })
    } else {
        None
    }
}

/// Watch for file changes in the given directory, sending [WatchEvent]
/// to the given channel. Blocks until the receiver is dropped.
pub fn watch(path: &Path, tx: Sender<WatchEvent>) -> io::Result<()> {
    let mut inotify = Inotify::init()?;
    inotify.watches().add(
        path,
        WatchMask::CLOSE_WRITE
            | WatchMask::MOVED_TO
            | WatchMask::MOVED_FROM
            | WatchMask::CREATE
            | WatchMask::DELETE,
    )?;
    log::debug!("Watching {path:?} for changes");

    let mut buffer = [0u8; 4096];
    loop {
        let events = inotify.read_events_blocking(&mut buffer)?;
        for event in events {
            let Some(name) = event.name.and_then(|n| n.to_str()) else {
                continue;
            };
            log::trace!("inotify {:?}: {name}", event.mask);
            let Some(value) = to_event(event.mask, name.to_string(), path) else {
                continue;
            };
            if tx.blocking_send(value).is_err() {
                log::debug!("Watcher channel closed, stopping watch of {path:?}");
                return Ok(());
            }
        }
    }
}
