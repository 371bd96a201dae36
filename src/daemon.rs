//! Ties the daemon together: config and live state, the device loop, power
//! collaborators, thermal watchdog, config watcher and API.
use std::{
    error::Error,
    path::{Path, PathBuf},
    thread,
    time::Instant,
};

use serde_json::json;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    task::JoinHandle,
    time,
};

use crate::{
    api::{self, ApiState},
    config::{
        path::{get_config_path, get_profiles_path, get_steam_library_cache},
        profile::ProfileStore,
        state::State,
        Config, LoadError, TdpMode,
    },
    device::{detect::detect, run_loop, LoopFlags},
    dmi::get_dmi_data,
    input::{
        emitter::Emitter,
        event::{ControlEvent, SpecialKind},
    },
    power::{
        hibernate::{self, SwapSettings},
        thermal::{ThermalAction, ThermalWatchdog, TEMP_CHECK_INTERVAL},
        PowerManager,
    },
    watcher::{self, WatchEvent},
};

/// Next TDP mode when cycling with the shortcut
pub fn next_tdp_mode(mode: TdpMode) -> TdpMode {
    match mode {
        TdpMode::Quiet => TdpMode::Balanced,
        TdpMode::Balanced => TdpMode::Performance,
        TdpMode::Performance | TdpMode::Custom => TdpMode::Quiet,
    }
}

/// Side effects of a control event the caller has to carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    None,
    Wakeup,
    Reboot,
}

/// Apply a control event to the live state and the profile store
pub fn handle_control(
    event: ControlEvent,
    state: &State,
    profiles: &ProfileStore,
) -> Result<Followup, LoadError> {
    log::debug!("Handling control event: {event:?}");
    match event {
        ControlEvent::Profile {
            name,
            config: Some(config),
        } => {
            profiles.set(&name, &config)?;
        }
        ControlEvent::Profile { name, config: None } => {
            if !profiles.delete(&name)? {
                log::warn!("Profile '{name}' does not exist");
            }
        }
        ControlEvent::Apply { name } => match profiles.get(&name)? {
            Some(profile) => {
                log::info!("Applying profile '{name}'");
                state.merge(&profile)?;
            }
            None => log::warn!("Profile '{name}' does not exist"),
        },
        ControlEvent::State { config } => {
            state.merge(&config)?;
        }
        ControlEvent::Tdp { tdp: Some(tdp) } if state.config().tdp.enabled => {
            state.merge(&json!({"tdp": {"mode": TdpMode::Custom, "spl": tdp.max(0)}}))?;
        }
        ControlEvent::Special { event } => match event {
            SpecialKind::Wakeup => return Ok(Followup::Wakeup),
            SpecialKind::Reboot => return Ok(Followup::Reboot),
            SpecialKind::TdpCycle if state.config().tdp.enabled => {
                let mode = next_tdp_mode(state.config().tdp.mode);
                log::info!("Cycling TDP mode to {mode:?}");
                state.merge(&json!({"tdp": {"mode": mode}}))?;
            }
            other => log::trace!("Ignoring special event: {other}"),
        },
        other => log::trace!("Ignoring control event: {other:?}"),
    }
    Ok(Followup::None)
}

/// Reload the config file into the live state after it changed on disk
fn reload_config(path: &Path, state: &State) {
    match Config::load(path) {
        Ok(config) => {
            if config != state.config() {
                log::info!("Config file {path:?} changed, reloading");
            }
            state.replace(config);
        }
        Err(e) => log::error!("Unable to reload config file {path:?}: {e}"),
    }
}

async fn run_command(cmd: &str, args: &[&str]) {
    match tokio::process::Command::new(cmd).args(args).status().await {
        Ok(status) if status.success() => (),
        Ok(status) => log::error!("'{cmd} {}' failed: {status}", args.join(" ")),
        Err(e) => log::error!("Unable to run '{cmd}': {e}"),
    }
}

fn handle_thermal(action: Option<ThermalAction>, swap: &SwapSettings) {
    let Some(action) = action else {
        return;
    };
    let swap = swap.clone();
    tokio::spawn(async move {
        let shutdown = action == ThermalAction::Shutdown;
        if let Err(e) = hibernate::emergency_hibernate(&swap, shutdown).await {
            log::error!("Emergency hibernation failed: {e}");
        }
    });
}

fn spawn_api(state: &State, profiles: &ProfileStore, config: &Config) -> Vec<JoinHandle<()>> {
    let api = ApiState::new(state.clone(), profiles.clone(), get_steam_library_cache());
    let mut tasks = vec![];

    if config.http.enabled {
        let api = api.clone();
        let http = config.http.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = api::serve_tcp(api, &http).await {
                log::error!("API server failed: {e}");
            }
        }));
    }
    tasks.push(tokio::spawn(async move {
        if let Err(e) = api::serve_unix(api, Path::new(api::SOCKET_PATH)).await {
            log::error!("API socket failed: {e}");
        }
    }));
    tasks
}

fn spawn_watcher(config_path: &Path) -> mpsc::Receiver<WatchEvent> {
    let (tx, rx) = mpsc::channel(16);
    let Some(dir) = config_path.parent().map(PathBuf::from) else {
        return rx;
    };
    if let Err(e) = std::fs::create_dir_all(&dir) {
        log::warn!("Unable to create config directory {dir:?}: {e}");
    }
    thread::spawn(move || {
        if let Err(e) = watcher::watch(&dir, tx) {
            log::error!("Unable to watch config directory {dir:?}: {e}");
        }
    });
    rx
}

/// Run the daemon until interrupted
pub async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config_path = get_config_path();
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Unable to load config {config_path:?}, using defaults: {e}");
            Config::default()
        }
    };
    log::info!("Using config file {config_path:?}");

    let state = State::new(config.clone());
    let profiles = ProfileStore::new(get_profiles_path());
    let (tx, mut control_rx): (_, UnboundedReceiver<ControlEvent>) = mpsc::unbounded_channel();
    let emitter = Emitter::new(tx);
    let flags = LoopFlags::new();

    // Device loop
    let dmi = get_dmi_data();
    let device_task = match detect(&dmi) {
        Some(model) => {
            log::info!("Detected {model} ({} {})", dmi.sys_vendor, dmi.product_name);
            let handheld = model.handheld();
            let (state, emitter, flags) = (state.clone(), emitter.clone(), flags.clone());
            Some(tokio::task::spawn_blocking(move || {
                run_loop(handheld.as_ref(), &state, &emitter, &flags)
            }))
        }
        None => {
            log::warn!(
                "No supported controller found for {} {}",
                dmi.sys_vendor,
                dmi.product_name
            );
            None
        }
    };

    // Power
    let mut power = PowerManager::new(Path::new("/"), &dmi.sys_vendor);
    power.apply(&config);
    let mut swap = SwapSettings::from_env();
    swap.create |= config.power.create_swap;
    let mut watchdog = config
        .power
        .thermal_watchdog
        .then(|| ThermalWatchdog::system(power.battery().cloned()));
    if let Err(e) = hibernate::delete_temporary_swap(&swap).await {
        log::warn!("Unable to remove temporary swap: {e}");
    }

    let api_tasks = spawn_api(&state, &profiles, &config);
    let mut watch_rx = spawn_watcher(&config_path);
    let mut state_rx = state.subscribe();
    let mut thermal_interval = time::interval(TEMP_CHECK_INTERVAL);
    let mut prev = config;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let config = state.config();
                if config.controller != prev.controller {
                    log::info!("Controller settings changed, restarting device loop");
                    flags.update();
                }
                power.apply(&config);
                if let Err(e) = config.save(&config_path) {
                    log::error!("Unable to save config to {config_path:?}: {e}");
                }
                prev = config;
            }
            Some(event) = watch_rx.recv() => {
                if event.name() == crate::config::path::CONFIG_FILE {
                    reload_config(&config_path, &state);
                }
            }
            Some(event) = control_rx.recv() => {
                match handle_control(event, &state, &profiles) {
                    Ok(Followup::None) => (),
                    Ok(Followup::Wakeup) => {
                        log::info!("System woke up");
                        if let Some(watchdog) = watchdog.as_mut() {
                            handle_thermal(watchdog.wakeup(Instant::now()), &swap);
                        }
                    }
                    Ok(Followup::Reboot) => {
                        log::warn!("Rebooting from controller shortcut");
                        run_command("systemctl", &["reboot"]).await;
                    }
                    Err(e) => log::error!("Failed to handle control event: {e}"),
                }
            }
            _ = thermal_interval.tick() => {
                if let Some(watchdog) = watchdog.as_mut() {
                    handle_thermal(watchdog.poll(Instant::now()), &swap);
                }
            }
        }
    }

    flags.exit();
    for task in api_tasks {
        task.abort();
    }
    if let Some(task) = device_task {
        if let Err(e) = task.await {
            log::error!("Device loop panicked: {e}");
        }
    }
    log::info!("Handheld Daemon stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Emulation;

    fn setup() -> (tempfile::TempDir, State, ProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let profiles = ProfileStore::new(dir.path().join("profiles"));
        (dir, State::new(Config::default()), profiles)
    }

    #[test]
    fn profiles_are_stored_and_applied() {
        let (_dir, state, profiles) = setup();
        let event = ControlEvent::Profile {
            name: "xbox".into(),
            config: Some(json!({"controller": {"emulation": "xbox"}})),
        };
        assert_eq!(handle_control(event, &state, &profiles).unwrap(), Followup::None);
        assert_eq!(profiles.list().unwrap(), vec!["xbox"]);
        assert_eq!(state.config().controller.emulation, Emulation::DualsenseEdge);

        handle_control(ControlEvent::Apply { name: "xbox".into() }, &state, &profiles).unwrap();
        assert_eq!(state.config().controller.emulation, Emulation::Xbox);

        let event = ControlEvent::Profile {
            name: "xbox".into(),
            config: None,
        };
        handle_control(event, &state, &profiles).unwrap();
        assert!(profiles.list().unwrap().is_empty());
    }

    #[test]
    fn tdp_events() {
        let (_dir, state, profiles) = setup();
        let cycle = || ControlEvent::Special {
            event: SpecialKind::TdpCycle,
        };

        // TDP control disabled, nothing happens
        handle_control(cycle(), &state, &profiles).unwrap();
        assert_eq!(state.config().tdp.mode, TdpMode::Balanced);

        state.merge(&json!({"tdp": {"enabled": true}})).unwrap();
        handle_control(cycle(), &state, &profiles).unwrap();
        assert_eq!(state.config().tdp.mode, TdpMode::Performance);
        handle_control(cycle(), &state, &profiles).unwrap();
        assert_eq!(state.config().tdp.mode, TdpMode::Quiet);

        handle_control(ControlEvent::Tdp { tdp: Some(12) }, &state, &profiles).unwrap();
        let tdp = state.config().tdp;
        assert_eq!((tdp.mode, tdp.spl), (TdpMode::Custom, 12));
    }

    #[test]
    fn specials_request_followups() {
        let (_dir, state, profiles) = setup();
        let special = |event| ControlEvent::Special { event };
        assert_eq!(
            handle_control(special(SpecialKind::Wakeup), &state, &profiles).unwrap(),
            Followup::Wakeup
        );
        assert_eq!(
            handle_control(special(SpecialKind::Reboot), &state, &profiles).unwrap(),
            Followup::Reboot
        );
        assert_eq!(
            handle_control(special(SpecialKind::QamDouble), &state, &profiles).unwrap(),
            Followup::None
        );
    }

    #[test]
    fn config_reload_skips_unchanged() {
        let (dir, state, _) = setup();
        let path = dir.path().join("hhd.yaml");
        let mut rx = state.subscribe();

        reload_config(&path, &state);
        assert!(!rx.has_changed().unwrap());

        std::fs::write(&path, "tdp:\n  mode: quiet\n").unwrap();
        reload_config(&path, &state);
        assert!(rx.has_changed().unwrap());
        assert_eq!(state.config().tdp.mode, TdpMode::Quiet);
    }
}
