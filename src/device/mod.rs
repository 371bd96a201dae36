//! Device loops: build a graph of producers and consumers for the detected
//! handheld and pump events through it until exit or a config change.
pub mod claw;
pub mod detect;
pub mod legion_go;

use std::{
    collections::HashMap,
    os::fd::RawFd,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use mio::{unix::SourceFd, Events, Interest, Poll, Token};

use crate::{
    config::{state::State, Config, ControllerConfig, Emulation, MotionSource},
    input::{
        emitter::Emitter,
        event::Side,
        multiplexer::Multiplexer,
        target::{
            dualsense::{Dualsense, DualsenseConfig},
            steam_deck::SteamDeck,
            uinput::{Uinput, UinputConfig},
        },
        Component, DeviceError,
    },
};

/// Wait before looking for a missing device again
pub const FIND_DELAY: Duration = Duration::from_millis(100);
/// Wait after a loop failure
pub const ERROR_DELAY: Duration = Duration::from_millis(300);
/// Wait after a loop that keeps failing right after it starts
pub const LONGER_ERROR_DELAY: Duration = Duration::from_secs(3);
/// A loop failing within this time of its start counts as failing fast
pub const LONGER_ERROR_MARGIN: Duration = Duration::from_millis(1300);
/// Highest loop rate allowed, in Hz
pub const MAX_FREQ_CAP: u32 = 1000;

/// Flags shared between the daemon and a device loop
#[derive(Debug, Clone, Default)]
pub struct LoopFlags {
    should_exit: Arc<AtomicBool>,
    updated: Arc<AtomicBool>,
}

impl LoopFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_exit(&self) -> bool {
        self.should_exit.load(Ordering::Relaxed)
    }

    pub fn exit(&self) {
        self.should_exit.store(true, Ordering::Relaxed);
    }

    pub fn updated(&self) -> bool {
        self.updated.load(Ordering::Relaxed)
    }

    /// Ask the loop to restart with the new config
    pub fn update(&self) {
        self.updated.store(true, Ordering::Relaxed);
    }

    fn clear_updated(&self) {
        self.updated.store(false, Ordering::Relaxed);
    }

    fn running(&self) -> bool {
        !self.should_exit() && !self.updated()
    }
}

/// A supported handheld, able to build its device graph
pub trait Handheld: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the graph for the given config. Returns [DeviceError::NotReady]
    /// while the controllers are missing.
    fn build(&self, config: &Config, emitter: &Emitter) -> Result<DeviceGraph, DeviceError>;
}

/// Components of one loop, in producer order, and the multiplexer
/// between them.
pub struct DeviceGraph {
    components: Vec<Component>,
    multiplexer: Multiplexer,
    min_freq: u32,
    max_freq: u32,
    opened: usize,
}

impl DeviceGraph {
    pub fn new(multiplexer: Multiplexer) -> Self {
        Self {
            components: vec![],
            multiplexer,
            min_freq: 25,
            max_freq: 400,
            opened: 0,
        }
    }

    pub fn with(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    pub fn with_rates(mut self, min_freq: u32, max_freq: u32) -> Self {
        self.max_freq = max_freq.clamp(1, MAX_FREQ_CAP);
        self.min_freq = min_freq.clamp(1, self.max_freq);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Longest wait for readiness
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.min_freq as f64)
    }

    /// Shortest duration of an iteration
    pub fn min_delay(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.max_freq as f64)
    }

    /// Open every component, then run until exit or update. Every opened
    /// component is closed again in reverse order, whatever the outcome.
    pub fn run(&mut self, flags: &LoopFlags) -> Result<(), DeviceError> {
        let result = self.open_and_pump(flags);
        self.close(!flags.updated());
        result
    }

    fn open_and_pump(&mut self, flags: &LoopFlags) -> Result<(), DeviceError> {
        let mut poll = Poll::new()?;
        let mut owners: HashMap<RawFd, usize> = HashMap::new();
        let mut polled: Vec<usize> = vec![];
        let mut sampled = false;

        for idx in 0..self.components.len() {
            let component = &mut self.components[idx];
            let fds = component.open()?;
            self.opened = idx + 1;

            if component.is_producer() && fds.is_empty() {
                polled.push(idx);
                // Sensors without a descriptor need sampling at the top rate
                sampled |= matches!(component, Component::Producer(_));
            }
            for fd in fds {
                poll.registry()
                    .register(&mut SourceFd(&fd), Token(fd as usize), Interest::READABLE)?;
                owners.insert(fd, idx);
            }
        }

        let timeout = if sampled {
            self.min_delay()
        } else {
            self.max_delay()
        };
        let min_delay = self.min_delay();
        let mut events = Events::with_capacity(64);

        log::info!("Device loop started with {} components", self.components.len());
        while flags.running() {
            let start = Instant::now();
            if let Err(e) = poll.poll(&mut events, Some(timeout)) {
                if e.kind() != std::io::ErrorKind::Interrupted {
                    return Err(e.into());
                }
            }

            let ready: Vec<RawFd> = events.iter().map(|ev| ev.token().0 as RawFd).collect();
            let mut evs = vec![];
            for (idx, component) in self.components.iter_mut().enumerate() {
                if !component.is_producer() {
                    continue;
                }
                let is_ready = polled.contains(&idx)
                    || component.has_pending()
                    || ready.iter().any(|fd| owners.get(fd) == Some(&idx));
                if is_ready {
                    evs.extend(component.produce(&ready)?);
                }
            }

            let evs = self.multiplexer.process(evs, Instant::now());
            if !evs.is_empty() {
                log::trace!("Events: {evs:?}");
            }
            for component in self.components.iter_mut() {
                if component.is_consumer() {
                    component.consume(&evs)?;
                }
            }

            let elapsed = start.elapsed();
            if elapsed < min_delay {
                thread::sleep(min_delay - elapsed);
            }
        }

        Ok(())
    }

    fn close(&mut self, exit: bool) {
        for component in self.components[..self.opened].iter_mut().rev() {
            component.close(exit);
        }
        self.opened = 0;
    }
}

/// Virtual devices presenting the controller to the host
pub fn outputs(config: &ControllerConfig) -> Vec<Component> {
    let motion = config.motion != MotionSource::Disabled;
    match config.emulation {
        Emulation::Dualsense | Emulation::DualsenseEdge => {
            let ds = Dualsense::new(DualsenseConfig {
                edge: config.emulation == Emulation::DualsenseEdge,
                bluetooth: config.bluetooth,
                touchpad_method: config.touchpad_correction,
                fake_timestamps: config.fake_timestamps,
                enable_touchpad: config.enable_touchpad,
                enable_rgb: config.enable_rgb,
                sync_gyro: config.sync_gyro && motion,
                flip_z: config.flip_z,
                paddles_to_clicks: config.paddles_to_clicks,
                controller_id: config.controller_id,
                left_motion: false,
                cache: config.cache,
            });
            vec![Component::Controller(Box::new(ds))]
        }
        Emulation::Xbox => {
            let mut gamepad = UinputConfig::gamepad(config.theme);
            gamepad.cache = config.cache;
            let mut out = vec![Component::Controller(Box::new(Uinput::new(gamepad)))];
            if motion {
                let mut imu = UinputConfig::motion(Side::Main, config.flip_z);
                imu.sync_gyro = config.sync_gyro;
                imu.cache = config.cache;
                out.push(Component::Controller(Box::new(Uinput::new(imu))));
            }
            if config.enable_touchpad {
                out.push(Component::Controller(Box::new(Uinput::new(
                    UinputConfig::touchpad(),
                ))));
            }
            out
        }
        Emulation::SteamDeck => vec![Component::Controller(Box::new(SteamDeck::new()))],
        Emulation::Disabled => vec![],
    }
}

/// Sleep for `duration`, waking early when the loop should exit
fn sleep_unless_exit(flags: &LoopFlags, duration: Duration) {
    let deadline = Instant::now() + duration;
    while !flags.should_exit() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(FIND_DELAY));
    }
}

/// Back-off after a failed loop
#[derive(Debug)]
struct Backoff {
    started: Instant,
    repeated_fail: bool,
}

impl Backoff {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            repeated_fail: false,
        }
    }

    fn start(&mut self) {
        self.started = Instant::now();
    }

    fn success(&mut self) {
        self.repeated_fail = false;
    }

    /// Delay before the next attempt. Loops that keep failing right after
    /// starting wait longer.
    fn failure(&mut self, now: Instant) -> Duration {
        let failed_fast = now.duration_since(self.started) < LONGER_ERROR_MARGIN;
        let delay = if self.repeated_fail && failed_fast {
            LONGER_ERROR_DELAY
        } else {
            ERROR_DELAY
        };
        self.repeated_fail = failed_fast;
        delay
    }
}

/// Run the device loop of a handheld until `should_exit` is raised,
/// rebuilding the graph when the config changes and backing off on errors.
pub fn run_loop(handheld: &dyn Handheld, state: &State, emitter: &Emitter, flags: &LoopFlags) {
    let mut backoff = Backoff::new();
    let mut warned = false;

    log::info!("Starting device loop for {}", handheld.name());
    while !flags.should_exit() {
        flags.clear_updated();
        let config = state.config();

        let result = handheld.build(&config, emitter).and_then(|mut graph| {
            backoff.start();
            graph.run(flags)
        });

        match result {
            Ok(()) => {
                backoff.success();
                warned = false;
            }
            Err(e) if e.is_not_ready() => {
                if !warned {
                    log::warn!("{} controllers not found, waiting: {e}", handheld.name());
                    warned = true;
                }
                sleep_unless_exit(flags, FIND_DELAY);
            }
            Err(e) => {
                let delay = backoff.failure(Instant::now());
                log::error!("Device loop failed: {e}");
                log::error!(
                    "Assuming controllers disconnected, restarting after {}s",
                    delay.as_secs_f32()
                );
                sleep_unless_exit(flags, delay);
            }
        }
    }

    crate::input::target::close_cached();
    log::info!("Device loop for {} stopped", handheld.name());
}

#[cfg(test)]
mod tests;
