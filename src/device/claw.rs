//! Device graph of the MSI Claw. The controller runs in xinput mode; the
//! shortcut and volume keys arrive on keyboards of their own.
use std::{
    collections::HashMap,
    fs::File,
    io::{self, Write},
    os::fd::{AsRawFd, RawFd},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use evdev::{Device, KeyCode};
use hidapi::HidApi;
use nix::fcntl::{FcntlArg, OFlag};

use crate::{
    config::{Config, ControllerConfig, Emulation, MotionSource},
    drivers::claw::{
        rumble, set_mode, set_rgb, Mode, ProfileAddresses, ADDR_0166, COMMAND_SIZE, PIDS,
        PID_TEST, PID_XINPUT, USAGE_PAGES, VID,
    },
    input::{
        emitter::Emitter,
        event::{ButtonCode, Event, LedMode, Side},
        multiplexer::{DpadMode, Multiplexer, MultiplexerConfig, TriggerMode},
        source::{
            evdev::{xbox_axes, xbox_buttons, EvdevMatch, EvdevSource, EvdevTranslator},
            hidraw::{HidrawCallback, HidrawMatch, HidrawSource},
        },
        target::uinput::{Uinput, UinputConfig},
        Component, DeviceError, Producer,
    },
};

use super::{outputs, DeviceGraph, Handheld};

/// Shortest press of the shortcut keys. The keyboard releases them right
/// away, too quickly for the multiplexer to see a press.
const BUTTON_MIN_DELAY: Duration = Duration::from_millis(130);

/// Vendor and product id of the AT keyboard
const AT_KBD_ID: u16 = 0x0001;

fn claw_keys() -> HashMap<KeyCode, ButtonCode> {
    HashMap::from([
        (KeyCode::KEY_VOLUMEUP, ButtonCode::KeyVolumeUp),
        (KeyCode::KEY_VOLUMEDOWN, ButtonCode::KeyVolumeDown),
        (KeyCode::KEY_F15, ButtonCode::Mode),
        (KeyCode::KEY_F16, ButtonCode::Share),
    ])
}

/// Returns the PID the controller currently enumerates with
fn find_controller_pid() -> Option<u16> {
    evdev::enumerate().find_map(|(_, device)| {
        let id = device.input_id();
        (id.vendor() == VID && PIDS.contains(&id.product())).then_some(id.product())
    })
}

/// Profile addresses of the connected firmware
fn find_addresses() -> ProfileAddresses {
    let release = HidApi::new().ok().and_then(|api| {
        api.device_list()
            .find(|info| info.vendor_id() == VID && PIDS.contains(&info.product_id()))
            .map(|info| info.release_number())
    });
    match release {
        Some(release) => {
            log::info!("MSI Claw firmware version: {release:#06x}");
            ProfileAddresses::for_release(release)
        }
        None => ADDR_0166,
    }
}

/// Writes padded vendor commands and forwards rumble and leds
#[derive(Debug)]
struct ClawCallback {
    addr: ProfileAddresses,
    test_mode: bool,
    enable_rgb: bool,
    /// Raised when the controller fell back to desktop mode
    desktop: Arc<AtomicBool>,
}

impl ClawCallback {
    fn command(dev: &mut File, cmd: &[u8]) -> io::Result<()> {
        log::debug!("Sending command: {:02x?}", &cmd[..cmd.len().min(8)]);
        dev.write_all(cmd)
    }
}

impl HidrawCallback for ClawCallback {
    fn on_open(&mut self, dev: &mut File) -> io::Result<()> {
        if self.test_mode {
            return Ok(());
        }
        Self::command(dev, &set_mode(Mode::Xinput))
    }

    fn on_events(&mut self, dev: &mut File, events: &[Event]) -> io::Result<()> {
        if self.desktop.swap(false, Ordering::Relaxed) && !self.test_mode {
            log::info!("Controller left xinput mode, switching back");
            Self::command(dev, &set_mode(Mode::Xinput))?;
        }

        for ev in events {
            match ev {
                Event::Rumble(ev) if ev.side == Side::Main => {
                    dev.write_all(&rumble(ev.strong, ev.weak))?;
                }
                Event::Led(led) if self.enable_rgb && !self.test_mode => {
                    let cmd = match led.mode {
                        LedMode::Solid => set_rgb(&self.addr, led.brightness, led.color),
                        LedMode::Disabled => set_rgb(&self.addr, 0.0, (0, 0, 0)),
                        _ => continue,
                    };
                    Self::command(dev, &cmd)?;
                }
                _ => (),
            }
        }
        Ok(())
    }
}

/// Holds back releases of mode and share that follow the press too closely
pub struct MinPress<P> {
    parent: P,
    pressed: HashMap<ButtonCode, Instant>,
    queued: Vec<(ButtonCode, Instant)>,
}

impl<P> MinPress<P> {
    pub fn new(parent: P) -> Self {
        Self {
            parent,
            pressed: HashMap::new(),
            queued: vec![],
        }
    }

    pub fn filter(&mut self, events: Vec<Event>, now: Instant) -> Vec<Event> {
        let mut out = Vec::with_capacity(events.len());
        for ev in events {
            let Event::Button { code, value } = ev else {
                out.push(ev);
                continue;
            };
            if !matches!(code, ButtonCode::Mode | ButtonCode::Share) {
                out.push(ev);
                continue;
            }
            if value {
                self.pressed.insert(code, now);
            } else if let Some(time) = self.pressed.remove(&code) {
                if now.duration_since(time) < BUTTON_MIN_DELAY {
                    self.queued.push((code, time + BUTTON_MIN_DELAY));
                    continue;
                }
            }
            out.push(ev);
        }

        while self.queued.first().is_some_and(|(_, due)| *due <= now) {
            let (code, _) = self.queued.remove(0);
            out.push(Event::button(code, false));
        }
        out
    }
}

impl<P: Producer> Producer for MinPress<P> {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        self.queued.clear();
        self.pressed.clear();
        self.parent.open()
    }

    fn produce(&mut self, ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        let events = self.parent.produce(ready)?;
        Ok(self.filter(events, Instant::now()))
    }

    fn has_pending(&self) -> bool {
        !self.queued.is_empty()
    }

    fn close(&mut self, exit: bool) -> bool {
        self.parent.close(exit)
    }
}

/// Grabs the keyboard and mouse the controller exposes in desktop mode.
/// Any input on them means the controller left xinput mode.
pub struct DesktopDetector {
    matcher: EvdevMatch,
    device: Option<Device>,
    desktop: Arc<AtomicBool>,
}

impl DesktopDetector {
    pub fn new(matcher: EvdevMatch, desktop: Arc<AtomicBool>) -> Self {
        Self {
            matcher,
            device: None,
            desktop,
        }
    }
}

impl Producer for DesktopDetector {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        if let Some(device) = self.device.as_ref() {
            return Ok(vec![device.as_raw_fd()]);
        }
        let Some((path, mut device)) =
            evdev::enumerate().find(|(_, device)| self.matcher.matches(device))
        else {
            log::debug!("Desktop mode device not found ({:?})", self.matcher);
            return Ok(vec![]);
        };
        log::info!("Muting desktop mode device at {}", path.display());
        device.grab()?;
        let fd = device.as_raw_fd();
        nix::fcntl::fcntl(fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).map_err(io::Error::from)?;
        self.device = Some(device);
        Ok(vec![fd])
    }

    fn produce(&mut self, ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        let Some(device) = self.device.as_mut() else {
            return Ok(vec![]);
        };
        if !ready.contains(&device.as_raw_fd()) {
            return Ok(vec![]);
        }
        loop {
            match device.fetch_events() {
                Ok(events) => {
                    if events.count() == 0 {
                        break;
                    }
                    self.desktop.store(true, Ordering::Relaxed);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(vec![])
    }

    fn close(&mut self, _exit: bool) -> bool {
        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.ungrab() {
                log::debug!("Failed to release desktop mode device: {e}");
            }
        }
        true
    }
}

/// Keyboards carrying the shortcut and volume keys
fn shortcut_keyboards() -> [MinPress<EvdevSource>; 2] {
    let at = EvdevSource::new(
        EvdevMatch {
            vid: vec![AT_KBD_ID],
            pid: vec![AT_KBD_ID],
            ..Default::default()
        },
        EvdevTranslator::new(claw_keys(), HashMap::new()),
    )
    .optional();
    let wmi = EvdevSource::new(
        EvdevMatch {
            vid: vec![0x0000],
            pid: vec![0x0000],
            name: vec!["MSI*".into()],
            keys: vec![KeyCode::KEY_F15],
        },
        EvdevTranslator::new(claw_keys(), HashMap::new()),
    )
    .optional();
    [MinPress::new(at), MinPress::new(wmi)]
}

/// Policies of the Claw on top of the user's multiplexer settings
pub fn multiplexer_config(config: &ControllerConfig) -> MultiplexerConfig {
    let mut mux = config.multiplexer.clone();
    mux.trigger = Some(TriggerMode::AnalogToDiscrete);
    mux.dpad = Some(DpadMode::AnalogToDiscrete);
    mux.share_to_qam = true;
    mux
}

/// Graph of the controller. In test mode the controller enumerates with
/// [PID_TEST] and has no desktop mode devices.
pub fn controller_graph(
    config: &ControllerConfig,
    emitter: &Emitter,
    addr: ProfileAddresses,
    test_mode: bool,
) -> DeviceGraph {
    let desktop = Arc::new(AtomicBool::new(false));
    let vendor = HidrawSource::new(
        HidrawMatch {
            vid: vec![VID],
            pid: if test_mode {
                vec![PID_TEST]
            } else {
                PIDS.to_vec()
            },
            usage_page: USAGE_PAGES.to_vec(),
            ..Default::default()
        },
        vec![],
    )
    .with_report_size(COMMAND_SIZE)
    .with_callback(ClawCallback {
        addr,
        test_mode,
        enable_rgb: config.enable_rgb,
        desktop: desktop.clone(),
    });

    let xinput = EvdevSource::new(
        EvdevMatch {
            vid: vec![VID],
            pid: vec![PID_XINPUT, PID_TEST],
            keys: vec![KeyCode::BTN_SOUTH],
            ..Default::default()
        },
        EvdevTranslator::new(xbox_buttons(), xbox_axes()),
    );

    let mux = Multiplexer::new(multiplexer_config(config), Some(emitter.clone()));
    let mut graph = DeviceGraph::new(mux)
        .with_rates(config.min_freq, config.max_freq)
        .with(Component::Controller(Box::new(vendor)))
        .with(Component::Controller(Box::new(xinput)));

    for keyboard in shortcut_keyboards() {
        graph.push(Component::Producer(Box::new(keyboard)));
    }
    if !test_mode {
        for key in [KeyCode::KEY_ESC, KeyCode::BTN_LEFT] {
            let matcher = EvdevMatch {
                vid: vec![VID],
                pid: PIDS.to_vec(),
                keys: vec![key],
                ..Default::default()
            };
            graph.push(Component::Producer(Box::new(DesktopDetector::new(
                matcher,
                desktop.clone(),
            ))));
        }
    }
    graph.push(Component::Controller(Box::new(Uinput::new(
        UinputConfig::volume_keyboard(),
    ))));

    // No motion sensors are exposed by the controller
    let outputs_config = ControllerConfig {
        motion: MotionSource::Disabled,
        ..config.clone()
    };
    for output in outputs(&outputs_config) {
        graph.push(output);
    }
    graph
}

/// Graph used while emulation is disabled: only the shortcut and volume
/// keys are handled.
pub fn keys_graph(config: &ControllerConfig, emitter: &Emitter) -> DeviceGraph {
    let mux = Multiplexer::new(
        MultiplexerConfig {
            share_to_qam: true,
            ..Default::default()
        },
        Some(emitter.clone()),
    );
    let mut graph = DeviceGraph::new(mux).with_rates(config.min_freq, config.max_freq);
    for keyboard in shortcut_keyboards() {
        graph.push(Component::Producer(Box::new(keyboard)));
    }
    graph.with(Component::Controller(Box::new(Uinput::new(
        UinputConfig::volume_keyboard(),
    ))))
}

/// MSI Claw
#[derive(Debug, Default)]
pub struct Claw;

impl Claw {
    pub fn new() -> Self {
        Self
    }
}

impl Handheld for Claw {
    fn name(&self) -> &'static str {
        "MSI Claw"
    }

    fn build(&self, config: &Config, emitter: &Emitter) -> Result<DeviceGraph, DeviceError> {
        let Some(pid) = find_controller_pid() else {
            return Err(DeviceError::NotReady("MSI Claw controller not found".into()));
        };
        if config.controller.emulation == Emulation::Disabled {
            log::info!("Controller emulation is disabled, handling the keys only");
            return Ok(keys_graph(&config.controller, emitter));
        }

        let test_mode = pid == PID_TEST;
        log::info!("Launching emulated controller (test mode: {test_mode})");
        Ok(controller_graph(
            &config.controller,
            emitter,
            find_addresses(),
            test_mode,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::event::{LedEvent, RumbleEvent};

    #[test]
    fn short_presses_are_held() {
        let mut mp = MinPress::new(());
        let now = Instant::now();
        let out = mp.filter(
            vec![
                Event::button(ButtonCode::Mode, true),
                Event::button(ButtonCode::Mode, false),
                Event::button(ButtonCode::KeyVolumeUp, true),
            ],
            now,
        );
        assert_eq!(
            out,
            vec![
                Event::button(ButtonCode::Mode, true),
                Event::button(ButtonCode::KeyVolumeUp, true),
            ]
        );
        assert!(!mp.queued.is_empty());

        assert!(mp.filter(vec![], now + Duration::from_millis(50)).is_empty());
        let out = mp.filter(vec![], now + BUTTON_MIN_DELAY);
        assert_eq!(out, vec![Event::button(ButtonCode::Mode, false)]);
        assert!(mp.queued.is_empty());
    }

    #[test]
    fn long_presses_pass_through() {
        let mut mp = MinPress::new(());
        let now = Instant::now();
        mp.filter(vec![Event::button(ButtonCode::Share, true)], now);
        let out = mp.filter(
            vec![Event::button(ButtonCode::Share, false)],
            now + Duration::from_millis(200),
        );
        assert_eq!(out, vec![Event::button(ButtonCode::Share, false)]);
        assert!(mp.queued.is_empty());
    }

    fn callback(test_mode: bool) -> ClawCallback {
        ClawCallback {
            addr: ADDR_0166,
            test_mode,
            enable_rgb: true,
            desktop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn written(cb: &mut ClawCallback, events: &[Event], open: bool) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hidraw");
        let mut dev = File::create(&path).unwrap();
        if open {
            cb.on_open(&mut dev).unwrap();
        }
        cb.on_events(&mut dev, events).unwrap();
        drop(dev);
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn feedback_is_forwarded() {
        let led = Event::Led(LedEvent {
            mode: LedMode::Solid,
            color: (255, 0, 0),
            brightness: 1.0,
            ..Default::default()
        });
        let rumble = Event::Rumble(RumbleEvent::new(1.0, 0.5));

        let out = written(&mut callback(false), &[rumble, led.clone()], true);
        // mode switch, rumble, led
        assert_eq!(out.len(), COMMAND_SIZE + 11 + COMMAND_SIZE);
        assert_eq!(&out[COMMAND_SIZE..COMMAND_SIZE + 6], &[0x05, 0x01, 0, 0, 127, 255]);
        assert_eq!(out[COMMAND_SIZE + 11 + 13], 100);

        // The firmware test mode ignores the vendor commands
        let out = written(&mut callback(true), &[led], true);
        assert!(out.is_empty());
    }

    #[test]
    fn desktop_mode_is_reverted() {
        let mut cb = callback(false);
        assert!(written(&mut cb, &[], false).is_empty());

        cb.desktop.store(true, Ordering::Relaxed);
        let out = written(&mut cb, &[], false);
        assert_eq!(out, set_mode(Mode::Xinput));
        assert!(!cb.desktop.load(Ordering::Relaxed));
    }

    #[test]
    fn claw_policies() {
        let mut config = ControllerConfig::default();
        config.multiplexer.nintendo_mode = true;
        let mux = multiplexer_config(&config);
        assert_eq!(mux.trigger, Some(TriggerMode::AnalogToDiscrete));
        assert_eq!(mux.dpad, Some(DpadMode::AnalogToDiscrete));
        assert!(mux.share_to_qam);
        assert!(mux.nintendo_mode);
    }

    #[test]
    fn graph_layout() {
        let emitter = Emitter::default();
        let config = ControllerConfig::default();
        // vendor, xinput, 2 keyboards, 2 desktop detectors, volume, dualsense
        assert_eq!(controller_graph(&config, &emitter, ADDR_0166, false).len(), 8);

        let config = ControllerConfig {
            emulation: Emulation::Xbox,
            enable_touchpad: false,
            ..Default::default()
        };
        // vendor, xinput, 2 keyboards, volume, gamepad
        assert_eq!(controller_graph(&config, &emitter, ADDR_0166, true).len(), 6);
        assert_eq!(keys_graph(&config, &emitter).len(), 3);
    }
}
