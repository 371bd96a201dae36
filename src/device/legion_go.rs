//! Device graph of the Lenovo Legion Go
use std::{
    collections::HashSet,
    fs::File,
    io::{self, Write},
    os::fd::RawFd,
    time::{Duration, Instant},
};

use evdev::KeyCode;

use crate::{
    config::{Config, ControllerConfig, Emulation, MotionSource},
    drivers::legion_go::{
        driver::{ImuPatch, RgbCallback},
        hid_report::{
            disable_gyro, enable_gyro, legion_swap, Controller, BUTTONS_ESSENTIAL, REPORT,
        },
        PIDS, PID_XINPUT, REPORT_SIZE, USAGE, USAGE_PAGE, VID,
    },
    input::{
        emitter::Emitter,
        event::{AxisCode, ButtonCode, Event},
        multiplexer::{
            DpadMode, ImuRouting, LedRouting, Multiplexer, MultiplexerConfig, StatusRouting,
            SwapGuide, TriggerMode,
        },
        source::{
            evdev::{xbox_axes, xbox_buttons, EvdevMatch, EvdevSource, EvdevTranslator},
            hidraw::{HidrawCallback, HidrawMatch, HidrawSource},
            iio::IioSource,
        },
        target::uinput::{Uinput, UinputConfig, HHD_VID},
        Component, Consumer, DeviceError, Producer,
    },
};

use super::{outputs, DeviceGraph, Handheld};

/// Vendor PID prefix of the shortcut devices
const HHD_PID_SHORTCUTS: u16 = 0x7000 | 0x0200;
/// Forward everything for this long after mode or share is pressed
const PASSTHROUGH_HOLD: Duration = Duration::from_secs(1);

/// Returns the PID the controllers currently enumerate with
fn find_controller_pid() -> Option<u16> {
    evdev::enumerate().find_map(|(_, device)| {
        let id = device.input_id();
        (id.vendor() == VID && PIDS.contains(&id.product())).then_some(id.product())
    })
}

fn mode_name(pid: u16) -> &'static str {
    match pid {
        PID_XINPUT => "xinput",
        0x6183 => "dinput",
        0x6184 => "dual_dinput",
        0x6185 => "fps",
        _ => "unknown",
    }
}

/// Vendor commands sent over the raw interface
#[derive(Debug, Default)]
struct LegionCallback {
    rgb: Option<RgbCallback>,
    /// Controller whose gyro feeds the virtual controller
    gyro: Option<Controller>,
    swap_legion: bool,
}

impl HidrawCallback for LegionCallback {
    fn on_open(&mut self, dev: &mut File) -> io::Result<()> {
        dev.write_all(&legion_swap(self.swap_legion))?;
        if let Some(controller) = self.gyro {
            log::info!("Enabling gyro of the {controller:?} controller");
            for cmd in enable_gyro(controller) {
                dev.write_all(&cmd)?;
            }
        }
        Ok(())
    }

    fn on_events(&mut self, dev: &mut File, events: &[Event]) -> io::Result<()> {
        let Some(rgb) = self.rgb.as_mut() else {
            return Ok(());
        };
        // Both controllers are set at once, only the newest state matters
        let led = events.iter().rev().find_map(|ev| match ev {
            Event::Led(led) => Some(led),
            _ => None,
        });
        if let Some(led) = led {
            for cmd in rgb.commands(led) {
                dev.write_all(&cmd)?;
            }
        }
        Ok(())
    }

    fn on_close(&mut self, dev: &mut File, _exit: bool) -> io::Result<()> {
        if let Some(controller) = self.gyro {
            dev.write_all(&disable_gyro(controller))?;
        }
        Ok(())
    }
}

/// Wraps the raw interface so that only the events missing from the xinput
/// device get through, unless mode or share is held. Then every event is
/// forwarded, and the ones forwarded that way are released afterwards.
pub struct SelectivePassthrough<P> {
    parent: P,
    patch: ImuPatch,
    /// Forward while a button is held instead of for a while after a press
    while_pressed: bool,
    pressed: HashSet<ButtonCode>,
    pressed_time: Option<Instant>,
    to_release_buttons: HashSet<ButtonCode>,
    to_release_axes: HashSet<AxisCode>,
}

impl<P> SelectivePassthrough<P> {
    pub fn new(parent: P) -> Self {
        Self {
            parent,
            patch: ImuPatch::new(),
            while_pressed: false,
            pressed: HashSet::new(),
            pressed_time: None,
            to_release_buttons: HashSet::new(),
            to_release_axes: HashSet::new(),
        }
    }

    pub fn while_pressed(mut self) -> Self {
        self.while_pressed = true;
        self
    }

    fn is_forwarding(&self, now: Instant) -> bool {
        if self.while_pressed {
            return !self.pressed.is_empty();
        }
        self.pressed_time
            .is_some_and(|time| now.duration_since(time) < PASSTHROUGH_HOLD)
    }

    fn is_essential(ev: &Event) -> bool {
        match ev {
            Event::Configuration { .. } => true,
            Event::Button { code, .. } => {
                BUTTONS_ESSENTIAL.contains(code) || code.as_str().contains("touchpad")
            }
            Event::Axis { code, .. } => code.is_imu() || code.as_str().contains("touchpad"),
            _ => false,
        }
    }

    /// Filter a batch of the raw interface
    pub fn filter(&mut self, mut events: Vec<Event>, now: Instant) -> Vec<Event> {
        self.patch.apply(&mut events);

        for ev in events.iter() {
            if let Event::Button { code, value } = ev {
                if matches!(code, ButtonCode::Mode | ButtonCode::Share) {
                    if *value {
                        self.pressed_time = Some(now);
                        self.pressed.insert(*code);
                    } else {
                        self.pressed.remove(code);
                    }
                }
            }
        }

        if self.is_forwarding(now) {
            for ev in events.iter() {
                if Self::is_essential(ev) {
                    continue;
                }
                match ev {
                    Event::Button { code, value: true } => {
                        self.to_release_buttons.insert(*code);
                    }
                    Event::Button { code, value: false } => {
                        self.to_release_buttons.remove(code);
                    }
                    Event::Axis { code, .. } => {
                        self.to_release_axes.insert(*code);
                    }
                    _ => (),
                }
            }
            return events;
        }

        let mut out: Vec<Event> = events.into_iter().filter(Self::is_essential).collect();
        for code in self.to_release_buttons.drain() {
            out.push(Event::button(code, false));
        }
        for code in self.to_release_axes.drain() {
            out.push(Event::axis(code, 0.0));
        }
        out
    }
}

impl<P: Producer> Producer for SelectivePassthrough<P> {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        self.parent.open()
    }

    fn produce(&mut self, ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        let events = self.parent.produce(ready)?;
        Ok(self.filter(events, Instant::now()))
    }

    fn close(&mut self, exit: bool) -> bool {
        self.parent.close(exit)
    }
}

impl<P: Consumer> Consumer for SelectivePassthrough<P> {
    fn consume(&mut self, events: &[Event]) -> Result<(), DeviceError> {
        self.parent.consume(events)
    }
}

fn raw_interface(callback: LegionCallback) -> HidrawSource {
    let matcher = HidrawMatch {
        vid: vec![VID],
        pid: PIDS.to_vec(),
        usage_page: vec![USAGE_PAGE],
        usage: vec![USAGE],
        ..Default::default()
    };
    HidrawSource::new(matcher, vec![REPORT])
        .with_report_size(REPORT_SIZE)
        .with_callback(callback)
}

fn shortcuts_keyboard() -> EvdevSource {
    let matcher = EvdevMatch {
        vid: vec![VID],
        pid: PIDS.to_vec(),
        name: vec!["*Keyboard".into()],
        ..Default::default()
    };
    EvdevSource::new(matcher, EvdevTranslator::default())
}

/// Policies of the Legion Go on top of the user's multiplexer settings
pub fn multiplexer_config(config: &ControllerConfig) -> MultiplexerConfig {
    let mut mux = config.multiplexer.clone();
    mux.trigger = Some(TriggerMode::AnalogToDiscrete);
    mux.dpad = Some(DpadMode::Both);
    mux.led = Some(LedRouting::MainToSides);
    mux.status = Some(StatusRouting::BothToMain);
    mux.share_to_qam = true;
    if config.swap_legion {
        mux.swap_guide = Some(SwapGuide::GuideIsSelect);
    }
    mux.imu = match config.motion {
        MotionSource::LeftController => Some(ImuRouting::LeftToMain),
        MotionSource::RightController => Some(ImuRouting::RightToMain),
        MotionSource::Tablet | MotionSource::Disabled => None,
    };
    mux
}

fn uses_touchpad(config: &ControllerConfig) -> bool {
    match config.emulation {
        Emulation::Dualsense | Emulation::DualsenseEdge | Emulation::Xbox => {
            config.enable_touchpad
        }
        Emulation::SteamDeck => true,
        Emulation::Disabled => false,
    }
}

/// Graph of the controllers in xinput mode with emulation enabled
pub fn xinput_graph(config: &ControllerConfig, emitter: &Emitter) -> DeviceGraph {
    let xinput = EvdevSource::new(
        EvdevMatch {
            vid: vec![VID],
            pid: vec![PID_XINPUT],
            keys: vec![KeyCode::BTN_SOUTH],
            ..Default::default()
        },
        EvdevTranslator::new(xbox_buttons(), xbox_axes()),
    );

    let gyro = match config.motion {
        MotionSource::LeftController => Some(Controller::Left),
        MotionSource::RightController => Some(Controller::Right),
        MotionSource::Tablet | MotionSource::Disabled => None,
    };
    let raw = SelectivePassthrough::new(raw_interface(LegionCallback {
        rgb: config.enable_rgb.then(RgbCallback::new),
        gyro,
        swap_legion: config.swap_legion,
    }));

    let mux = Multiplexer::new(multiplexer_config(config), Some(emitter.clone()));
    let mut graph = DeviceGraph::new(mux)
        .with_rates(config.min_freq, config.max_freq)
        .with(Component::Controller(Box::new(xinput)))
        .with(Component::Producer(Box::new(shortcuts_keyboard())));

    if uses_touchpad(config) {
        let touchpad = EvdevSource::new(
            EvdevMatch {
                vid: vec![VID],
                pid: vec![PID_XINPUT],
                name: vec!["*Touchpad".into()],
                keys: vec![KeyCode::BTN_LEFT],
            },
            EvdevTranslator::new(
                [
                    (KeyCode::BTN_TOOL_FINGER, ButtonCode::TouchpadTouch),
                    (KeyCode::BTN_TOOL_DOUBLETAP, ButtonCode::TouchpadRight),
                ]
                .into(),
                [
                    (evdev::AbsoluteAxisCode::ABS_X, AxisCode::TouchpadX),
                    (evdev::AbsoluteAxisCode::ABS_Y, AxisCode::TouchpadY),
                ]
                .into(),
            ),
        )
        .with_aspect_ratio(1.0);
        graph.push(Component::Controller(Box::new(touchpad)));
    }

    graph.push(Component::Controller(Box::new(raw)));

    if config.motion == MotionSource::Tablet {
        graph.push(Component::Producer(Box::new(IioSource::accel())));
        graph.push(Component::Producer(Box::new(
            IioSource::gyro().with_legion_fix(),
        )));
    }

    for output in outputs(config) {
        graph.push(output);
    }
    graph
}

/// Graph used when the controllers are not in xinput mode or emulation is
/// disabled: only the legion shortcuts are exposed, as a separate gamepad.
pub fn shortcuts_graph(pid: u16, config: &ControllerConfig, emitter: &Emitter) -> DeviceGraph {
    let mode = mode_name(pid);
    let raw = SelectivePassthrough::new(raw_interface(LegionCallback {
        rgb: None,
        gyro: None,
        swap_legion: config.swap_legion,
    }))
    .while_pressed();

    let mux = Multiplexer::new(
        MultiplexerConfig {
            trigger: Some(TriggerMode::AnalogToDiscrete),
            dpad: Some(DpadMode::Both),
            share_to_qam: true,
            nintendo_mode: config.multiplexer.nintendo_mode,
            ..Default::default()
        },
        Some(emitter.clone()),
    );

    let mut shortcuts = UinputConfig::gamepad(config.theme);
    shortcuts.name = format!("HHD Shortcuts (Legion Mode: {mode})");
    shortcuts.vid = HHD_VID;
    shortcuts.pid = HHD_PID_SHORTCUTS | (pid & 0xf);
    shortcuts.ff = false;

    DeviceGraph::new(mux)
        .with_rates(config.min_freq, config.max_freq)
        .with(Component::Controller(Box::new(raw)))
        .with(Component::Producer(Box::new(shortcuts_keyboard())))
        .with(Component::Controller(Box::new(Uinput::new(shortcuts))))
}

/// Lenovo Legion Go
#[derive(Debug, Default)]
pub struct LegionGo;

impl LegionGo {
    pub fn new() -> Self {
        Self
    }
}

impl Handheld for LegionGo {
    fn name(&self) -> &'static str {
        "Legion Go"
    }

    fn build(&self, config: &Config, emitter: &Emitter) -> Result<DeviceGraph, DeviceError> {
        let Some(pid) = find_controller_pid() else {
            return Err(DeviceError::NotReady(
                "Legion Go controllers not found".into(),
            ));
        };

        let controller = &config.controller;
        if pid == PID_XINPUT && controller.emulation != Emulation::Disabled {
            log::info!("Launching emulated controller");
            return Ok(xinput_graph(controller, emitter));
        }

        if pid != PID_XINPUT {
            log::info!("Controllers in non-supported mode: {}", mode_name(pid));
        } else {
            log::info!("Controllers in xinput mode but emulation is disabled");
        }
        Ok(shortcuts_graph(pid, controller, emitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough() -> SelectivePassthrough<()> {
        SelectivePassthrough::new(())
    }

    #[test]
    fn only_essentials_are_forwarded() {
        let mut sp = passthrough();
        let now = Instant::now();
        let out = sp.filter(
            vec![
                Event::button(ButtonCode::A, true),
                Event::button(ButtonCode::ExtraL1, true),
                Event::axis(AxisCode::LsX, 0.5),
                Event::axis(AxisCode::LeftAccelX, 1.0),
            ],
            now,
        );
        assert_eq!(
            out,
            vec![
                Event::button(ButtonCode::ExtraL1, true),
                Event::axis(AxisCode::LeftAccelX, 1.0),
            ]
        );
    }

    #[test]
    fn mode_forwards_everything_then_releases() {
        let mut sp = passthrough();
        let now = Instant::now();
        let out = sp.filter(
            vec![
                Event::button(ButtonCode::Mode, true),
                Event::button(ButtonCode::A, true),
                Event::axis(AxisCode::LsX, 0.5),
            ],
            now,
        );
        assert_eq!(out.len(), 3);

        // After the hold window the forwarded inputs are released
        let later = now + PASSTHROUGH_HOLD + Duration::from_millis(10);
        let out = sp.filter(vec![Event::button(ButtonCode::Mode, false)], later);
        assert_eq!(out[0], Event::button(ButtonCode::Mode, false));
        assert!(out.contains(&Event::button(ButtonCode::A, false)));
        assert!(out.contains(&Event::axis(AxisCode::LsX, 0.0)));
        assert_eq!(out.len(), 3);

        // Nothing left to release
        assert!(sp.filter(vec![], later).is_empty());
    }

    #[test]
    fn while_pressed_stops_on_release() {
        let mut sp = passthrough().while_pressed();
        let now = Instant::now();
        let out = sp.filter(
            vec![
                Event::button(ButtonCode::Share, true),
                Event::button(ButtonCode::B, true),
            ],
            now,
        );
        assert_eq!(out.len(), 2);

        let out = sp.filter(
            vec![
                Event::button(ButtonCode::Share, false),
                Event::button(ButtonCode::X, true),
            ],
            now,
        );
        assert_eq!(
            out,
            vec![
                Event::button(ButtonCode::Share, false),
                Event::button(ButtonCode::B, false),
            ]
        );
    }

    #[test]
    fn legion_policies() {
        let mut config = ControllerConfig {
            swap_legion: true,
            motion: MotionSource::RightController,
            ..Default::default()
        };
        config.multiplexer.nintendo_mode = true;

        let mux = multiplexer_config(&config);
        assert_eq!(mux.trigger, Some(TriggerMode::AnalogToDiscrete));
        assert_eq!(mux.dpad, Some(DpadMode::Both));
        assert_eq!(mux.led, Some(LedRouting::MainToSides));
        assert_eq!(mux.status, Some(StatusRouting::BothToMain));
        assert_eq!(mux.swap_guide, Some(SwapGuide::GuideIsSelect));
        assert_eq!(mux.imu, Some(ImuRouting::RightToMain));
        assert!(mux.share_to_qam);
        assert!(mux.nintendo_mode);
    }

    #[test]
    fn graph_layout() {
        let emitter = Emitter::default();
        let config = ControllerConfig::default();
        // xinput, keyboard, touchpad, raw, accel, gyro, dualsense
        assert_eq!(xinput_graph(&config, &emitter).len(), 7);

        let config = ControllerConfig {
            emulation: Emulation::Xbox,
            motion: MotionSource::LeftController,
            enable_touchpad: false,
            ..Default::default()
        };
        // xinput, keyboard, raw, gamepad, motion
        assert_eq!(xinput_graph(&config, &emitter).len(), 5);
        assert_eq!(shortcuts_graph(0x6183, &config, &emitter).len(), 3);
    }

    #[test]
    fn led_commands_use_newest_event() {
        use crate::input::event::{LedEvent, LedMode, Side};

        let mut callback = LegionCallback {
            rgb: Some(RgbCallback::new()),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hidraw");
        let mut dev = File::create(&path).unwrap();

        let led = |side| {
            Event::Led(LedEvent {
                side,
                mode: LedMode::Solid,
                color: (255, 0, 0),
                brightness: 1.0,
                ..Default::default()
            })
        };
        callback
            .on_events(&mut dev, &[led(Side::Left), led(Side::Right)])
            .unwrap();
        drop(dev);

        // set profile, load profile and enable, for both controllers
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len(), 2 * 13 + 2 * 7 + 2 * 7);
    }
}
