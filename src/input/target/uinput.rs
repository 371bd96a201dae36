//! Virtual evdev devices through uinput: gamepads with the look of a known
//! controller, motion sensors and touchpads.
use std::{
    collections::HashSet,
    os::fd::{AsRawFd, RawFd},
    sync::OnceLock,
    time::{Duration, Instant},
};

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventSummary, EventType, FFEffectCode,
    FFEffectKind, InputEvent, InputId, KeyCode, MiscCode, PropType, UInputCode, UinputAbsSetup,
};
use nix::fcntl::{FcntlArg, OFlag};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::input::{
    cache::{Cacheable, ControllerCache},
    event::{AxisCode, ButtonCode, ConfigCode, Event, RumbleEvent, Side},
    Consumer, DeviceError, Producer,
};

use super::dualsense::MAX_IMU_SYNC_DELAY;

pub const HHD_VID: u16 = 0x5335;
pub const HHD_PID_GAMEPAD: u16 = 0x01;
pub const HHD_PID_TOUCHPAD: u16 = 0x04;
pub const HHD_PID_KEYBOARD: u16 = 0x05;
pub const HHD_PID_MOTION: u16 = 0x11;

const BUS_USB: u16 = 0x03;
/// Tracking ids of touches cycle through 1..=MAX_TOUCH_ID
const MAX_TOUCH_ID: i32 = 500;
const MAX_FF_EFFECTS: u32 = 16;

/// Identity presented by a virtual gamepad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ControllerTheme {
    #[default]
    Hhd,
    Ps5,
    Xbox360,
    XboxOne,
    XboxElite,
    XboxSx,
    SteamDeck,
}

impl ControllerTheme {
    /// Vendor id, product id and name
    pub fn ids(&self) -> (u16, u16, &'static str) {
        match self {
            ControllerTheme::Hhd => (HHD_VID, HHD_PID_GAMEPAD, "Handheld Daemon Controller"),
            ControllerTheme::Ps5 => (0x054c, 0x0ce6, "DualSense"),
            ControllerTheme::Xbox360 => (0x045e, 0x028f, "Xbox 360"),
            ControllerTheme::XboxOne => (0x045e, 0x02d1, "Xbox One"),
            ControllerTheme::XboxElite => (0x045e, 0x02e3, "Xbox Elite"),
            ControllerTheme::XboxSx => (0x045e, 0x0b12, "Xbox Series X"),
            ControllerTheme::SteamDeck => (0x28de, 0x1205, "Steam Deck"),
        }
    }
}

/// Maps an axis onto an absolute evdev axis as `scale * value + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsMap {
    pub code: AbsoluteAxisCode,
    pub scale: f64,
    pub offset: f64,
    pub bounds: Option<(i32, i32)>,
}

impl AbsMap {
    pub const fn new(code: AbsoluteAxisCode, scale: f64) -> Self {
        Self {
            code,
            scale,
            offset: 0.0,
            bounds: None,
        }
    }

    pub const fn with_bounds(mut self, min: i32, max: i32) -> Self {
        self.bounds = Some((min, max));
        self
    }

    pub fn encode(&self, value: f64) -> i32 {
        let v = (self.scale * value + self.offset) as i64;
        match self.bounds {
            Some((min, max)) => v.clamp(min as i64, max as i64) as i32,
            None => v.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        }
    }
}

/// Source of `MSC_TIMESTAMP` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timestamps {
    #[default]
    None,
    /// Host clock, whenever something was written
    Host,
    /// `imu_ts` events of the IMU
    Imu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UinputKind {
    Gamepad,
    Motion,
    Touchpad,
    Keyboard,
}

/// Everything needed to create and drive a uinput device
#[derive(Debug, Clone)]
pub struct UinputConfig {
    pub kind: UinputKind,
    pub name: String,
    pub vid: u16,
    pub pid: u16,
    pub version: u16,
    pub keys: Vec<(ButtonCode, KeyCode)>,
    /// Keys advertised without a mapped button
    pub extra_keys: Vec<KeyCode>,
    pub axes: Vec<(AxisCode, AbsMap)>,
    pub abs: Vec<(AbsoluteAxisCode, AbsInfo)>,
    pub props: Vec<PropType>,
    pub ff: bool,
    pub timestamps: Timestamps,
    /// Only sync when an IMU sample arrives
    pub sync_gyro: bool,
    /// Keep the device alive between device loop restarts
    pub cache: bool,
}

fn stick() -> AbsInfo {
    AbsInfo::new(0, -32768, 32767, 16, 128, 0)
}

fn gamepad_keys(paddles: [KeyCode; 4]) -> Vec<(ButtonCode, KeyCode)> {
    vec![
        (ButtonCode::A, KeyCode::BTN_SOUTH),
        (ButtonCode::B, KeyCode::BTN_EAST),
        (ButtonCode::X, KeyCode::BTN_NORTH),
        (ButtonCode::Y, KeyCode::BTN_WEST),
        (ButtonCode::Ls, KeyCode::BTN_THUMBL),
        (ButtonCode::Rs, KeyCode::BTN_THUMBR),
        (ButtonCode::Lb, KeyCode::BTN_TL),
        (ButtonCode::Rb, KeyCode::BTN_TR),
        (ButtonCode::Start, KeyCode::BTN_START),
        (ButtonCode::Select, KeyCode::BTN_SELECT),
        (ButtonCode::Mode, KeyCode::BTN_MODE),
        (ButtonCode::Share, KeyCode::BTN_TRIGGER_HAPPY20),
        (ButtonCode::ExtraL1, paddles[0]),
        (ButtonCode::ExtraR1, paddles[1]),
        (ButtonCode::ExtraL2, paddles[2]),
        (ButtonCode::ExtraR2, paddles[3]),
    ]
}

impl UinputConfig {
    /// An Xbox style gamepad with rumble
    pub fn gamepad(theme: ControllerTheme) -> Self {
        let (vid, pid, name) = theme.ids();
        let mut keys = match theme {
            // The Elite driver expects the paddles on these codes
            ControllerTheme::XboxElite => gamepad_keys([
                KeyCode::BTN_TRIGGER_HAPPY7,
                KeyCode::BTN_TRIGGER_HAPPY5,
                KeyCode::BTN_TRIGGER_HAPPY8,
                KeyCode::BTN_TRIGGER_HAPPY6,
            ]),
            _ => gamepad_keys([
                KeyCode::BTN_TRIGGER_HAPPY1,
                KeyCode::BTN_TRIGGER_HAPPY2,
                KeyCode::BTN_TRIGGER_HAPPY3,
                KeyCode::BTN_TRIGGER_HAPPY4,
            ]),
        };
        if theme != ControllerTheme::XboxElite {
            keys.push((ButtonCode::ExtraL3, KeyCode::BTN_TRIGGER_HAPPY5));
            keys.push((ButtonCode::ExtraR3, KeyCode::BTN_TRIGGER_HAPPY6));
        }

        let trigger = AbsInfo::new(0, 0, 255, 0, 0, 0);
        let hat = AbsInfo::new(0, -1, 1, 0, 0, 0);
        let half = (i16::MAX) as f64;
        Self {
            kind: UinputKind::Gamepad,
            name: name.to_string(),
            vid,
            pid,
            version: 1,
            keys,
            extra_keys: vec![],
            axes: vec![
                (AxisCode::LsX, AbsMap::new(AbsoluteAxisCode::ABS_X, half)),
                (AxisCode::LsY, AbsMap::new(AbsoluteAxisCode::ABS_Y, half)),
                (AxisCode::RsX, AbsMap::new(AbsoluteAxisCode::ABS_RX, half)),
                (AxisCode::RsY, AbsMap::new(AbsoluteAxisCode::ABS_RY, half)),
                (AxisCode::Rt, AbsMap::new(AbsoluteAxisCode::ABS_Z, 255.0)),
                (AxisCode::Lt, AbsMap::new(AbsoluteAxisCode::ABS_RZ, 255.0)),
                (AxisCode::HatX, AbsMap::new(AbsoluteAxisCode::ABS_HAT0X, 1.0)),
                (AxisCode::HatY, AbsMap::new(AbsoluteAxisCode::ABS_HAT0Y, 1.0)),
            ],
            abs: vec![
                (AbsoluteAxisCode::ABS_X, stick()),
                (AbsoluteAxisCode::ABS_Y, stick()),
                (AbsoluteAxisCode::ABS_Z, trigger),
                (AbsoluteAxisCode::ABS_RX, stick()),
                (AbsoluteAxisCode::ABS_RY, stick()),
                (AbsoluteAxisCode::ABS_RZ, trigger),
                (AbsoluteAxisCode::ABS_HAT0X, hat),
                (AbsoluteAxisCode::ABS_HAT0Y, hat),
            ],
            props: vec![],
            ff: true,
            timestamps: Timestamps::None,
            sync_gyro: false,
            cache: false,
        }
    }

    /// A motion sensor device. `side` picks the IMU axes that feed it.
    pub fn motion(side: Side, flip_z: bool) -> Self {
        let accel_scale = 8192.0 / 9.8;
        let gyro_scale = 1024.0 * 180.0 / std::f64::consts::PI;
        let accel = AbsInfo::new(0, -32768, 32768, 16, 0, 8192);
        let gyro = AbsInfo::new(0, -2097152, 2097152, 16, 0, 1024);

        let axis = |code: AxisCode| match (side, code.main_to_sides()) {
            (Side::Left, Some((left, _))) => left,
            (Side::Right, Some((_, right))) => right,
            _ => code,
        };
        let accel_map = |abs| AbsMap::new(abs, accel_scale).with_bounds(-32768, 32768);
        let gyro_map = |abs, scale: f64| AbsMap::new(abs, scale).with_bounds(-2097152, 2097152);
        let z_scale = if flip_z { -gyro_scale } else { gyro_scale };

        Self {
            kind: UinputKind::Motion,
            name: "Handheld Daemon Controller Motion Sensors".to_string(),
            vid: HHD_VID,
            pid: HHD_PID_MOTION,
            version: 1,
            keys: vec![],
            extra_keys: vec![],
            axes: vec![
                (axis(AxisCode::AccelX), accel_map(AbsoluteAxisCode::ABS_X)),
                (axis(AxisCode::AccelY), accel_map(AbsoluteAxisCode::ABS_Y)),
                (axis(AxisCode::AccelZ), accel_map(AbsoluteAxisCode::ABS_Z)),
                (
                    axis(AxisCode::GyroX),
                    gyro_map(AbsoluteAxisCode::ABS_RX, gyro_scale),
                ),
                (
                    axis(AxisCode::GyroY),
                    gyro_map(AbsoluteAxisCode::ABS_RY, gyro_scale),
                ),
                (
                    axis(AxisCode::GyroZ),
                    gyro_map(AbsoluteAxisCode::ABS_RZ, z_scale),
                ),
            ],
            abs: vec![
                (AbsoluteAxisCode::ABS_X, accel),
                (AbsoluteAxisCode::ABS_Y, accel),
                (AbsoluteAxisCode::ABS_Z, accel),
                (AbsoluteAxisCode::ABS_RX, gyro),
                (AbsoluteAxisCode::ABS_RY, gyro),
                (AbsoluteAxisCode::ABS_RZ, gyro),
            ],
            props: vec![PropType::ACCELEROMETER],
            ff: false,
            timestamps: Timestamps::Imu,
            sync_gyro: false,
            cache: false,
        }
    }

    /// Keyboard carrying the volume keys of handhelds that report them on
    /// a grabbed vendor keyboard
    pub fn volume_keyboard() -> Self {
        Self {
            kind: UinputKind::Keyboard,
            name: "Handheld Daemon Volume Keyboard".to_string(),
            vid: HHD_VID,
            pid: HHD_PID_KEYBOARD,
            version: 1,
            keys: vec![
                (ButtonCode::KeyVolumeUp, KeyCode::KEY_VOLUMEUP),
                (ButtonCode::KeyVolumeDown, KeyCode::KEY_VOLUMEDOWN),
            ],
            extra_keys: vec![],
            axes: vec![],
            abs: vec![],
            props: vec![],
            ff: false,
            timestamps: Timestamps::Host,
            sync_gyro: false,
            cache: false,
        }
    }

    /// A clickable touchpad
    pub fn touchpad() -> Self {
        let pos = AbsInfo::new(0, 0, 2048, 0, 0, 36);
        Self {
            kind: UinputKind::Touchpad,
            name: "Handheld Daemon Touchpad".to_string(),
            vid: HHD_VID,
            pid: HHD_PID_TOUCHPAD,
            version: 1,
            keys: vec![
                (ButtonCode::TouchpadTouch, KeyCode::BTN_TOUCH),
                (ButtonCode::TouchpadRight, KeyCode::BTN_RIGHT),
                (ButtonCode::TouchpadLeft, KeyCode::BTN_LEFT),
            ],
            extra_keys: vec![
                KeyCode::BTN_TOOL_FINGER,
                KeyCode::BTN_TOOL_DOUBLETAP,
                KeyCode::BTN_TOOL_TRIPLETAP,
            ],
            axes: vec![
                (
                    AxisCode::TouchpadX,
                    AbsMap::new(AbsoluteAxisCode::ABS_X, 1023.0).with_bounds(0, 2048),
                ),
                (
                    AxisCode::TouchpadY,
                    AbsMap::new(AbsoluteAxisCode::ABS_Y, 1023.0).with_bounds(0, 2048),
                ),
            ],
            abs: vec![
                (AbsoluteAxisCode::ABS_X, pos),
                (AbsoluteAxisCode::ABS_Y, pos),
                (AbsoluteAxisCode::ABS_MT_SLOT, AbsInfo::new(0, 0, 2, 0, 0, 0)),
                (AbsoluteAxisCode::ABS_MT_POSITION_X, pos),
                (AbsoluteAxisCode::ABS_MT_POSITION_Y, pos),
                (
                    AbsoluteAxisCode::ABS_MT_TOOL_TYPE,
                    AbsInfo::new(0, 0, 2, 0, 0, 0),
                ),
                (
                    AbsoluteAxisCode::ABS_MT_TRACKING_ID,
                    AbsInfo::new(0, 0, u16::MAX.into(), 0, 0, 0),
                ),
            ],
            props: vec![PropType::POINTER, PropType::BUTTONPAD],
            ff: false,
            timestamps: Timestamps::Host,
            sync_gyro: false,
            cache: false,
        }
    }

    fn build(&self) -> Result<VirtualDevice, DeviceError> {
        let mut keys = AttributeSet::<KeyCode>::new();
        for (_, key) in self.keys.iter() {
            keys.insert(*key);
        }
        for key in self.extra_keys.iter() {
            keys.insert(*key);
        }

        let id = InputId::new(BusType(BUS_USB), self.vid, self.pid, self.version);
        let mut builder = VirtualDeviceBuilder::new()?.name(&self.name).input_id(id);

        if !self.props.is_empty() {
            let mut props = AttributeSet::<PropType>::new();
            for prop in self.props.iter() {
                props.insert(*prop);
            }
            builder = builder.with_properties(&props)?;
        }
        if !self.keys.is_empty() || !self.extra_keys.is_empty() {
            builder = builder.with_keys(&keys)?;
        }
        for (code, info) in self.abs.iter() {
            builder = builder.with_absolute_axis(&UinputAbsSetup::new(*code, *info))?;
        }
        if self.timestamps != Timestamps::None {
            let mut mscs = AttributeSet::<MiscCode>::new();
            mscs.insert(MiscCode::MSC_TIMESTAMP);
            builder = builder.with_msc(&mscs)?;
        }
        if self.ff {
            let mut ff = AttributeSet::<FFEffectCode>::new();
            ff.insert(FFEffectCode::FF_RUMBLE);
            ff.insert(FFEffectCode::FF_PERIODIC);
            ff.insert(FFEffectCode::FF_SQUARE);
            ff.insert(FFEffectCode::FF_TRIANGLE);
            ff.insert(FFEffectCode::FF_SINE);
            ff.insert(FFEffectCode::FF_GAIN);
            builder = builder.with_ff(&ff)?.with_ff_effects_max(MAX_FF_EFFECTS);
        }

        let device = builder.build()?;
        nix::fcntl::fcntl(device.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
            .map_err(std::io::Error::from)?;
        Ok(device)
    }
}

/// Identity of a cached uinput device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UinputKey {
    kind: UinputKind,
    name: String,
    vid: u16,
    pid: u16,
}

static CACHE: OnceLock<ControllerCache<Uinput>> = OnceLock::new();
static CACHE_MOTIONS: OnceLock<ControllerCache<Uinput>> = OnceLock::new();
static CLOCK: OnceLock<Instant> = OnceLock::new();

fn cache(kind: UinputKind) -> &'static ControllerCache<Uinput> {
    match kind {
        UinputKind::Motion => CACHE_MOTIONS.get_or_init(ControllerCache::default),
        _ => CACHE.get_or_init(ControllerCache::default),
    }
}

/// Destroy the cached gamepad and motion devices
pub fn close_cached() {
    cache(UinputKind::Gamepad).close();
    cache(UinputKind::Motion).close();
}

fn key(type_: EventType, code: u16, value: i32) -> InputEvent {
    InputEvent::new(type_.0, code, value)
}

pub struct Uinput {
    config: UinputConfig,
    device: Option<VirtualDevice>,
    touchpad_aspect: f64,
    touch_id: i32,
    /// Written events waiting for a sync
    pending: Vec<InputEvent>,
    rumble: Option<RumbleEvent>,
    last_imu: Instant,
    imu_failed: bool,
}

impl std::fmt::Debug for Uinput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uinput")
            .field("name", &self.config.name)
            .field("created", &self.device.is_some())
            .finish()
    }
}

impl Uinput {
    pub fn new(config: UinputConfig) -> Self {
        Self {
            config,
            device: None,
            touchpad_aspect: 1.0,
            touch_id: 1,
            pending: vec![],
            rumble: None,
            last_imu: Instant::now(),
            imu_failed: false,
        }
    }

    pub fn config(&self) -> &UinputConfig {
        &self.config
    }

    fn next_touch_id(&mut self) -> i32 {
        let id = self.touch_id;
        self.touch_id = if id >= MAX_TOUCH_ID { 1 } else { id + 1 };
        id
    }

    /// Translate a batch into evdev events. Returns the events to emit if
    /// the batch completes a frame. Later values of the same code win.
    fn update(&mut self, events: &[Event], now: Instant) -> Option<Vec<InputEvent>> {
        let mut should_syn = !self.config.sync_gyro;
        let mut seen = HashSet::new();
        let mut written = vec![];
        let mut wrote_ts = false;

        for ev in events.iter().rev() {
            match ev {
                Event::Axis { code, value } => {
                    if !seen.insert((0u8, code.as_str())) {
                        continue;
                    }
                    let value = *value as f64;
                    let is_ts = *code == AxisCode::ImuTs
                        || code.left_to_main() == Some(AxisCode::ImuTs)
                        || code.right_to_main() == Some(AxisCode::ImuTs);
                    if is_ts && !should_syn {
                        self.imu_failed = false;
                        self.last_imu = now;
                        should_syn = true;
                    }

                    if let Some((_, map)) = self.config.axes.iter().find(|(c, _)| c == code) {
                        let val = if *code == AxisCode::TouchpadX {
                            let mut map = *map;
                            map.scale *= self.touchpad_aspect;
                            map.encode(value)
                        } else {
                            map.encode(value)
                        };
                        let mut out = vec![key(EventType::ABSOLUTE, map.code.0, val)];
                        match code {
                            AxisCode::TouchpadX => out.push(key(
                                EventType::ABSOLUTE,
                                AbsoluteAxisCode::ABS_MT_POSITION_X.0,
                                val,
                            )),
                            AxisCode::TouchpadY => out.push(key(
                                EventType::ABSOLUTE,
                                AbsoluteAxisCode::ABS_MT_POSITION_Y.0,
                                val,
                            )),
                            _ => (),
                        }
                        written.push(out);
                    } else if is_ts && self.config.timestamps == Timestamps::Imu {
                        // Nanoseconds to the microseconds of evdev
                        let ts = ((value as i64 / 1000) % (1i64 << 31)) as i32;
                        written.push(vec![key(EventType::MISC, MiscCode::MSC_TIMESTAMP.0, ts)]);
                        wrote_ts = true;
                    }
                }
                Event::Button { code, value } => {
                    if !seen.insert((1u8, code.as_str())) {
                        continue;
                    }
                    let Some((_, btn)) = self.config.keys.iter().find(|(c, _)| c == code) else {
                        continue;
                    };
                    let btn = *btn;
                    let mut out = vec![];
                    if *code == ButtonCode::TouchpadTouch {
                        let id = if *value { self.next_touch_id() } else { -1 };
                        out.push(key(
                            EventType::ABSOLUTE,
                            AbsoluteAxisCode::ABS_MT_TRACKING_ID.0,
                            id,
                        ));
                        out.push(key(
                            EventType::KEY,
                            KeyCode::BTN_TOOL_FINGER.0,
                            *value as i32,
                        ));
                    }
                    out.push(key(EventType::KEY, btn.0, *value as i32));
                    written.push(out);
                }
                Event::Configuration { code, value } => {
                    if *code == ConfigCode::TouchpadAspectRatio {
                        self.touchpad_aspect = value.as_f64();
                    }
                }
                _ => (),
            }
        }

        // Restore the order of the batch
        let wrote = !written.is_empty();
        for out in written.into_iter().rev() {
            self.pending.extend(out);
        }

        if wrote && self.config.timestamps == Timestamps::Host {
            let start = *CLOCK.get_or_init(Instant::now);
            let us = now.saturating_duration_since(start).as_micros() as i64;
            let ts = (us % (1i64 << 31)) as i32;
            self.pending
                .push(key(EventType::MISC, MiscCode::MSC_TIMESTAMP.0, ts));
        }

        if self.config.sync_gyro
            && now.saturating_duration_since(self.last_imu) > MAX_IMU_SYNC_DELAY
            && !self.imu_failed
        {
            self.imu_failed = true;
            log::error!(
                "IMU did not send data for {}s, disabling gyro sync",
                MAX_IMU_SYNC_DELAY.as_secs()
            );
        }

        let synced = should_syn || !self.config.sync_gyro || self.imu_failed;
        let stamped = self.config.timestamps != Timestamps::Imu || wrote_ts;
        if !self.pending.is_empty() && synced && stamped {
            return Some(std::mem::take(&mut self.pending));
        }
        None
    }

    fn key(&self) -> UinputKey {
        UinputKey {
            kind: self.config.kind,
            name: self.config.name.clone(),
            vid: self.config.vid,
            pid: self.config.pid,
        }
    }

    fn is_cached(&self) -> bool {
        self.config.cache && self.config.kind != UinputKind::Touchpad
    }

    /// Read feedback of the host: force feedback uploads and playback
    fn drain(&mut self) -> Result<Vec<Event>, DeviceError> {
        let Some(device) = self.device.as_mut() else {
            return Ok(vec![]);
        };
        let events: Vec<InputEvent> = match device.fetch_events() {
            Ok(events) => events.collect(),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => vec![],
            Err(e) => return Err(e.into()),
        };

        let mut out = vec![];
        for event in events {
            match event.destructure() {
                EventSummary::UInput(event, UInputCode::UI_FF_UPLOAD, ..) => {
                    let mut upload = device.process_ff_upload(event)?;
                    if let FFEffectKind::Rumble {
                        strong_magnitude,
                        weak_magnitude,
                    } = upload.effect().kind
                    {
                        let rumble = RumbleEvent::new(
                            strong_magnitude as f32 / u16::MAX as f32,
                            weak_magnitude as f32 / u16::MAX as f32,
                        );
                        log::debug!("Uploaded rumble effect {}: {rumble:?}", upload.effect_id());
                        self.rumble = Some(rumble);
                    }
                    upload.set_retval(0);
                }
                EventSummary::UInput(event, UInputCode::UI_FF_ERASE, ..) => {
                    let mut erase = device.process_ff_erase(event)?;
                    erase.set_retval(0);
                }
                EventSummary::ForceFeedback(_, _, value) if value != 0 => match self.rumble {
                    Some(rumble) => out.push(Event::Rumble(rumble)),
                    None => log::warn!("Rumble requested before a rumble effect was uploaded"),
                },
                EventSummary::ForceFeedback(..) => {
                    out.push(Event::Rumble(RumbleEvent::new(0.0, 0.0)))
                }
                // Timestamps written by us come back
                EventSummary::Misc(..) => (),
                _ => log::debug!("Unhandled uinput event: {event:?}"),
            }
        }
        Ok(out)
    }
}

impl Producer for Uinput {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        if let Some(device) = self.device.as_ref() {
            return Ok(vec![device.as_raw_fd()]);
        }

        log::info!("Opening virtual device '{}'", self.config.name);
        if self.is_cached() {
            if let Some(mut cached) = cache(self.config.kind).get(&self.key()) {
                log::warn!("Using cached device node for '{}'", self.config.name);
                self.device = cached.device.take();
            }
        }
        let device = match self.device.take() {
            Some(device) => device,
            None => self.config.build()?,
        };
        let fd = device.as_raw_fd();
        self.device = Some(device);
        self.touchpad_aspect = 1.0;
        self.touch_id = 1;
        self.pending.clear();
        self.last_imu = Instant::now();
        self.imu_failed = false;
        Ok(vec![fd])
    }

    fn produce(&mut self, _ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        self.drain()
    }

    fn close(&mut self, exit: bool) -> bool {
        if self.device.is_none() {
            return true;
        }
        if self.is_cached() && !exit {
            log::warn!("Caching '{}' to avoid reconnection", self.config.name);
            let mut cached = Uinput::new(self.config.clone());
            cached.device = self.device.take();
            cache(self.config.kind).add(cached);
            return true;
        }
        self.device = None;
        true
    }
}

impl Consumer for Uinput {
    fn consume(&mut self, events: &[Event]) -> Result<(), DeviceError> {
        if self.device.is_none() {
            return Ok(());
        }
        if let Some(out) = self.update(events, Instant::now()) {
            if let Some(device) = self.device.as_mut() {
                device.emit(&out)?;
            }
        }
        Ok(())
    }
}

impl Cacheable for Uinput {
    type Key = UinputKey;

    fn cache_key(&self) -> UinputKey {
        self.key()
    }

    fn keepalive(&mut self, _elapsed: Duration) {
        if let Err(e) = self.drain() {
            log::debug!("Cached device backchannel failed: {e}");
        }
    }

    fn close_cached(&mut self) {
        self.device = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(events: &[InputEvent]) -> Vec<(u16, u16, i32)> {
        events
            .iter()
            .map(|e| (e.event_type().0, e.code(), e.value()))
            .collect()
    }

    #[test]
    fn volume_keyboard_only_sends_volume() {
        let mut dev = Uinput::new(UinputConfig::volume_keyboard());
        let out = dev
            .update(
                &[
                    Event::button(ButtonCode::A, true),
                    Event::button(ButtonCode::KeyVolumeUp, true),
                ],
                Instant::now(),
            )
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(
            (out[0].event_type(), out[0].code(), out[0].value()),
            (EventType::KEY, KeyCode::KEY_VOLUMEUP.0, 1)
        );
        assert_eq!(out[1].event_type(), EventType::MISC);

        assert!(dev
            .update(&[Event::button(ButtonCode::B, true)], Instant::now())
            .is_none());
    }

    #[test]
    fn gamepad_events() {
        let mut dev = Uinput::new(UinputConfig::gamepad(ControllerTheme::Hhd));
        let out = dev
            .update(
                &[
                    Event::button(ButtonCode::A, true),
                    Event::axis(AxisCode::LsX, 1.0),
                    Event::axis(AxisCode::Rt, 0.5),
                    Event::button(ButtonCode::A, false),
                    Event::axis(AxisCode::GyroX, 1.0),
                ],
                Instant::now(),
            )
            .unwrap();
        assert_eq!(
            summary(&out),
            vec![
                (EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_X.0, 32767),
                (EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_Z.0, 127),
                (EventType::KEY.0, KeyCode::BTN_SOUTH.0, 0),
            ]
        );
        assert!(dev.update(&[], Instant::now()).is_none());
    }

    #[test]
    fn elite_paddles() {
        let cfg = UinputConfig::gamepad(ControllerTheme::XboxElite);
        assert_eq!((cfg.vid, cfg.pid), (0x045e, 0x02e3));
        let mut dev = Uinput::new(cfg);
        let out = dev
            .update(&[Event::button(ButtonCode::ExtraL1, true)], Instant::now())
            .unwrap();
        assert_eq!(
            summary(&out),
            vec![(EventType::KEY.0, KeyCode::BTN_TRIGGER_HAPPY7.0, 1)]
        );
    }

    #[test]
    fn touch_ids_cycle() {
        let mut dev = Uinput::new(UinputConfig::touchpad());
        let now = Instant::now();
        let mut last = 0;
        for _ in 0..MAX_TOUCH_ID + 1 {
            let out = dev
                .update(&[Event::button(ButtonCode::TouchpadTouch, true)], now)
                .unwrap();
            last = out[0].value();
        }
        assert_eq!(last, 1);

        let out = dev
            .update(
                &[
                    Event::config(ConfigCode::TouchpadAspectRatio, 2.0),
                    Event::axis(AxisCode::TouchpadX, 0.5),
                    Event::button(ButtonCode::TouchpadTouch, false),
                ],
                now,
            )
            .unwrap();
        let out = summary(&out);
        assert_eq!(out[0], (EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_X.0, 1023));
        assert_eq!(
            out[1],
            (
                EventType::ABSOLUTE.0,
                AbsoluteAxisCode::ABS_MT_POSITION_X.0,
                1023
            )
        );
        assert_eq!(
            out[2],
            (
                EventType::ABSOLUTE.0,
                AbsoluteAxisCode::ABS_MT_TRACKING_ID.0,
                -1
            )
        );
        // Host timestamp closes the frame
        assert_eq!(out.last().unwrap().0, EventType::MISC.0);
    }

    #[test]
    fn motion_waits_for_timestamp() {
        let mut dev = Uinput::new(UinputConfig::motion(Side::Left, true));
        let now = Instant::now();
        assert!(dev
            .update(&[Event::axis(AxisCode::LeftGyroZ, 1.0)], now)
            .is_none());
        // Main axes are not mapped on a left device
        assert!(dev.update(&[Event::axis(AxisCode::GyroZ, 1.0)], now).is_none());

        let out = dev
            .update(&[Event::axis(AxisCode::LeftImuTs, 5_000_000.0)], now)
            .unwrap();
        let out = summary(&out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].1, AbsoluteAxisCode::ABS_RZ.0);
        assert!(out[0].2 < 0);
        assert_eq!(out[1], (EventType::MISC.0, MiscCode::MSC_TIMESTAMP.0, 5000));
    }

    #[test]
    fn abs_map_bounds() {
        let map = AbsMap::new(AbsoluteAxisCode::ABS_X, 1023.0).with_bounds(0, 2048);
        assert_eq!(map.encode(3.0), 2048);
        assert_eq!(map.encode(-1.0), 0);
        assert_eq!(ControllerTheme::SteamDeck.ids().1, 0x1205);
    }
}
