//! Virtual DualSense and DualSense Edge controllers, over USB or Bluetooth.
use std::{
    sync::OnceLock,
    time::{Duration, Instant},
};

use nix::errno::Errno;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    drivers::dualsense::{
        driver::*,
        hid_report::PackedInputDataReport,
        report_descriptor::{
            DS_BT_DESCRIPTOR, DS_EDGE_BT_DESCRIPTOR, DS_EDGE_USB_DESCRIPTOR, DS_USB_DESCRIPTOR,
        },
    },
    input::{
        cache::{Cacheable, ControllerCache},
        event::{AxisCode, ButtonCode, ConfigCode, Event, LedEvent, RumbleEvent, Scalar},
        mapping::{encode_axis, set_button, AxisMap, ButtonMap, NumType},
        touchpad::{correct_touchpad, TouchpadCorrection, TouchpadCorrectionType},
        Consumer, DeviceError, Producer,
    },
    uhid::{Bus, DeviceParams, Uhid, UhidEvent},
};

use std::os::fd::RawFd;

/// Without IMU timestamps for this long, a gyro synced controller falls back
/// to fake timestamps
pub const MAX_IMU_SYNC_DELAY: Duration = Duration::from_secs(2);

/// Gyro counts per rad/s
const GYRO_SCALE: f64 = 20.0 * 180.0 / std::f64::consts::PI;
/// Accelerometer counts per m/s²
const ACCEL_SCALE: f64 = 1019.0;

/// Back paddles that click the touchpad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaddlesToClicks {
    #[default]
    Disabled,
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "snake_case")]
pub struct DualsenseConfig {
    /// Emulate the DualSense Edge, with back paddles
    pub edge: bool,
    pub bluetooth: bool,
    pub touchpad_method: TouchpadCorrectionType,
    /// Always stamp reports with the host clock
    pub fake_timestamps: bool,
    pub enable_touchpad: bool,
    /// Forward lightbar changes from the host
    pub enable_rgb: bool,
    /// Only send a report when an IMU sample arrives
    pub sync_gyro: bool,
    pub flip_z: bool,
    pub paddles_to_clicks: PaddlesToClicks,
    /// Makes the MAC address of multiple controllers distinct
    pub controller_id: u8,
    /// Only forward the IMU of the left controller, as a separate device
    pub left_motion: bool,
    /// Keep the device alive between device loop restarts
    pub cache: bool,
}

impl Default for DualsenseConfig {
    fn default() -> Self {
        Self {
            edge: true,
            bluetooth: true,
            touchpad_method: TouchpadCorrectionType::CropEnd,
            fake_timestamps: false,
            enable_touchpad: true,
            enable_rgb: true,
            sync_gyro: false,
            flip_z: true,
            paddles_to_clicks: PaddlesToClicks::Disabled,
            controller_id: 0,
            left_motion: false,
            cache: false,
        }
    }
}

/// Identity of a cached controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualsenseKey {
    pub edge: bool,
    pub bluetooth: bool,
    pub controller_id: u8,
}

static CACHE: OnceLock<ControllerCache<Dualsense>> = OnceLock::new();
static CACHE_LEFT: OnceLock<ControllerCache<Dualsense>> = OnceLock::new();
static CLOCK: OnceLock<Instant> = OnceLock::new();

fn cache(left_motion: bool) -> &'static ControllerCache<Dualsense> {
    if left_motion {
        CACHE_LEFT.get_or_init(ControllerCache::default)
    } else {
        CACHE.get_or_init(ControllerCache::default)
    }
}

/// Destroy both cached controllers
pub fn close_cached() {
    cache(false).close();
    cache(true).close();
}

/// Host clock in nanoseconds
fn clock_ns(now: Instant) -> f64 {
    let start = *CLOCK.get_or_init(Instant::now);
    now.saturating_duration_since(start).as_nanos() as f64
}

fn axis_map(code: AxisCode, ofs: usize) -> Option<AxisMap> {
    let at = |byte: usize| (ofs + byte) << 3;
    let imu = |byte: usize, scale: f64| AxisMap::new(at(byte), NumType::I16).with_scale(scale);
    let accel = |byte: usize| imu(byte, ACCEL_SCALE).with_bounds(-(1 << 15) + 2, (1 << 15) - 1);

    Some(match code {
        AxisCode::LsX => AxisMap::new(at(0), NumType::M8),
        AxisCode::LsY => AxisMap::new(at(1), NumType::M8),
        AxisCode::RsX => AxisMap::new(at(2), NumType::M8),
        AxisCode::RsY => AxisMap::new(at(3), NumType::M8),
        AxisCode::Rt => AxisMap::new(at(4), NumType::U8),
        AxisCode::Lt => AxisMap::new(at(5), NumType::U8),
        AxisCode::GyroX => imu(15, GYRO_SCALE),
        AxisCode::GyroY => imu(17, GYRO_SCALE),
        AxisCode::GyroZ => imu(19, GYRO_SCALE),
        AxisCode::AccelX => accel(21),
        AxisCode::AccelY => accel(23),
        AxisCode::AccelZ => accel(25),
        _ => return None,
    })
}

/// Contact bit of a touch point, set when not touching
fn touch_map(ofs: usize, point: usize) -> ButtonMap {
    ButtonMap::new((ofs + 32 + 4 * point) << 3).flipped()
}

fn button_map(code: ButtonCode, ofs: usize) -> Option<ButtonMap> {
    let at = |byte: usize, bit: usize| ButtonMap::new(((ofs + byte) << 3) + bit);

    Some(match code {
        ButtonCode::Y => at(7, 0),
        ButtonCode::B => at(7, 1),
        ButtonCode::A => at(7, 2),
        ButtonCode::X => at(7, 3),
        ButtonCode::Rs => at(8, 0),
        ButtonCode::Ls => at(8, 1),
        ButtonCode::Start => at(8, 2),
        ButtonCode::Select => at(8, 3),
        ButtonCode::Lt => at(8, 4),
        ButtonCode::Rt => at(8, 5),
        ButtonCode::Rb => at(8, 6),
        ButtonCode::Lb => at(8, 7),
        ButtonCode::ExtraR2 => at(9, 0),
        ButtonCode::ExtraL2 => at(9, 1),
        ButtonCode::ExtraR1 => at(9, 2),
        ButtonCode::ExtraL1 => at(9, 3),
        ButtonCode::ExtraL3 => at(9, 4),
        ButtonCode::Share => at(9, 5),
        ButtonCode::TouchpadLeft => at(9, 6),
        ButtonCode::Mode => at(9, 7),
        ButtonCode::TouchpadTouch => touch_map(ofs, 0),
        _ => return None,
    })
}

fn is_touchpad_axis(code: AxisCode) -> bool {
    matches!(code, AxisCode::TouchpadX | AxisCode::TouchpadY)
}

fn is_touchpad_button(code: ButtonCode) -> bool {
    matches!(
        code,
        ButtonCode::TouchpadTouch | ButtonCode::TouchpadLeft | ButtonCode::TouchpadRight
    )
}

/// A virtual DualSense. Consumes the normalized event stream into input
/// reports and produces rumble and led events from the host output reports.
pub struct Dualsense {
    config: DualsenseConfig,
    uhid: Uhid,
    report: Vec<u8>,
    ofs: usize,
    hat: (f64, f64),
    touchpad_touch: bool,
    correction: TouchpadCorrection,
    rumble: bool,
    available: bool,
    last_imu: Instant,
    imu_failed: bool,
}

impl std::fmt::Debug for Dualsense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dualsense")
            .field("config", &self.config)
            .field("uhid", &self.uhid)
            .field("available", &self.available)
            .finish()
    }
}

impl Dualsense {
    pub fn new(config: DualsenseConfig) -> Self {
        let ofs = if config.bluetooth {
            INPUT_REPORT_BT_OFS
        } else {
            INPUT_REPORT_USB_OFS
        };
        let mut controller = Self {
            config,
            uhid: Uhid::new(),
            report: vec![],
            ofs,
            hat: (0.0, 0.0),
            touchpad_touch: false,
            correction: TouchpadCorrection::default(),
            rumble: false,
            available: false,
            last_imu: Instant::now(),
            imu_failed: false,
        };
        controller.reset();
        controller
    }

    pub fn config(&self) -> &DualsenseConfig {
        &self.config
    }

    /// Whether a program on the host has the device open
    pub fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        if self.config.left_motion {
            DS5_LEFT_NAME
        } else if self.config.edge {
            DS5_EDGE_NAME
        } else {
            DS5_NAME
        }
    }

    fn params(&self) -> DeviceParams {
        let descriptor: &[u8] = match (self.config.edge, self.config.bluetooth) {
            (true, true) => &DS_EDGE_BT_DESCRIPTOR,
            (true, false) => &DS_EDGE_USB_DESCRIPTOR,
            (false, true) => &DS_BT_DESCRIPTOR,
            (false, false) => &DS_USB_DESCRIPTOR,
        };
        DeviceParams {
            name: self.name().to_string(),
            phys: String::new(),
            uniq: String::new(),
            bus: if self.config.bluetooth {
                Bus::Bluetooth
            } else {
                Bus::Usb
            },
            vid: DS5_VID,
            pid: if self.config.edge { DS5_EDGE_PID } else { DS5_PID },
            version: DS5_VERSION,
            country: DS5_COUNTRY,
            descriptor: descriptor.to_vec(),
        }
    }

    /// Reset the report and the per session state
    fn reset(&mut self) {
        let template = PackedInputDataReport::template(self.config.bluetooth);
        self.report = match template.pack_to_vec() {
            Ok(report) => report,
            Err(e) => {
                log::error!("Failed to pack the DualSense report template: {e:?}");
                let size = if self.config.bluetooth {
                    INPUT_REPORT_BT_SIZE
                } else {
                    INPUT_REPORT_USB_SIZE
                };
                vec![0; size]
            }
        };
        self.hat = (0.0, 0.0);
        self.touchpad_touch = false;
        self.rumble = false;
        self.correction = correct_touchpad(
            DS5_TOUCHPAD_WIDTH,
            DS5_TOUCHPAD_HEIGHT,
            1.0,
            self.config.touchpad_method,
        );
        self.last_imu = Instant::now();
        self.imu_failed = false;
    }

    /// Move the device out, leaving a closed controller behind
    fn detach(&mut self) -> Self {
        let mut detached = Dualsense::new(self.config.clone());
        detached.uhid = std::mem::take(&mut self.uhid);
        detached.report = self.report.clone();
        detached.available = self.available;
        detached
    }

    fn write_timestamp(&mut self, ns: f64) {
        let ts = (ns / DELTA_TIME_NS) as u64 as u32;
        let at = self.ofs + 27;
        if let Some(dst) = self.report.get_mut(at..at + 4) {
            dst.copy_from_slice(&ts.to_le_bytes());
        }
    }

    fn set_touch_point(&mut self, bytes: [u8; 3]) {
        let at = self.ofs + 33;
        if let Some(dst) = self.report.get_mut(at..at + 3) {
            dst.copy_from_slice(&bytes);
        }
    }

    fn apply_axis(&mut self, code: AxisCode, value: f64, send: &mut bool, now: Instant) {
        let ofs = self.ofs;
        if !self.config.enable_touchpad && is_touchpad_axis(code) {
            return;
        }
        let code = if self.config.left_motion {
            match code.left_to_main() {
                Some(code) => code,
                None => return,
            }
        } else {
            code
        };

        if let Some(map) = axis_map(code, ofs) {
            let value = if self.config.flip_z && code == AxisCode::GyroZ {
                -value
            } else {
                value
            };
            if let Err(e) = encode_axis(&mut self.report, &map, value) {
                log::warn!("Encoding '{code}' with {value} overflowed: {e}");
            }
        }

        match code {
            AxisCode::HatX => {
                self.hat.0 = value;
                patch_dpad(&mut self.report, ofs, self.hat.0, self.hat.1);
            }
            AxisCode::HatY => {
                self.hat.1 = value;
                patch_dpad(&mut self.report, ofs, self.hat.0, self.hat.1);
            }
            AxisCode::TouchpadX => {
                let x = self.correction.x(value);
                self.report[ofs + 33] = x as u8;
                self.report[ofs + 34] = (self.report[ofs + 34] & 0xf0) | ((x >> 8) as u8 & 0x0f);
            }
            AxisCode::TouchpadY => {
                let y = self.correction.y(value);
                self.report[ofs + 34] = (self.report[ofs + 34] & 0x0f) | (((y & 0x0f) as u8) << 4);
                self.report[ofs + 35] = (y >> 4) as u8;
            }
            AxisCode::ImuTs => {
                *send = true;
                self.last_imu = now;
                self.write_timestamp(value);
            }
            _ => (),
        }
    }

    fn apply_button(&mut self, code: ButtonCode, value: bool) {
        let ofs = self.ofs;
        if self.config.left_motion {
            return;
        }
        if !self.config.enable_touchpad && is_touchpad_button(code) {
            return;
        }

        // Paddles press the bottom corners of the touchpad
        let paddles = self.config.paddles_to_clicks;
        let code = match (paddles, code) {
            (PaddlesToClicks::Top, ButtonCode::ExtraL1)
            | (PaddlesToClicks::Bottom, ButtonCode::ExtraL2) => {
                self.set_touch_point([0x80, 0x01, 0x20]);
                ButtonCode::TouchpadLeft
            }
            (PaddlesToClicks::Top, ButtonCode::ExtraR1)
            | (PaddlesToClicks::Bottom, ButtonCode::ExtraR2) => {
                self.set_touch_point([0x00, 0x06, 0x20]);
                ButtonCode::TouchpadLeft
            }
            _ => code,
        };

        if let Some(map) = button_map(code, ofs) {
            set_button(&mut self.report, &map, value);
        }

        // A touchpad click needs a finger on the touchpad
        match code {
            ButtonCode::TouchpadTouch => self.touchpad_touch = value,
            ButtonCode::TouchpadLeft => {
                set_button(
                    &mut self.report,
                    &touch_map(ofs, 0),
                    value || self.touchpad_touch,
                );
            }
            ButtonCode::TouchpadRight => {
                set_button(
                    &mut self.report,
                    &touch_map(ofs, 0),
                    value || self.touchpad_touch,
                );
                set_button(&mut self.report, &touch_map(ofs, 1), value);
            }
            _ => (),
        }
    }

    fn apply_config(&mut self, code: ConfigCode, value: Scalar) {
        let status = self.ofs + 52;
        if self.config.left_motion {
            return;
        }
        match code {
            ConfigCode::TouchpadAspectRatio => {
                self.correction = correct_touchpad(
                    DS5_TOUCHPAD_WIDTH,
                    DS5_TOUCHPAD_HEIGHT,
                    value.as_f64(),
                    self.config.touchpad_method,
                );
            }
            ConfigCode::IsAttached => {
                let attached = if value.as_bool() { 0x10 } else { 0x00 };
                self.report[status] = (self.report[status] & 0x0f) | attached;
            }
            ConfigCode::Battery => {
                let level = (value.as_f64() / 10.0).max(0.0) as u8 & 0x0f;
                self.report[status] = (self.report[status] & 0xf0) | level;
            }
            _ => (),
        }
    }

    /// Fold a batch of events into the report, then stamp, sequence and
    /// sign it. Returns whether the report should be sent.
    fn update(&mut self, events: &[Event], now: Instant) -> bool {
        let mut send = !self.config.sync_gyro;

        for ev in events {
            match ev {
                Event::Axis { code, value } => {
                    self.apply_axis(*code, *value as f64, &mut send, now)
                }
                Event::Button { code, value } => self.apply_button(*code, *value),
                Event::Configuration { code, value } => self.apply_config(*code, *value),
                _ => (),
            }
        }

        // If the IMU stops, keep the controller alive with fake timestamps
        let failover = self.last_imu + MAX_IMU_SYNC_DELAY < now;
        if self.config.sync_gyro && failover && !self.imu_failed {
            self.imu_failed = true;
            log::error!(
                "IMU did not send data for {}s, disabling gyro sync",
                MAX_IMU_SYNC_DELAY.as_secs()
            );
        }
        if self.config.fake_timestamps || failover {
            self.write_timestamp(clock_ns(now));
        }

        let seq = self.ofs + 6;
        self.report[seq] = self.report[seq].wrapping_add(1);

        if self.config.bluetooth {
            sign_crc32_inplace(&mut self.report, INPUT_CRC32_SEED);
        }

        send || failover
    }

    /// Decode an output report into led and rumble events
    fn handle_output(&mut self, data: &[u8], out: &mut Vec<Event>) {
        let state = match parse_output_report(data, self.config.bluetooth) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("Received unknown output report ({e}): {data:02x?}");
                return;
            }
        };

        if self.config.enable_rgb {
            match lightbar(&state) {
                LightbarUpdate::Unchanged => (),
                LightbarUpdate::Sentinel => {
                    log::debug!("Ignoring lightbar initialization by the host");
                    return;
                }
                LightbarUpdate::Color(r, g, b) => {
                    log::info!("Changing leds to RGB: {r} {g} {b}");
                    out.push(Event::Led(LedEvent::solid((r, g, b))));
                }
            }
        }

        match rumble(&state) {
            Some((strong, weak)) => {
                self.rumble = true;
                out.push(Event::Rumble(RumbleEvent::new(strong, weak)));
            }
            None if self.rumble => {
                self.rumble = false;
                out.push(Event::Rumble(RumbleEvent::new(0.0, 0.0)));
            }
            None => (),
        }
    }

    /// Drain the uhid backchannel
    fn drain(&mut self) -> Result<Vec<Event>, DeviceError> {
        let mut out = vec![];
        if !self.uhid.is_created() {
            return Ok(out);
        }

        while let Some(event) = self.uhid.read_event()? {
            match event {
                UhidEvent::Start | UhidEvent::Stop => log::debug!("Received {event:?}"),
                UhidEvent::Open => self.available = true,
                UhidEvent::Close => self.available = false,
                UhidEvent::GetReport { id, number, .. } => {
                    match feature_report(number, self.config.controller_id, self.config.bluetooth)
                    {
                        Some(report) => self.uhid.get_report_reply(id, 0, &report)?,
                        None => {
                            log::warn!("Received get_report with unknown id {number:#04x}");
                            self.uhid.get_report_reply(id, Errno::EIO as u16, &[])?;
                        }
                    }
                }
                UhidEvent::SetReport { id, number, .. } => {
                    log::warn!("Received set_report with unknown id {number:#04x}");
                    self.uhid.set_report_reply(id, Errno::EIO as u16)?;
                }
                UhidEvent::Output { data } => self.handle_output(&data, &mut out),
            }
        }
        Ok(out)
    }

    fn destroy(&mut self) {
        if let Err(e) = self.uhid.destroy() {
            log::warn!("Failed to destroy '{}': {e}", self.name());
        }
        self.available = false;
    }
}

impl Producer for Dualsense {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        if self.uhid.is_created() {
            return Ok(vec![]);
        }
        self.reset();

        let key = self.cache_key();
        if let Some(mut cached) = cache(self.config.left_motion).get(&key) {
            log::warn!("Using cached controller node for '{}'", self.name());
            self.uhid = std::mem::take(&mut cached.uhid);
            self.report = std::mem::take(&mut cached.report);
            self.available = cached.available;
        } else {
            self.uhid.create(&self.params())?;
        }

        log::info!("Starting '{}'", self.name());
        Ok(vec![])
    }

    fn produce(&mut self, _ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        self.drain()
    }

    fn close(&mut self, exit: bool) -> bool {
        if !self.uhid.is_created() {
            return true;
        }
        if self.config.cache && !exit {
            log::warn!("Caching '{}' to avoid reconnection", self.name());
            let detached = self.detach();
            cache(self.config.left_motion).add(detached);
            return false;
        }
        self.destroy();
        true
    }
}

impl Consumer for Dualsense {
    fn consume(&mut self, events: &[Event]) -> Result<(), DeviceError> {
        if !self.uhid.is_created() {
            return Ok(());
        }
        if self.update(events, Instant::now()) {
            self.uhid.send_input(&self.report)?;
        }
        Ok(())
    }
}

impl Cacheable for Dualsense {
    type Key = DualsenseKey;

    fn cache_key(&self) -> DualsenseKey {
        DualsenseKey {
            edge: self.config.edge,
            bluetooth: self.config.bluetooth,
            controller_id: self.config.controller_id,
        }
    }

    fn keepalive(&mut self, _elapsed: Duration) {
        if let Err(e) = self.drain() {
            log::debug!("Cached controller backchannel failed: {e}");
        }
        if let Err(e) = self.consume(&[]) {
            log::debug!("Cached controller failed to send: {e}");
        }
    }

    fn close_cached(&mut self) {
        self.destroy();
    }
}

impl Drop for Dualsense {
    fn drop(&mut self) {
        if self.uhid.is_created() {
            log::debug!("Destroying '{}'", self.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(config: DualsenseConfig) -> Dualsense {
        Dualsense::new(config)
    }

    fn usb() -> DualsenseConfig {
        DualsenseConfig {
            bluetooth: false,
            ..Default::default()
        }
    }

    fn dpad(ds: &Dualsense) -> u8 {
        ds.report[ds.ofs + 7] & 0x0f
    }

    #[test]
    fn hat_encoding() {
        let mut ds = controller(usb());
        let now = Instant::now();
        ds.update(&[Event::axis(AxisCode::HatX, 1.0)], now);
        assert_eq!(dpad(&ds), 2);
        ds.update(&[Event::axis(AxisCode::HatY, -1.0)], now);
        assert_eq!(dpad(&ds), 1);
        ds.update(&[Event::axis(AxisCode::HatX, 0.0)], now);
        assert_eq!(dpad(&ds), 0);
        ds.update(&[Event::axis(AxisCode::HatY, 0.0)], now);
        assert_eq!(dpad(&ds), 8);
    }

    #[test]
    fn sequence_wraps() {
        let mut ds = controller(usb());
        let now = Instant::now();
        let seq = ds.ofs + 6;
        let mut prev = ds.report[seq];
        for _ in 0..300 {
            ds.update(&[], now);
            assert_eq!(ds.report[seq], prev.wrapping_add(1));
            prev = ds.report[seq];
        }
    }

    #[test]
    fn bluetooth_reports_are_signed() {
        let mut ds = controller(DualsenseConfig::default());
        assert_eq!(ds.report.len(), INPUT_REPORT_BT_SIZE);
        ds.update(&[], Instant::now());
        assert!(verify_crc32(&ds.report, INPUT_CRC32_SEED));

        ds.update(&[Event::button(ButtonCode::A, true)], Instant::now());
        assert!(verify_crc32(&ds.report, INPUT_CRC32_SEED));
        assert_eq!(ds.report[ds.ofs + 7] & 0x20, 0x20);
    }

    #[test]
    fn sticks_and_imu() {
        let mut ds = controller(usb());
        let now = Instant::now();
        ds.update(
            &[
                Event::axis(AxisCode::LsX, 1.0),
                Event::axis(AxisCode::Rt, 1.0),
                Event::axis(AxisCode::AccelX, 9.81),
                Event::axis(AxisCode::GyroZ, 1.0),
                Event::axis(AxisCode::ImuTs, 333_000.0),
            ],
            now,
        );
        let ofs = ds.ofs;
        assert_eq!(ds.report[ofs], 0xfe);
        assert_eq!(ds.report[ofs + 4], 0xff);
        let accel = i16::from_le_bytes([ds.report[ofs + 21], ds.report[ofs + 22]]);
        assert_eq!(accel, 9996);
        // Flipped z
        let gyro = i16::from_le_bytes([ds.report[ofs + 19], ds.report[ofs + 20]]);
        assert_eq!(gyro, -(GYRO_SCALE as i16));
        let ts = &ds.report[ofs + 27..ofs + 31];
        assert_eq!(ts, &1000u32.to_le_bytes());
    }

    #[test]
    fn gyro_sync_and_failover() {
        let mut ds = controller(DualsenseConfig {
            sync_gyro: true,
            ..usb()
        });
        let start = ds.last_imu;
        assert!(!ds.update(&[Event::axis(AxisCode::LsX, 0.5)], start));
        assert!(ds.update(&[Event::axis(AxisCode::ImuTs, 1e6)], start));
        assert!(!ds.imu_failed);

        let late = start + MAX_IMU_SYNC_DELAY + Duration::from_millis(10);
        assert!(ds.update(&[], late));
        assert!(ds.imu_failed);
    }

    #[test]
    fn touchpad_click_needs_touch() {
        let mut ds = controller(usb());
        let now = Instant::now();
        let ofs = ds.ofs;
        // Contact bit is set while lifted
        assert_eq!(ds.report[ofs + 32] & 0x80, 0x80);
        ds.update(&[Event::button(ButtonCode::TouchpadLeft, true)], now);
        assert_eq!(ds.report[ofs + 32] & 0x80, 0);
        assert_eq!(ds.report[ofs + 9] & 0x02, 0x02);
        ds.update(&[Event::button(ButtonCode::TouchpadLeft, false)], now);
        assert_eq!(ds.report[ofs + 32] & 0x80, 0x80);

        ds.update(&[Event::button(ButtonCode::TouchpadRight, true)], now);
        assert_eq!(ds.report[ofs + 36] & 0x80, 0);
    }

    #[test]
    fn paddles_click_touchpad() {
        let mut ds = controller(DualsenseConfig {
            paddles_to_clicks: PaddlesToClicks::Top,
            ..usb()
        });
        let ofs = ds.ofs;
        ds.update(&[Event::button(ButtonCode::ExtraR1, true)], Instant::now());
        assert_eq!(&ds.report[ofs + 33..ofs + 36], &[0x00, 0x06, 0x20]);
        assert_eq!(ds.report[ofs + 9] & 0x02, 0x02);
        // The paddle itself is not pressed
        assert_eq!(ds.report[ofs + 9] & 0x20, 0);
    }

    #[test]
    fn left_motion_forwards_left_imu() {
        let mut ds = controller(DualsenseConfig {
            left_motion: true,
            flip_z: false,
            ..usb()
        });
        let ofs = ds.ofs;
        let before = ds.report.clone();
        ds.update(
            &[
                Event::axis(AxisCode::GyroX, 1.0),
                Event::button(ButtonCode::A, true),
            ],
            Instant::now(),
        );
        assert_eq!(ds.report[ofs + 7], before[ofs + 7]);
        assert_eq!(&ds.report[ofs + 15..ofs + 17], &before[ofs + 15..ofs + 17]);

        ds.update(&[Event::axis(AxisCode::LeftGyroX, 1.0)], Instant::now());
        let gyro = i16::from_le_bytes([ds.report[ofs + 15], ds.report[ofs + 16]]);
        assert_eq!(gyro, GYRO_SCALE as i16);
    }

    #[test]
    fn battery_status() {
        let mut ds = controller(usb());
        let status = ds.ofs + 52;
        ds.update(
            &[
                Event::config(ConfigCode::Battery, 55i64),
                Event::config(ConfigCode::IsAttached, true),
            ],
            Instant::now(),
        );
        assert_eq!(ds.report[status], 0x15);
    }

    #[test]
    fn output_reports_become_events() {
        use crate::drivers::dualsense::hid_report::{
            SetStatePackedOutputData, UsbPackedOutputReport,
        };
        use packed_struct::PackedStruct;

        let mut ds = controller(usb());
        let pack = |state| {
            UsbPackedOutputReport {
                state,
                ..Default::default()
            }
            .pack()
            .unwrap()
            .to_vec()
        };

        let mut out = vec![];
        ds.handle_output(
            &pack(SetStatePackedOutputData {
                enable_improved_rumble_emulation: true,
                rumble_emulation_left: 255,
                allow_led_color: true,
                led_red: 10,
                led_green: 20,
                led_blue: 30,
                ..Default::default()
            }),
            &mut out,
        );
        assert_eq!(
            out,
            vec![
                Event::Led(LedEvent::solid((10, 20, 30))),
                Event::Rumble(RumbleEvent::new(1.0, 0.0)),
            ]
        );

        // Rumble stops once the flags are gone
        let mut out = vec![];
        ds.handle_output(&pack(SetStatePackedOutputData::default()), &mut out);
        assert_eq!(out, vec![Event::Rumble(RumbleEvent::new(0.0, 0.0))]);

        // Initialization colors drop the whole report
        let mut out = vec![];
        ds.handle_output(
            &pack(SetStatePackedOutputData {
                allow_led_color: true,
                led_blue: 128,
                enable_improved_rumble_emulation: true,
                ..Default::default()
            }),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn closed_controller_is_inert() {
        let mut ds = controller(usb());
        assert!(ds.consume(&[Event::button(ButtonCode::A, true)]).is_ok());
        assert!(ds.produce(&[]).unwrap().is_empty());
        assert!(ds.close(false));
    }
}
