//! Generic evdev producer. The device is grabbed so only the virtual
//! controller reaches the host.
use std::{
    collections::{HashMap, HashSet},
    io,
    os::fd::{AsRawFd, RawFd},
};

use evdev::{
    AbsoluteAxisCode, Device, EventSummary, FFEffect, FFEffectData, FFEffectKind, FFReplay,
    FFTrigger, InputEvent, KeyCode,
};
use nix::fcntl::{FcntlArg, OFlag};

use crate::input::{
    event::{AxisCode, ButtonCode, ConfigCode, Event, RumbleEvent},
    Consumer, DeviceError, Producer,
};

use super::{matches_any, matches_glob};

/// Length of uploaded rumble effects. Rumble is stopped explicitly.
const RUMBLE_LENGTH_MS: u16 = 10000;

pub fn xbox_buttons() -> HashMap<KeyCode, ButtonCode> {
    HashMap::from([
        (KeyCode::BTN_SOUTH, ButtonCode::A),
        (KeyCode::BTN_EAST, ButtonCode::B),
        (KeyCode::BTN_NORTH, ButtonCode::X),
        (KeyCode::BTN_WEST, ButtonCode::Y),
        (KeyCode::BTN_THUMBL, ButtonCode::Ls),
        (KeyCode::BTN_THUMBR, ButtonCode::Rs),
        (KeyCode::BTN_TL, ButtonCode::Lb),
        (KeyCode::BTN_TR, ButtonCode::Rb),
        (KeyCode::BTN_START, ButtonCode::Start),
        (KeyCode::BTN_SELECT, ButtonCode::Select),
        (KeyCode::BTN_MODE, ButtonCode::Mode),
    ])
}

pub fn xbox_axes() -> HashMap<AbsoluteAxisCode, AxisCode> {
    HashMap::from([
        (AbsoluteAxisCode::ABS_X, AxisCode::LsX),
        (AbsoluteAxisCode::ABS_Y, AxisCode::LsY),
        (AbsoluteAxisCode::ABS_RX, AxisCode::RsX),
        (AbsoluteAxisCode::ABS_RY, AxisCode::RsY),
        (AbsoluteAxisCode::ABS_Z, AxisCode::Rt),
        (AbsoluteAxisCode::ABS_RZ, AxisCode::Lt),
        (AbsoluteAxisCode::ABS_HAT0X, AxisCode::HatX),
        (AbsoluteAxisCode::ABS_HAT0Y, AxisCode::HatY),
    ])
}

/// Properties an event device must have. Empty lists match anything.
#[derive(Debug, Clone, Default)]
pub struct EvdevMatch {
    pub vid: Vec<u16>,
    pub pid: Vec<u16>,
    /// Glob patterns
    pub name: Vec<String>,
    /// Keys the device must support
    pub keys: Vec<KeyCode>,
}

impl EvdevMatch {
    pub fn matches(&self, device: &Device) -> bool {
        let id = device.input_id();
        if !matches_any(id.vendor(), &self.vid)
            || !matches_any(id.product(), &self.pid)
            || !matches_glob(device.name(), &self.name)
        {
            return false;
        }
        if self.keys.is_empty() {
            return true;
        }
        let Some(supported) = device.supported_keys() else {
            return false;
        };
        self.keys.iter().all(|key| supported.contains(*key))
    }
}

/// Turns raw evdev events into normalized events
#[derive(Debug, Default)]
pub struct EvdevTranslator {
    buttons: HashMap<KeyCode, ButtonCode>,
    axes: HashMap<AbsoluteAxisCode, AxisCode>,
    ranges: HashMap<AbsoluteAxisCode, (i32, i32)>,
    centered: HashSet<AbsoluteAxisCode>,
}

impl EvdevTranslator {
    pub fn new(
        buttons: HashMap<KeyCode, ButtonCode>,
        axes: HashMap<AbsoluteAxisCode, AxisCode>,
    ) -> Self {
        Self {
            buttons,
            axes,
            ranges: HashMap::new(),
            centered: HashSet::new(),
        }
    }

    /// DInput devices report sticks as unsigned values centered at the
    /// middle of their range
    pub fn with_centered(mut self, axes: impl IntoIterator<Item = AbsoluteAxisCode>) -> Self {
        self.centered.extend(axes);
        self
    }

    pub fn set_range(&mut self, axis: AbsoluteAxisCode, min: i32, max: i32) {
        self.ranges.insert(axis, (min, max));
    }

    pub fn translate(&self, event: InputEvent) -> Option<Event> {
        match event.destructure() {
            // Key repeats are dropped
            EventSummary::Key(_, key, value) if value == 0 || value == 1 => {
                let code = self.buttons.get(&key)?;
                Some(Event::button(*code, value == 1))
            }
            EventSummary::AbsoluteAxis(_, axis, value) => {
                let code = self.axes.get(&axis)?;
                let (min, max) = self.ranges.get(&axis).copied().unwrap_or((-1, 1));
                let value = if self.centered.contains(&axis) {
                    normalize_centered(value, max)
                } else {
                    normalize(value, min, max)
                };
                Some(Event::axis(*code, value as f32))
            }
            _ => None,
        }
    }
}

/// Normalize by the bound on the side of the value
fn normalize(value: i32, min: i32, max: i32) -> f64 {
    let bound = if value >= 0 { max } else { min };
    if bound == 0 {
        return 0.0;
    }
    value as f64 / (bound as f64).abs()
}

/// Normalize an unsigned axis centered at its midpoint
fn normalize_centered(value: i32, max: i32) -> f64 {
    let range = max as f64 + 1.0;
    (value as f64 - range / 2.0 + 1.0) / range * 2.0
}

/// Producer for an event device matched by [EvdevMatch]
pub struct EvdevSource {
    matcher: EvdevMatch,
    translator: EvdevTranslator,
    aspect_ratio: Option<f64>,
    required: bool,
    grab: bool,
    device: Option<Device>,
    rumble: Option<FFEffect>,
    /// Send the touchpad aspect ratio with the first batch
    started: bool,
}

impl std::fmt::Debug for EvdevSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevSource")
            .field("matcher", &self.matcher)
            .field("opened", &self.device.is_some())
            .finish()
    }
}

impl EvdevSource {
    pub fn new(matcher: EvdevMatch, translator: EvdevTranslator) -> Self {
        Self {
            matcher,
            translator,
            aspect_ratio: None,
            required: true,
            grab: true,
            device: None,
            rumble: None,
            started: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn without_grab(mut self) -> Self {
        self.grab = false;
        self
    }

    /// Mark the device as a touchpad of the given width to height ratio
    pub fn with_aspect_ratio(mut self, ratio: f64) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    fn find(&self) -> Option<(std::path::PathBuf, Device)> {
        evdev::enumerate().find(|(_, device)| self.matcher.matches(device))
    }

    fn rumble(&mut self, ev: &RumbleEvent) -> io::Result<()> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        if device.supported_ff().is_none() {
            return Ok(());
        }

        if ev.is_stop() {
            if let Some(effect) = self.rumble.as_mut() {
                effect.stop()?;
            }
            return Ok(());
        }

        let data = FFEffectData {
            direction: 0,
            trigger: FFTrigger {
                button: 0,
                interval: 0,
            },
            replay: FFReplay {
                length: RUMBLE_LENGTH_MS,
                delay: 0,
            },
            kind: FFEffectKind::Rumble {
                strong_magnitude: (ev.strong.clamp(0.0, 1.0) * u16::MAX as f32) as u16,
                weak_magnitude: (ev.weak.clamp(0.0, 1.0) * u16::MAX as f32) as u16,
            },
        };
        match self.rumble.as_mut() {
            Some(effect) => effect.update(data)?,
            None => self.rumble = Some(device.upload_ff_effect(data)?),
        }
        if let Some(effect) = self.rumble.as_mut() {
            effect.play(1)?;
        }
        Ok(())
    }
}

impl Producer for EvdevSource {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        if let Some(device) = self.device.as_ref() {
            return Ok(vec![device.as_raw_fd()]);
        }

        let Some((path, mut device)) = self.find() else {
            if self.required {
                return Err(DeviceError::NotReady(format!(
                    "event device not found ({:?})",
                    self.matcher
                )));
            }
            log::warn!("Optional event device not found ({:?})", self.matcher);
            return Ok(vec![]);
        };
        log::info!(
            "Opening event device '{}' at {}",
            device.name().unwrap_or_default(),
            path.display()
        );

        if self.grab {
            device.grab()?;
        }
        let fd = device.as_raw_fd();
        nix::fcntl::fcntl(fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).map_err(io::Error::from)?;

        for (axis, info) in device.get_absinfo()? {
            log::trace!("Found axis {axis:?}: {info:?}");
            self.translator
                .set_range(axis, info.minimum(), info.maximum());
        }

        self.device = Some(device);
        self.rumble = None;
        self.started = true;
        Ok(vec![fd])
    }

    fn produce(&mut self, ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        let Some(device) = self.device.as_mut() else {
            return Ok(vec![]);
        };
        if !ready.contains(&device.as_raw_fd()) {
            return Ok(vec![]);
        }

        let mut out = vec![];
        if self.started {
            self.started = false;
            if let Some(ratio) = self.aspect_ratio {
                out.push(Event::config(ConfigCode::TouchpadAspectRatio, ratio));
            }
        }

        loop {
            let events: Vec<InputEvent> = match device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            };
            if events.is_empty() {
                break;
            }
            out.extend(events.into_iter().filter_map(|e| self.translator.translate(e)));
        }
        Ok(out)
    }

    fn close(&mut self, _exit: bool) -> bool {
        if let Some(mut device) = self.device.take() {
            self.rumble = None;
            if self.grab {
                if let Err(e) = device.ungrab() {
                    log::debug!("Failed to release event device: {e}");
                }
            }
        }
        true
    }
}

impl Consumer for EvdevSource {
    fn consume(&mut self, events: &[Event]) -> Result<(), DeviceError> {
        for ev in events {
            if let Event::Rumble(rumble) = ev {
                if let Err(e) = self.rumble(rumble) {
                    log::warn!("Failed to forward rumble: {e}");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use evdev::EventType;

    use super::*;

    fn translator() -> EvdevTranslator {
        let mut t = EvdevTranslator::new(xbox_buttons(), xbox_axes());
        t.set_range(AbsoluteAxisCode::ABS_X, -32768, 32767);
        t.set_range(AbsoluteAxisCode::ABS_Z, 0, 1023);
        t
    }

    #[test]
    fn buttons() {
        let t = translator();
        let ev = InputEvent::new(EventType::KEY.0, KeyCode::BTN_SOUTH.0, 1);
        assert_eq!(t.translate(ev), Some(Event::button(ButtonCode::A, true)));
        let ev = InputEvent::new(EventType::KEY.0, KeyCode::BTN_MODE.0, 0);
        assert_eq!(t.translate(ev), Some(Event::button(ButtonCode::Mode, false)));
        // Repeat
        let ev = InputEvent::new(EventType::KEY.0, KeyCode::BTN_SOUTH.0, 2);
        assert_eq!(t.translate(ev), None);
        let ev = InputEvent::new(EventType::KEY.0, KeyCode::KEY_A.0, 1);
        assert_eq!(t.translate(ev), None);
    }

    #[test]
    fn axes_are_normalized() {
        let t = translator();
        let ev = InputEvent::new(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_X.0, -32768);
        assert_eq!(t.translate(ev), Some(Event::axis(AxisCode::LsX, -1.0)));
        let ev = InputEvent::new(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_X.0, 32767);
        assert_eq!(t.translate(ev), Some(Event::axis(AxisCode::LsX, 1.0)));
        let ev = InputEvent::new(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_Z.0, 1023);
        assert_eq!(t.translate(ev), Some(Event::axis(AxisCode::Rt, 1.0)));
        // Hats without absinfo fall back to -1..1
        let ev = InputEvent::new(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_HAT0Y.0, -1);
        assert_eq!(t.translate(ev), Some(Event::axis(AxisCode::HatY, -1.0)));
    }

    #[test]
    fn centered_axes() {
        let mut t = EvdevTranslator::new(xbox_buttons(), xbox_axes())
            .with_centered([AbsoluteAxisCode::ABS_Y]);
        t.set_range(AbsoluteAxisCode::ABS_Y, 0, 255);
        let ev = InputEvent::new(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_Y.0, 127);
        assert_eq!(t.translate(ev), Some(Event::axis(AxisCode::LsY, 0.0)));
        let ev = InputEvent::new(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_Y.0, 255);
        assert_eq!(t.translate(ev), Some(Event::axis(AxisCode::LsY, 1.0)));
    }
}
