//! Fixups and feedback of the Legion Go controllers.
use crate::input::event::{AxisCode, Event, LedEvent, LedMode};

use super::hid_report::{
    rgb_enable, rgb_load_profile, rgb_set_profile, Controller, RgbMode, GYRO_SCALE, RGB_PROFILE,
};

/// Nanoseconds per tick of the controller IMU counters
pub const IMU_TICK_NS: f64 = 8_000_000.0;

/// Converts the 8 bit IMU counters of both controllers into monotonic
/// nanosecond timestamps and drops corrupt gyro samples.
#[derive(Debug, Default)]
pub struct ImuPatch {
    left: Counter,
    right: Counter,
}

#[derive(Debug, Default)]
struct Counter {
    last: u32,
    total: f64,
}

impl Counter {
    fn advance(&mut self, value: f32) -> f32 {
        let curr = value as u32;
        let diff = if curr < self.last {
            curr + 256 - self.last
        } else {
            curr - self.last
        };
        self.last = curr;
        self.total += diff as f64 * IMU_TICK_NS;
        self.total as f32
    }
}

/// The controllers randomly send a raw gyro value of 254 or 255
pub fn is_corrupt_gyro(value: f32) -> bool {
    let raw = (value as f64 / GYRO_SCALE).abs().round();
    raw == 254.0 || raw == 255.0
}

impl ImuPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, events: &mut [Event]) {
        for ev in events.iter_mut() {
            let Event::Axis { code, value } = ev else {
                continue;
            };
            match code {
                AxisCode::LeftImuTs => *value = self.left.advance(*value),
                AxisCode::RightImuTs => *value = self.right.advance(*value),
                AxisCode::LeftGyroX
                | AxisCode::LeftGyroY
                | AxisCode::LeftGyroZ
                | AxisCode::RightGyroX
                | AxisCode::RightGyroY
                | AxisCode::RightGyroZ
                    if is_corrupt_gyro(*value) =>
                {
                    log::trace!("Dropping corrupt gyro sample {code}: {value}");
                    *ev = Event::Suppressed;
                }
                _ => (),
            }
        }
    }
}

/// Translates led events into vendor commands, remembering the last mode so
/// repeated updates stay cheap.
#[derive(Debug, Default)]
pub struct RgbCallback {
    prev_mode: Option<RgbMode>,
}

impl RgbCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&mut self, ev: &LedEvent) -> Vec<Vec<u8>> {
        let mode = match ev.mode {
            LedMode::Blinking | LedMode::Pulse => Some(RgbMode::Pulse),
            LedMode::Rainbow => Some(RgbMode::Dynamic),
            LedMode::Spiral => Some(RgbMode::Spiral),
            LedMode::Solid if ev.color != (0, 0, 0) => Some(RgbMode::Solid),
            _ => None,
        };

        let Some(mode) = mode else {
            self.prev_mode = None;
            return vec![
                rgb_enable(Controller::Left, false).to_vec(),
                rgb_enable(Controller::Right, false).to_vec(),
            ];
        };

        if self.prev_mode != Some(mode) {
            log::debug!("Switching controller lighting to {mode:?}");
        }
        self.prev_mode = Some(mode);

        let mut cmds = vec![];
        for controller in [Controller::Left, Controller::Right] {
            cmds.push(
                rgb_set_profile(
                    controller,
                    RGB_PROFILE,
                    mode,
                    ev.color,
                    ev.brightness,
                    ev.speed,
                )
                .to_vec(),
            );
        }
        for controller in [Controller::Left, Controller::Right] {
            cmds.push(rgb_load_profile(controller, RGB_PROFILE).to_vec());
        }
        for controller in [Controller::Left, Controller::Right] {
            cmds.push(rgb_enable(controller, true).to_vec());
        }
        cmds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imu_timestamps_wrap() {
        let mut patch = ImuPatch::new();
        let mut events = vec![
            Event::axis(AxisCode::LeftImuTs, 250.0),
            Event::axis(AxisCode::RightImuTs, 3.0),
        ];
        patch.apply(&mut events);
        assert_eq!(events[0], Event::axis(AxisCode::LeftImuTs, 2_000_000_000.0));
        assert_eq!(events[1], Event::axis(AxisCode::RightImuTs, 24_000_000.0));

        let mut events = vec![Event::axis(AxisCode::LeftImuTs, 4.0)];
        patch.apply(&mut events);
        // 250 -> 4 is 10 ticks
        assert_eq!(events[0], Event::axis(AxisCode::LeftImuTs, 2_080_000_000.0));
    }

    #[test]
    fn drops_corrupt_gyro() {
        let mut patch = ImuPatch::new();
        let mut events = vec![
            Event::axis(AxisCode::LeftGyroX, (-254.0 * GYRO_SCALE) as f32),
            Event::axis(AxisCode::RightGyroZ, (255.0 * GYRO_SCALE) as f32),
            Event::axis(AxisCode::RightGyroY, (253.0 * GYRO_SCALE) as f32),
            Event::axis(AxisCode::LsX, 0.5),
        ];
        patch.apply(&mut events);
        assert_eq!(events[0], Event::Suppressed);
        assert_eq!(events[1], Event::Suppressed);
        assert!(!events[2].is_suppressed());
        assert!(!events[3].is_suppressed());
    }

    #[test]
    fn rgb_commands() {
        let mut rgb = RgbCallback::new();
        let cmds = rgb.commands(&LedEvent::solid((255, 0, 0)));
        assert_eq!(cmds.len(), 6);
        assert_eq!(cmds[0][5], RgbMode::Solid as u8);
        assert_eq!(cmds[1][4], Controller::Right as u8);

        let cmds = rgb.commands(&LedEvent::solid((0, 0, 0)));
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0][5], 0);
    }
}
