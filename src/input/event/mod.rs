//! The event algebra shared by every producer, consumer and the multiplexer.
pub mod codes;
pub mod control;

pub use codes::{AxisCode, ButtonCode, ConfigCode, SpecialKind, UnknownCode};
pub use control::ControlEvent;

use serde::{Deserialize, Serialize};

/// Value of a [Event::Configuration]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Bool(v) => v as u8 as f64,
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            Scalar::Bool(v) => v,
            Scalar::Int(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

/// Which half of a controller a feedback event targets. Main addresses the
/// whole controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Main,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RumbleEvent {
    pub side: Side,
    /// Low frequency motor, in [0, 1]
    pub strong: f32,
    /// High frequency motor, in [0, 1]
    pub weak: f32,
}

impl RumbleEvent {
    pub fn new(strong: f32, weak: f32) -> Self {
        Self {
            side: Side::Main,
            strong,
            weak,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.strong == 0.0 && self.weak == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedMode {
    #[default]
    Disabled,
    Solid,
    Blinking,
    Rainbow,
    Spiral,
    Pulse,
    Oxp,
    Duality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedDirection {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedEvent {
    pub side: Side,
    pub mode: LedMode,
    /// In [0, 1]
    pub brightness: f32,
    /// In [0, 1]
    pub speed: f32,
    pub color: (u8, u8, u8),
    pub color2: (u8, u8, u8),
    /// Set by devices that need to reset their leds before applying
    pub initialize: bool,
    pub direction: LedDirection,
}

impl Default for LedEvent {
    fn default() -> Self {
        Self {
            side: Side::Main,
            mode: LedMode::Disabled,
            brightness: 1.0,
            speed: 0.0,
            color: (0, 0, 0),
            color2: (0, 0, 0),
            initialize: false,
            direction: LedDirection::Left,
        }
    }
}

impl LedEvent {
    pub fn solid(color: (u8, u8, u8)) -> Self {
        Self {
            mode: LedMode::Solid,
            color,
            ..Default::default()
        }
    }
}

/// A single event flowing through a device loop
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Button { code: ButtonCode, value: bool },
    Axis { code: AxisCode, value: f32 },
    Configuration { code: ConfigCode, value: Scalar },
    Rumble(RumbleEvent),
    Led(LedEvent),
    Special(SpecialKind),
    /// An event consumed by the multiplexer. Consumers ignore it.
    Suppressed,
}

impl Event {
    pub fn button(code: ButtonCode, value: bool) -> Self {
        Event::Button { code, value }
    }

    pub fn axis(code: AxisCode, value: f32) -> Self {
        Event::Axis { code, value }
    }

    pub fn config(code: ConfigCode, value: impl Into<Scalar>) -> Self {
        Event::Configuration {
            code,
            value: value.into(),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Event::Suppressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_conversions() {
        assert_eq!(Scalar::from(true).as_f64(), 1.0);
        assert!(Scalar::Int(3).as_bool());
        assert!(!Scalar::Float(0.0).as_bool());
        assert_eq!(Scalar::Int(85).as_f64(), 85.0);
    }

    #[test]
    fn event_builders() {
        assert_eq!(
            Event::button(ButtonCode::A, true),
            Event::Button {
                code: ButtonCode::A,
                value: true
            }
        );
        assert_eq!(
            Event::config(ConfigCode::Battery, 50i64),
            Event::Configuration {
                code: ConfigCode::Battery,
                value: Scalar::Int(50)
            }
        );
        assert!(Event::Suppressed.is_suppressed());
        assert!(RumbleEvent::default().is_stop());
    }
}
