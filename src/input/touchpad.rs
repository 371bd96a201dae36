//! Mapping of a physical touchpad onto the touchpad of an emulated
//! controller with a different aspect ratio.
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TouchpadCorrectionType {
    #[default]
    Stretch,
    CropCenter,
    CropStart,
    CropEnd,
    ContainStart,
    ContainEnd,
    ContainCenter,
    /// Use the left half of the emulated touchpad
    Left,
    /// Use the right half of the emulated touchpad
    Right,
    Center,
    Disabled,
}

/// Transform from normalized touch coordinates to emulated coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchpadCorrection {
    pub x_mult: f64,
    pub x_ofs: f64,
    pub x_clamp: (f64, f64),
    pub y_mult: f64,
    pub y_ofs: f64,
    pub y_clamp: (f64, f64),
}

impl Default for TouchpadCorrection {
    fn default() -> Self {
        Self {
            x_mult: 1.0,
            x_ofs: 0.0,
            x_clamp: (0.0, 1.0),
            y_mult: 1.0,
            y_ofs: 0.0,
            y_clamp: (0.0, 1.0),
        }
    }
}

impl TouchpadCorrection {
    fn scaled(x_mult: f64, x_ofs: f64, y_mult: f64, y_ofs: f64) -> Self {
        Self {
            x_mult,
            x_ofs,
            y_mult,
            y_ofs,
            ..Default::default()
        }
    }

    fn clamped(width: f64, height: f64, x_clamp: (f64, f64), y_clamp: (f64, f64)) -> Self {
        Self {
            x_mult: width,
            y_mult: height,
            x_clamp,
            y_clamp,
            ..Default::default()
        }
    }

    pub fn x(&self, value: f64) -> i64 {
        (value.clamp(self.x_clamp.0, self.x_clamp.1) * self.x_mult + self.x_ofs) as i64
    }

    pub fn y(&self, value: f64) -> i64 {
        (value.clamp(self.y_clamp.0, self.y_clamp.1) * self.y_mult + self.y_ofs) as i64
    }
}

/// Compute the transform for a `width` x `height` emulated touchpad fed by a
/// physical touchpad with the given aspect ratio (width / height).
pub fn correct_touchpad(
    width: u32,
    height: u32,
    aspect: f64,
    method: TouchpadCorrectionType,
) -> TouchpadCorrection {
    use TouchpadCorrectionType as T;

    let (w, h) = (width as f64, height as f64);
    let ratio = (w / h) / aspect;

    match method {
        T::Left | T::Right => {
            let x_ofs = |full: f64| if method == T::Right { full } else { 0.0 };
            if ratio > 2.0 {
                let new_width = w / ratio;
                TouchpadCorrection::scaled(new_width, x_ofs(w - new_width), h, 0.0)
            } else {
                let new_height = h * ratio / 2.0;
                TouchpadCorrection::scaled(w / 2.0, x_ofs(w / 2.0), new_height, h - new_height)
            }
        }
        T::Center | T::CropCenter => {
            if ratio > 1.0 {
                let new_width = w / ratio;
                TouchpadCorrection::scaled(new_width, (w - new_width) / 2.0, h, 0.0)
            } else {
                let new_height = h * ratio;
                TouchpadCorrection::scaled(w, 0.0, new_height, (h - new_height) / 2.0)
            }
        }
        T::CropStart => {
            if ratio > 1.0 {
                TouchpadCorrection::scaled(w / ratio, 0.0, h, 0.0)
            } else {
                TouchpadCorrection::scaled(w, 0.0, h * ratio, 0.0)
            }
        }
        T::CropEnd => {
            if ratio > 1.0 {
                let new_width = w / ratio;
                TouchpadCorrection::scaled(new_width, w - new_width, h, 0.0)
            } else {
                let new_height = h * ratio;
                TouchpadCorrection::scaled(w, 0.0, new_height, h - new_height)
            }
        }
        T::ContainCenter => {
            if ratio > 1.0 {
                let bound = (ratio - 1.0) / ratio / 2.0;
                TouchpadCorrection::clamped(w, h, (0.0, 1.0), (bound, 1.0 - bound))
            } else {
                let bound = (1.0 - ratio) / 2.0;
                TouchpadCorrection::clamped(w, h, (bound, 1.0 - bound), (0.0, 1.0))
            }
        }
        T::ContainStart => {
            if ratio > 1.0 {
                let bound = (ratio - 1.0) / ratio;
                TouchpadCorrection::clamped(w, h, (0.0, 1.0), (0.0, 1.0 - bound))
            } else {
                let bound = (1.0 - ratio) / 2.0;
                TouchpadCorrection::clamped(w, h, (0.0, 1.0 - bound), (0.0, 1.0))
            }
        }
        T::ContainEnd => {
            if ratio > 1.0 {
                let bound = (ratio - 1.0) / ratio;
                TouchpadCorrection::clamped(w, h, (0.0, 1.0), (bound, 1.0))
            } else {
                let bound = (1.0 - ratio) / 2.0;
                TouchpadCorrection::clamped(w, h, (bound, 1.0), (0.0, 1.0))
            }
        }
        T::Stretch | T::Disabled => TouchpadCorrection::scaled(w, 0.0, h, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_uses_full_area() {
        let c = correct_touchpad(1920, 1080, 1.0, TouchpadCorrectionType::Stretch);
        assert_eq!(c.x(1.0), 1920);
        assert_eq!(c.y(0.5), 540);
        assert_eq!(c.x(2.0), 1920);
    }

    #[test]
    fn crop_center_square_pad() {
        // A square pad on a 16:9 target keeps the aspect ratio
        let c = correct_touchpad(1920, 1080, 1.0, TouchpadCorrectionType::CropCenter);
        assert_eq!(c.x(0.0), 420);
        assert_eq!(c.x(1.0), 1500);
        assert_eq!(c.y(1.0), 1080);
    }

    #[test]
    fn right_half() {
        let c = correct_touchpad(1920, 1080, 16.0 / 9.0, TouchpadCorrectionType::Right);
        assert_eq!(c.x(0.0), 960);
        assert_eq!(c.x(1.0), 1920);
        assert_eq!(c.y(1.0), 1080);
        assert_eq!(c.y(0.0), 540);
    }
}
