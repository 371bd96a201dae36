//! Bit level maps used to read and write fixed layout reports.
//!
//! Locations are bit offsets into the report. Buttons use MSB-0 numbering
//! inside each byte, so bit 0 is the most significant bit of byte 0.
use crate::hid::RangeError;

use super::event::{AxisCode, ButtonCode, ConfigCode, Scalar};

/// Integer encoding of an axis. `M` types are unsigned with the midpoint as
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumType {
    U8,
    I8,
    M8,
    U16,
    I16,
    M16,
    U32,
    I32,
    M32,
}

impl NumType {
    pub fn bytes(&self) -> usize {
        match self {
            NumType::U8 | NumType::I8 | NumType::M8 => 1,
            NumType::U16 | NumType::I16 | NumType::M16 => 2,
            NumType::U32 | NumType::I32 | NumType::M32 => 4,
        }
    }

    fn bits(&self) -> u32 {
        8 * self.bytes() as u32
    }

    fn is_signed(&self) -> bool {
        matches!(self, NumType::I8 | NumType::I16 | NumType::I32)
    }

    fn is_mid(&self) -> bool {
        matches!(self, NumType::M8 | NumType::M16 | NumType::M32)
    }

    /// Integer range of the encoded value
    fn range(&self) -> (i64, i64) {
        let bits = self.bits();
        if self.is_signed() {
            (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
        } else {
            (0, (1i64 << bits) - 1)
        }
    }

    /// Divisor used to normalize decoded values
    fn scale(&self) -> f64 {
        let bits = self.bits();
        match self {
            // Sony style 8 bit sticks are centered at 0x80
            NumType::M8 => 128.0,
            t if t.is_signed() || t.is_mid() => ((1i64 << (bits - 1)) - 1) as f64,
            _ => ((1i64 << bits) - 1) as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// Location and encoding of an axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMap {
    pub loc: usize,
    pub ty: NumType,
    pub order: ByteOrder,
    pub scale: Option<f64>,
    pub offset: f64,
    pub flipped: bool,
    pub bounds: Option<(i64, i64)>,
}

impl AxisMap {
    pub const fn new(loc: usize, ty: NumType) -> Self {
        Self {
            loc,
            ty,
            order: ByteOrder::Little,
            scale: None,
            offset: 0.0,
            flipped: false,
            bounds: None,
        }
    }

    pub const fn big_endian(mut self) -> Self {
        self.order = ByteOrder::Big;
        self
    }

    pub const fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub const fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub const fn with_bounds(mut self, min: i64, max: i64) -> Self {
        self.bounds = Some((min, max));
        self
    }

    pub const fn flipped(mut self) -> Self {
        self.flipped = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMap {
    pub loc: usize,
    pub flipped: bool,
}

impl ButtonMap {
    pub const fn new(loc: usize) -> Self {
        Self {
            loc,
            flipped: false,
        }
    }

    pub const fn flipped(mut self) -> Self {
        self.flipped = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigType {
    Bit,
    Num(NumType),
}

/// Location of a status value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigMap {
    pub loc: usize,
    pub ty: ConfigType,
    pub order: ByteOrder,
    pub scale: Option<f64>,
    pub offset: f64,
    pub bounds: Option<(f64, f64)>,
    pub flipped: bool,
}

impl ConfigMap {
    pub const fn bit(loc: usize) -> Self {
        Self {
            loc,
            ty: ConfigType::Bit,
            order: ByteOrder::Little,
            scale: None,
            offset: 0.0,
            bounds: None,
            flipped: false,
        }
    }

    pub const fn num(loc: usize, ty: NumType) -> Self {
        Self {
            ty: ConfigType::Num(ty),
            ..Self::bit(loc)
        }
    }

    pub const fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub const fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.bounds = Some((min, max));
        self
    }

    pub const fn flipped(mut self) -> Self {
        self.flipped = true;
        self
    }
}

/// The maps of one input report. `report_id` is `None` for devices with
/// unnumbered reports.
#[derive(Debug, Clone, Copy)]
pub struct ReportMap {
    pub report_id: Option<u8>,
    pub buttons: &'static [(ButtonCode, ButtonMap)],
    pub axes: &'static [(AxisCode, AxisMap)],
    pub configs: &'static [(ConfigCode, ConfigMap)],
}

impl ReportMap {
    /// Whether a report read from the device is described by this map
    pub fn matches(&self, report: &[u8]) -> bool {
        match self.report_id {
            Some(id) => report.first() == Some(&id),
            None => !report.is_empty(),
        }
    }
}

fn read_raw(buf: &[u8], loc: usize, ty: NumType, order: ByteOrder) -> i64 {
    let start = loc >> 3;
    let len = ty.bytes();
    let mut raw: u64 = 0;
    for i in 0..len {
        let byte = buf.get(start + i).copied().unwrap_or_default() as u64;
        match order {
            ByteOrder::Little => raw |= byte << (8 * i),
            ByteOrder::Big => raw = raw << 8 | byte,
        }
    }

    let bits = ty.bits();
    if ty.is_signed() && raw & (1 << (bits - 1)) != 0 {
        raw as i64 - (1i64 << bits)
    } else if ty.is_mid() {
        raw as i64 - (1i64 << (bits - 1))
    } else {
        raw as i64
    }
}

/// Decode an axis into its normalized or scaled value
pub fn decode_axis(buf: &[u8], map: &AxisMap) -> f64 {
    let raw = read_raw(buf, map.loc, map.ty, map.order) as f64;
    let value = match map.scale {
        Some(scale) => scale * raw + map.offset,
        None => raw / map.ty.scale() + map.offset,
    };
    if map.flipped {
        -value
    } else {
        value
    }
}

/// Encode an axis value. Scaled maps write `scale * value + offset` clamped
/// to their bounds; unscaled maps use the full range of their type.
pub fn encode_axis(buf: &mut [u8], map: &AxisMap, value: f64) -> Result<(), RangeError> {
    let value = if map.flipped { -value } else { value };
    let bits = map.ty.bits();
    let half = ((1i64 << (bits - 1)) - 1) as f64;

    let encoded = match map.scale {
        Some(scale) => {
            let v = (scale * value + map.offset) as i64;
            match map.bounds {
                Some((min, max)) => v.clamp(min, max),
                None => v,
            }
        }
        None if map.ty.is_mid() => (half * value + half).round() as i64,
        None if map.ty.is_signed() => (half * value) as i64,
        None => (((1i64 << bits) - 1) as f64 * value) as i64,
    };

    let (min, max) = map.ty.range();
    if encoded < min || encoded > max {
        return Err(RangeError::OutOfRange {
            usage: format!("axis at bit {}", map.loc),
            value: encoded,
            min,
            max,
        });
    }

    let start = map.loc >> 3;
    let len = map.ty.bytes();
    if buf.len() < start + len {
        return Err(RangeError::BufferTooShort {
            needed: start + len,
            actual: buf.len(),
        });
    }

    let raw = encoded as u64;
    for i in 0..len {
        let shift = match map.order {
            ByteOrder::Little => 8 * i,
            ByteOrder::Big => 8 * (len - 1 - i),
        };
        buf[start + i] = (raw >> shift) as u8;
    }
    Ok(())
}

pub fn get_button(buf: &[u8], map: &ButtonMap) -> bool {
    let byte = buf.get(map.loc / 8).copied().unwrap_or_default();
    let value = byte & (1 << (7 - map.loc % 8)) != 0;
    value != map.flipped
}

pub fn set_button(buf: &mut [u8], map: &ButtonMap, value: bool) {
    let Some(byte) = buf.get_mut(map.loc / 8) else {
        return;
    };
    let mask = 1 << (7 - map.loc % 8);
    if value != map.flipped {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

pub fn decode_config(buf: &[u8], map: &ConfigMap) -> Scalar {
    let ty = match map.ty {
        ConfigType::Bit => {
            let button = ButtonMap {
                loc: map.loc,
                flipped: map.flipped,
            };
            return Scalar::Bool(get_button(buf, &button));
        }
        ConfigType::Num(ty) => ty,
    };

    let axis = AxisMap {
        loc: map.loc,
        ty,
        order: map.order,
        scale: map.scale,
        offset: map.offset,
        flipped: false,
        bounds: None,
    };
    let value = decode_axis(buf, &axis);
    match map.bounds {
        Some((min, max)) => Scalar::Float(value.clamp(min, max)),
        None => Scalar::Float(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_encodings() {
        let mut buf = [0u8; 4];
        encode_axis(&mut buf, &AxisMap::new(0, NumType::I16), 1.0).unwrap();
        assert_eq!(&buf[..2], &[0xFF, 0x7F]);
        encode_axis(&mut buf, &AxisMap::new(16, NumType::M8), 0.0).unwrap();
        assert_eq!(buf[2], 0x7F);
        encode_axis(&mut buf, &AxisMap::new(24, NumType::U8), 1.0).unwrap();
        assert_eq!(buf[3], 0xFF);

        let mut buf = [0u8; 2];
        encode_axis(&mut buf, &AxisMap::new(0, NumType::I16).big_endian(), -1.0).unwrap();
        assert_eq!(buf, [0x80, 0x01]);
    }

    #[test]
    fn scaled_encoding_is_clamped() {
        let map = AxisMap::new(0, NumType::I16)
            .with_scale(1019.0)
            .with_bounds(-(1 << 15) + 2, (1 << 15) - 1);
        let mut buf = [0u8; 2];
        encode_axis(&mut buf, &map, 100.0).unwrap();
        assert_eq!(i16::from_le_bytes(buf), i16::MAX);
        encode_axis(&mut buf, &map, 9.81).unwrap();
        assert_eq!(i16::from_le_bytes(buf), 9996);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut buf = [0u8; 1];
        let map = AxisMap::new(0, NumType::U8).with_scale(255.0);
        assert!(matches!(
            encode_axis(&mut buf, &map, 2.0),
            Err(RangeError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode_axis(&mut [], &AxisMap::new(0, NumType::U8), 0.5),
            Err(RangeError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn decodes_axes() {
        assert_eq!(decode_axis(&[0x80], &AxisMap::new(0, NumType::M8)), 0.0);
        assert_eq!(decode_axis(&[0x00], &AxisMap::new(0, NumType::M8)), -1.0);
        assert_eq!(decode_axis(&[0xFF], &AxisMap::new(0, NumType::U8)), 1.0);
        let value = decode_axis(&[0x01, 0x80], &AxisMap::new(0, NumType::I16).flipped());
        assert!((value - 1.0).abs() < 1e-4);
        assert_eq!(
            decode_axis(&[0x00, 0x10], &AxisMap::new(0, NumType::U16).big_endian().with_scale(1.0)),
            4096.0
        );
    }

    #[test]
    fn buttons_are_msb_first() {
        let mut buf = [0u8; 2];
        set_button(&mut buf, &ButtonMap::new(0), true);
        set_button(&mut buf, &ButtonMap::new(15), true);
        assert_eq!(buf, [0x80, 0x01]);
        assert!(get_button(&buf, &ButtonMap::new(15)));
        assert!(!get_button(&buf, &ButtonMap::new(15).flipped()));
        set_button(&mut buf, &ButtonMap::new(0), false);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn report_map_matches_id() {
        let map = ReportMap {
            report_id: Some(0x74),
            buttons: &[],
            axes: &[],
            configs: &[],
        };
        assert!(map.matches(&[0x74, 0x00]));
        assert!(!map.matches(&[0x04, 0x00]));
        assert!(!map.matches(&[]));
    }

    #[test]
    fn decodes_config() {
        assert_eq!(decode_config(&[0x40], &ConfigMap::bit(1)), Scalar::Bool(true));
        let map = ConfigMap::num(0, NumType::U8).with_scale(1.0).with_bounds(0.0, 100.0);
        assert_eq!(decode_config(&[200], &map), Scalar::Float(100.0));
    }
}
