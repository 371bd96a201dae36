//! HID report descriptor model.
//!
//! Descriptors can be parsed from raw bytes or from the human readable
//! listing produced by [ReportDescriptor::dump], and emitted back byte for
//! byte. Parsed reports expose their [HidField]s which can decode and encode
//! values in bit-packed reports.
pub mod collection;
pub mod descriptor;
pub mod field;
pub mod item;
pub mod report;
pub mod unit;
pub mod usage;

#[cfg(test)]
mod descriptor_test;

pub use collection::CollectionType;
pub use descriptor::{DumpFormat, ReportDescriptor};
pub use field::HidField;
pub use item::{Item, ItemTag};
pub use report::{HidReport, ReportType};
pub use unit::{HidUnit, UnitSystem};
pub use usage::{hut, Usage, UsagePage, UsageTables};

use thiserror::Error;

/// Errors that can occur while parsing a report descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected item type 0 in header {header:#04x} at offset {offset}")]
    UnexpectedType { header: u8, offset: usize },
    #[error("unknown item {header:#04x} at offset {offset}")]
    UnknownItem { header: u8, offset: usize },
    #[error("item at offset {offset} needs {needed} bytes but only {available} remain")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("pop without matching push at offset {offset}")]
    StackUnderflow { offset: usize },
    #[error("invalid line '{line}': {reason}")]
    Syntax { line: String, reason: String },
}

/// Errors that can occur while encoding a value into a report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("value {value} for {usage} is outside of the logical range [{min}, {max}]")]
    OutOfRange {
        usage: String,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("value {value} does not fit into a {bits} bit null field")]
    NullOverflow { value: i64, bits: u32 },
    #[error("report buffer has {actual} bytes, field needs {needed}")]
    BufferTooShort { needed: usize, actual: usize },
    #[error("{given} values given for a field with count {count}")]
    TooManyValues { given: usize, count: u32 },
}

/// Any error returned by the descriptor model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("unknown usage '{name}' in usage page {page:#06x}")]
    UnknownUsage { name: String, page: u16 },
    #[error("invalid trailing zero count in '{0}'")]
    TrailingZeros(String),
}

/// Interpret the lower `bits` bits of `value` as a two's complement number.
pub fn twos_comp(value: u32, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return value as i64;
    }
    let value = value as i64 & ((1i64 << bits) - 1);
    if value & (1 << (bits - 1)) != 0 {
        value - (1 << bits)
    } else {
        value
    }
}

/// Encode `value` as a two's complement number of `bits` bits.
pub fn to_twos_comp(value: i64, bits: u32) -> u32 {
    if bits == 0 {
        return 0;
    }
    if bits >= 32 {
        return value as u32;
    }
    (value & ((1i64 << bits) - 1)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twos_comp_sign_extends() {
        assert_eq!(twos_comp(0xFF, 8), -1);
        assert_eq!(twos_comp(0x81, 8), -127);
        assert_eq!(twos_comp(0x7F, 8), 127);
        assert_eq!(twos_comp(0x8000, 16), -32768);
        assert_eq!(twos_comp(0xFFFF_FFFF, 32), -1);
        assert_eq!(twos_comp(0x1, 1), -1);
    }

    #[test]
    fn to_twos_comp_is_inverse() {
        for bits in [2u32, 4, 8, 12, 16] {
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            for v in [min, -1, 0, 1, max] {
                assert_eq!(twos_comp(to_twos_comp(v, bits), bits), v);
            }
        }
    }
}
