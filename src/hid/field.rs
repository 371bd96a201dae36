use super::{
    to_twos_comp, twos_comp,
    unit::HidUnit,
    usage::{hut, CONTACT_COUNT, CONTACT_ID, CONTACT_MAX},
    RangeError,
};

/// Parser state passed to [HidField::from_parser_state] when a main item
/// is reached.
#[derive(Debug, Clone, Default)]
pub struct FieldState {
    pub report_id: u8,
    pub logical: Option<u32>,
    pub physical: Option<u32>,
    pub application: Option<u32>,
    /// Number of (application, physical, logical) collections seen so far
    pub collection: (u32, u32, u32),
    /// Main item flags
    pub flags: u32,
    pub usage_page: u16,
    pub usages: Vec<u32>,
    pub usage_min: u32,
    pub usage_max: u32,
    pub logical_min: i64,
    pub logical_max: i64,
    pub physical_min: i64,
    pub physical_max: i64,
    pub unit: u32,
    pub unit_exp: i64,
    pub size: u32,
    pub count: u32,
}

/// One contiguous slice of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidField {
    pub report_id: u8,
    pub logical: Option<u32>,
    pub physical: Option<u32>,
    pub application: Option<u32>,
    pub collection: (u32, u32, u32),
    pub flags: u32,
    pub usage_page: u16,
    /// Usage of a variable field, or the logical name of an array
    pub usage: u32,
    /// Usages an array field may report
    pub usages: Vec<u32>,
    pub logical_min: i64,
    pub logical_max: i64,
    pub physical_min: i64,
    pub physical_max: i64,
    pub unit: u32,
    pub unit_exp: i64,
    /// Size in bits of one element
    pub size: u32,
    /// Number of elements; always 1 for variable fields
    pub count: u32,
    /// Bit offset within the report, including the report id byte
    pub start: u32,
}

impl HidField {
    /// Create the fields described by a main item. Variable items produce one
    /// field per element, arrays and padding produce a single field.
    pub fn from_parser_state(state: &FieldState) -> Vec<HidField> {
        let mut usage = state.usages.first().copied().unwrap_or(state.usage_min);

        // Arrays are named after their logical or application collection
        if state.flags & 0x3 == 0 {
            if let Some(logical) = state.logical.filter(|l| *l != 0) {
                usage = logical;
            } else if let Some(application) = state.application {
                usage = application;
            }
        }

        let template = HidField {
            report_id: state.report_id,
            logical: state.logical,
            physical: state.physical,
            application: state.application,
            collection: state.collection,
            flags: state.flags,
            usage_page: state.usage_page,
            usage,
            usages: vec![],
            logical_min: state.logical_min,
            logical_max: state.logical_max,
            physical_min: state.physical_min,
            physical_max: state.physical_max,
            unit: state.unit,
            unit_exp: state.unit_exp,
            size: state.size,
            count: 1,
            start: 0,
        };

        if state.flags & 0x3 == 0 {
            let mut field = template;
            field.usages = if state.usage_min != 0 && state.usage_max != 0 {
                (state.usage_min..=state.usage_max).collect()
            } else {
                state.usages.clone()
            };
            field.count = state.count;
            return vec![field];
        }

        if state.usage_min != 0 && state.usage_max != 0 {
            let mut usage = state.usage_min;
            let mut fields = Vec::with_capacity(state.count as usize);
            for _ in 0..state.count {
                let mut field = template.clone();
                field.usage = usage;
                fields.push(field);
                if usage < state.usage_max {
                    usage += 1;
                }
            }
            return fields;
        }

        if let Some(last) = state.usages.last() {
            return (0..state.count as usize)
                .map(|i| {
                    let mut field = template.clone();
                    field.usage = state.usages.get(i).copied().unwrap_or(*last);
                    field
                })
                .collect();
        }

        // Padding without usages
        let mut field = template;
        field.size = field.size.saturating_mul(state.count);
        vec![field]
    }

    pub fn is_const(&self) -> bool {
        self.flags & 0x1 != 0
    }

    pub fn is_array(&self) -> bool {
        self.flags & 0x2 == 0
    }

    pub fn is_var(&self) -> bool {
        !self.is_array()
    }

    pub fn is_relative(&self) -> bool {
        self.flags & 0x4 != 0
    }

    pub fn is_wrap(&self) -> bool {
        self.flags & 0x8 != 0
    }

    pub fn is_null(&self) -> bool {
        self.flags & 0x40 != 0
    }

    /// Padding fields are constant and carry no usage
    pub fn is_padding(&self) -> bool {
        self.is_const() && self.usage == 0 && self.usages.is_empty()
    }

    /// Single bit fields are always unsigned
    pub fn is_signed(&self) -> bool {
        self.logical_min < 0 && self.size > 1
    }

    /// Total width in bits
    pub fn bitsize(&self) -> u32 {
        self.size.saturating_mul(self.count)
    }

    pub fn unit(&self) -> HidUnit {
        HidUnit::from_value(self.unit)
    }

    pub fn usage_name(&self) -> String {
        hut().usage_name((self.usage >> 16) as u16, self.usage & 0xFFFF)
    }

    fn skips_range_check(&self) -> bool {
        matches!(self.usage, CONTACT_ID | CONTACT_COUNT | CONTACT_MAX)
    }

    fn read_bits(&self, data: &[u8], idx: u32) -> u64 {
        let size = self.size.min(64);
        let start = self.start as u64 + idx as u64 * self.size as u64;
        let mut value = 0u64;
        for bit in 0..size as u64 {
            let pos = start + bit;
            let byte = data.get((pos / 8) as usize).copied().unwrap_or_default();
            if byte >> (pos % 8) & 1 != 0 {
                value |= 1 << bit;
            }
        }
        value
    }

    fn write_bits(&self, data: &mut [u8], idx: u32, value: u64) {
        let size = self.size.min(64);
        let start = self.start as u64 + idx as u64 * self.size as u64;
        for bit in 0..size as u64 {
            let pos = start + bit;
            let mask = 1u8 << (pos % 8);
            let byte = &mut data[(pos / 8) as usize];
            if value >> bit & 1 != 0 {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }

    /// Number of bytes a report buffer needs to hold this field
    pub fn bytes_needed(&self) -> usize {
        (self.start as usize + self.bitsize() as usize).div_ceil(8)
    }

    /// Decode all elements of this field from the given report. The report
    /// must include the report id byte for numbered reports. Missing bytes
    /// read as zero.
    pub fn decode(&self, data: &[u8]) -> Vec<i64> {
        let count = if self.is_padding() { 1 } else { self.count };
        (0..count)
            .map(|idx| {
                let raw = self.read_bits(data, idx);
                if self.is_signed() && self.size <= 32 {
                    twos_comp(raw as u32, self.size)
                } else {
                    raw as i64
                }
            })
            .collect()
    }

    /// Encode the given values into the report buffer
    pub fn encode(&self, data: &mut [u8], values: &[i64]) -> Result<(), RangeError> {
        if values.len() > self.count as usize {
            return Err(RangeError::TooManyValues {
                given: values.len(),
                count: self.count,
            });
        }
        let needed = self.bytes_needed();
        if data.len() < needed {
            return Err(RangeError::BufferTooShort {
                needed,
                actual: data.len(),
            });
        }

        for (idx, value) in values.iter().enumerate() {
            let value = *value;
            if self.is_null() {
                if self.size < 64 && (value < 0 || value >= 1i64 << self.size) {
                    return Err(RangeError::NullOverflow {
                        value,
                        bits: self.size,
                    });
                }
            } else if value != 0
                && !self.skips_range_check()
                && (value < self.logical_min || value > self.logical_max)
            {
                return Err(RangeError::OutOfRange {
                    usage: self.usage_name(),
                    value,
                    min: self.logical_min,
                    max: self.logical_max,
                });
            }

            let raw = if value < 0 {
                to_twos_comp(value, self.size) as u64
            } else {
                value as u64
            };
            self.write_bits(data, idx as u32, raw);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn field(logical_min: i64, logical_max: i64, size: u32, start: u32) -> HidField {
        let state = FieldState {
            flags: 0x02,
            usage_page: 0x01,
            usages: vec![0x0001_0030],
            logical_min,
            logical_max,
            size,
            count: 1,
            ..Default::default()
        };
        let mut field = HidField::from_parser_state(&state).remove(0);
        field.start = start;
        field
    }

    #[test]
    fn variable_fields_expand_usage_range() {
        let state = FieldState {
            flags: 0x02,
            usage_page: 0x09,
            usage_min: 0x0009_0001,
            usage_max: 0x0009_0003,
            logical_max: 1,
            size: 1,
            count: 4,
            ..Default::default()
        };
        let fields = HidField::from_parser_state(&state);
        let usages: Vec<u32> = fields.iter().map(|f| f.usage).collect();
        assert_eq!(usages, vec![0x0009_0001, 0x0009_0002, 0x0009_0003, 0x0009_0003]);
    }

    #[test]
    fn padding_is_one_field() {
        let state = FieldState {
            flags: 0x03,
            size: 4,
            count: 3,
            ..Default::default()
        };
        let fields = HidField::from_parser_state(&state);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].size, 12);
        assert!(fields[0].is_padding());
    }

    #[test]
    fn arrays_use_application_name() {
        let state = FieldState {
            flags: 0x00,
            application: Some(0x0001_0006),
            usage_min: 0x0007_0000,
            usage_max: 0x0007_0003,
            logical_max: 3,
            size: 8,
            count: 6,
            ..Default::default()
        };
        let fields = HidField::from_parser_state(&state);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].usage, 0x0001_0006);
        assert_eq!(fields[0].usages.len(), 4);
        assert_eq!(fields[0].count, 6);
    }

    #[test]
    fn decodes_unaligned_signed_values() {
        let field = field(-2048, 2047, 12, 4);
        let mut data = [0u8; 3];
        field.encode(&mut data, &[-3]).unwrap();
        assert_eq!(data, [0xD0, 0xFF, 0x00]);
        assert_eq!(field.decode(&data), vec![-3]);
    }

    #[test]
    fn single_bits_are_unsigned() {
        let field = field(-1, 1, 1, 0);
        assert!(!field.is_signed());
        assert_eq!(field.decode(&[0x01]), vec![1]);
    }

    #[test]
    fn rejects_out_of_range() {
        let field = field(0, 100, 8, 0);
        let mut data = [0u8; 1];
        assert!(matches!(
            field.encode(&mut data, &[101]),
            Err(RangeError::OutOfRange { .. })
        ));
        assert!(matches!(
            field.encode(&mut [], &[1]),
            Err(RangeError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn contact_ids_skip_range_check() {
        let mut field = field(0, 5, 8, 0);
        field.usage = CONTACT_ID;
        let mut data = [0u8; 1];
        field.encode(&mut data, &[200]).unwrap();
        assert_eq!(data[0], 200);
    }

    #[test]
    fn null_fields_accept_full_width() {
        let mut field = field(0, 7, 4, 0);
        field.flags |= 0x40;
        let mut data = [0u8; 1];
        field.encode(&mut data, &[15]).unwrap();
        assert_eq!(field.decode(&data), vec![15]);
        assert!(field.encode(&mut data, &[16]).is_err());
    }

    proptest! {
        #[test]
        fn encode_decode_in_range(
            size in 2u32..=32,
            start in 0u32..16,
            seed in any::<u32>(),
            signed in any::<bool>(),
        ) {
            let (min, max) = if signed {
                (-(1i64 << (size - 1)), (1i64 << (size - 1)) - 1)
            } else {
                (0, (1i64 << size) - 1)
            };
            let value = min + (seed as i64).rem_euclid(max - min + 1);
            let field = field(min, max, size, start);
            let mut data = vec![0u8; field.bytes_needed()];
            field.encode(&mut data, &[value]).unwrap();
            prop_assert_eq!(field.decode(&data), vec![value]);
        }
    }
}
