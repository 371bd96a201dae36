//! Short items of a report descriptor: one header byte followed by 0, 1, 2
//! or 4 payload bytes.
use std::fmt::Display;

use super::{
    collection::CollectionType, twos_comp, unit::HidUnit, usage::hut, DescriptorError, ParseError,
};

/// Scope of an item, taken from bits 2-3 of the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Main,
    Global,
    Local,
}

/// Item tags with the size bits masked out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemTag {
    // Main
    Input,
    Output,
    Feature,
    Collection,
    EndCollection,
    // Global
    UsagePage,
    LogicalMinimum,
    LogicalMaximum,
    PhysicalMinimum,
    PhysicalMaximum,
    UnitExponent,
    Unit,
    ReportSize,
    ReportId,
    ReportCount,
    Push,
    Pop,
    // Local
    Usage,
    UsageMinimum,
    UsageMaximum,
    DesignatorIndex,
    DesignatorMinimum,
    DesignatorMaximum,
    StringIndex,
    StringMinimum,
    StringMaximum,
    Delimiter,
}

const TAGS: &[(ItemTag, u8, &str)] = &[
    (ItemTag::Input, 0x80, "Input"),
    (ItemTag::Output, 0x90, "Output"),
    (ItemTag::Feature, 0xB0, "Feature"),
    (ItemTag::Collection, 0xA0, "Collection"),
    (ItemTag::EndCollection, 0xC0, "End Collection"),
    (ItemTag::UsagePage, 0x04, "Usage Page"),
    (ItemTag::LogicalMinimum, 0x14, "Logical Minimum"),
    (ItemTag::LogicalMaximum, 0x24, "Logical Maximum"),
    (ItemTag::PhysicalMinimum, 0x34, "Physical Minimum"),
    (ItemTag::PhysicalMaximum, 0x44, "Physical Maximum"),
    (ItemTag::UnitExponent, 0x54, "Unit Exponent"),
    (ItemTag::Unit, 0x64, "Unit"),
    (ItemTag::ReportSize, 0x74, "Report Size"),
    (ItemTag::ReportId, 0x84, "Report ID"),
    (ItemTag::ReportCount, 0x94, "Report Count"),
    (ItemTag::Push, 0xA4, "Push"),
    (ItemTag::Pop, 0xB4, "Pop"),
    (ItemTag::Usage, 0x08, "Usage"),
    (ItemTag::UsageMinimum, 0x18, "Usage Minimum"),
    (ItemTag::UsageMaximum, 0x28, "Usage Maximum"),
    (ItemTag::DesignatorIndex, 0x38, "Designator Index"),
    (ItemTag::DesignatorMinimum, 0x48, "Designator Minimum"),
    (ItemTag::DesignatorMaximum, 0x58, "Designator Maximum"),
    (ItemTag::StringIndex, 0x78, "String Index"),
    (ItemTag::StringMinimum, 0x88, "String Minimum"),
    (ItemTag::StringMaximum, 0x98, "String Maximum"),
    (ItemTag::Delimiter, 0xA8, "Delimiter"),
];

const FLAG_NAMES: [(&str, &str); 9] = [
    ("Data", "Cnst"),
    ("Arr", "Var"),
    ("Abs", "Rel"),
    ("", "Wrap"),
    ("", "NonLin"),
    ("", "NoPref"),
    ("", "Null"),
    ("", "Vol"),
    ("", "Buff"),
];

impl ItemTag {
    pub fn from_header(header: u8) -> Option<Self> {
        let code = header & 0xFC;
        TAGS.iter().find(|(_, c, _)| *c == code).map(|(tag, _, _)| *tag)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TAGS.iter().find(|(_, _, n)| *n == name).map(|(tag, _, _)| *tag)
    }

    pub fn code(&self) -> u8 {
        TAGS.iter()
            .find(|(tag, _, _)| tag == self)
            .map(|(_, code, _)| *code)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        TAGS.iter()
            .find(|(tag, _, _)| tag == self)
            .map(|(_, _, name)| *name)
            .unwrap_or_default()
    }

    pub fn item_type(&self) -> ItemType {
        match (self.code() >> 2) & 0x3 {
            0 => ItemType::Main,
            1 => ItemType::Global,
            _ => ItemType::Local,
        }
    }

    /// Minimum values are sign decoded; maximum values are not
    fn is_signed(&self) -> bool {
        matches!(self, Self::LogicalMinimum | Self::PhysicalMinimum)
    }

    /// True for items whose natural encoding is a two's complement number
    fn encodes_signed(&self) -> bool {
        matches!(
            self,
            Self::LogicalMinimum | Self::LogicalMaximum | Self::PhysicalMinimum | Self::PhysicalMaximum
        )
    }

    fn has_data(&self) -> bool {
        !matches!(self, Self::EndCollection | Self::Push | Self::Pop)
    }
}

impl Display for ItemTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One item of a report descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Byte offset of the header within the descriptor
    pub offset: usize,
    pub tag: ItemTag,
    /// Decoded payload value
    pub value: i64,
    /// Payload bytes, least significant first
    pub raw: Vec<u8>,
    /// Usage page in effect when this item was parsed
    pub usage_page: u16,
}

impl Item {
    /// Create an item from its tag and payload bytes
    pub fn new(tag: ItemTag, raw: Vec<u8>) -> Self {
        let unsigned = raw
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, b)| acc | (*b as u32) << (8 * i));
        let bits = 8 * raw.len() as u32;
        let value = match tag {
            t if t.is_signed() => twos_comp(unsigned, bits),
            ItemTag::UnitExponent if unsigned <= 0xF => twos_comp(unsigned, 4),
            ItemTag::UnitExponent => twos_comp(unsigned, bits),
            _ => unsigned as i64,
        };
        Self {
            offset: 0,
            tag,
            value,
            raw,
            usage_page: 0,
        }
    }

    /// Parse the first item of `data`. Returns `None` when only zero
    /// padding remains.
    pub fn parse_one(data: &[u8], offset: usize) -> Result<Option<Item>, ParseError> {
        let Some(header) = data.first().copied() else {
            return Ok(None);
        };
        if header == 0 {
            if data.iter().all(|b| *b == 0) {
                return Ok(None);
            }
            return Err(ParseError::UnexpectedType { header, offset });
        }
        let Some(tag) = ItemTag::from_header(header) else {
            return Err(ParseError::UnknownItem { header, offset });
        };
        let size = match header & 0x3 {
            3 => 4,
            n => n as usize,
        };
        if data.len() < size + 1 {
            return Err(ParseError::Truncated {
                offset,
                needed: size + 1,
                available: data.len(),
            });
        }
        let mut item = Item::new(tag, data[1..=size].to_vec());
        item.offset = offset;
        Ok(Some(item))
    }

    /// Split a descriptor into items. Returns the items and the number of
    /// zero bytes found at the end of the stream.
    pub fn parse_all(data: &[u8]) -> Result<(Vec<Item>, usize), ParseError> {
        let mut items = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let Some(item) = Item::parse_one(&data[offset..], offset)? else {
                return Ok((items, data.len() - offset));
            };
            offset += item.size();
            items.push(item);
        }
        Ok((items, 0))
    }

    /// Size in bytes including the header
    pub fn size(&self) -> usize {
        1 + self.raw.len()
    }

    pub fn header(&self) -> u8 {
        let size_bits = match self.raw.len() {
            4 => 0x3,
            n => n as u8 & 0x3,
        };
        self.tag.code() | size_bits
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.push(self.header());
        bytes.extend_from_slice(&self.raw);
        bytes
    }

    /// Unsigned view of the payload
    pub fn unsigned(&self) -> u32 {
        self.raw
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, b)| acc | (*b as u32) << (8 * i))
    }

    /// The shortest payload that encodes `value` for the given tag
    pub fn minimal_payload(tag: ItemTag, value: i64) -> Vec<u8> {
        if !tag.has_data() {
            return vec![];
        }
        let len = match tag {
            ItemTag::UnitExponent => {
                return vec![super::to_twos_comp(value, 4) as u8];
            }
            t if t.encodes_signed() => {
                if i8::try_from(value).is_ok() {
                    1
                } else if i16::try_from(value).is_ok() {
                    2
                } else {
                    4
                }
            }
            _ => {
                if (0..=0xFF).contains(&value) {
                    1
                } else if (0..=0xFFFF).contains(&value) {
                    2
                } else {
                    4
                }
            }
        };
        let value = value as u32;
        (0..len).map(|i| (value >> (8 * i)) as u8).collect()
    }

    fn is_minimal(&self) -> bool {
        Item::minimal_payload(self.tag, self.value) == self.raw
    }

    /// The payload written as literal bytes, e.g. `0x00ff`
    fn raw_hex(&self) -> String {
        let digits: String = self.raw.iter().rev().map(|b| format!("{b:02x}")).collect();
        format!("0x{digits}")
    }

    /// The human readable description of the payload, or `None` for items
    /// without payload.
    fn describe_data(&self) -> Option<String> {
        if !self.is_minimal() {
            return Some(self.raw_hex());
        }
        if !self.tag.has_data() {
            return None;
        }
        let hut = hut();
        let value = self.value;
        let data = match self.tag {
            ItemTag::Input | ItemTag::Output | ItemTag::Feature if value >> 9 != 0 => self.raw_hex(),
            ItemTag::Collection | ItemTag::UsagePage if value > 0xFFFF => self.raw_hex(),
            ItemTag::Input | ItemTag::Output | ItemTag::Feature => describe_flags(value as u32),
            ItemTag::Collection if value > 0xFF => self.raw_hex(),
            ItemTag::Collection => CollectionType::from_value(value as u32).to_string(),
            ItemTag::UsagePage => hut.page_name(value as u16),
            ItemTag::Usage if value <= 0xFFFF => hut.usage_name(self.usage_page, value as u32),
            ItemTag::Usage => format!("Vendor Usage 0x{value:08X}"),
            ItemTag::Unit if HidUnit::is_canonical(value as u32) => {
                HidUnit::from_value(value as u32).to_string()
            }
            ItemTag::Unit => self.raw_hex(),
            _ => value.to_string(),
        };
        Some(data)
    }

    /// Returns the human readable description of this item along with the
    /// indentation for the next item.
    pub fn describe(&self, indent: usize) -> (String, usize) {
        let (own_indent, next_indent) = match self.tag {
            ItemTag::Collection => (indent, indent + 1),
            ItemTag::EndCollection => (indent.saturating_sub(1), indent.saturating_sub(1)),
            _ => (indent, indent),
        };
        let descr = match self.describe_data() {
            Some(data) => format!("{} ({data})", self.tag.name()),
            None => self.tag.name().to_string(),
        };
        (format!("{}{descr}", " ".repeat(own_indent)), next_indent)
    }

    /// Parse a line of the human readable format. `usage_page` is the page in
    /// effect for named usages.
    pub fn from_human(line: &str, usage_page: u16) -> Result<Item, DescriptorError> {
        let line = line.trim();
        let syntax = |reason: &str| ParseError::Syntax {
            line: line.to_string(),
            reason: reason.to_string(),
        };
        let (name, data) = match (line.find('('), line.rfind(')')) {
            (Some(open), Some(close)) if open < close => {
                (line[..open].trim(), Some(line[open + 1..close].trim()))
            }
            _ => (line, None),
        };
        let Some(tag) = ItemTag::from_name(name) else {
            return Err(syntax("unknown item").into());
        };
        let Some(data) = data else {
            if tag.has_data() {
                return Err(syntax("missing item data").into());
            }
            let mut item = Item::new(tag, vec![]);
            item.usage_page = usage_page;
            return Ok(item);
        };

        // Literal payload bytes
        if let Some(hex) = data.strip_prefix("0x") {
            let raw = parse_raw_hex(hex).ok_or_else(|| syntax("invalid hex payload"))?;
            let mut item = Item::new(tag, raw);
            item.usage_page = match tag {
                ItemTag::UsagePage => item.value as u16,
                _ => usage_page,
            };
            return Ok(item);
        }

        let hut = hut();
        let hex_value = |s: &str, prefix: &str| -> Option<i64> {
            let digits = s.strip_prefix(prefix)?.trim().trim_start_matches("0x");
            i64::from_str_radix(digits, 16).ok()
        };
        let value: i64 = match tag {
            ItemTag::Input | ItemTag::Output | ItemTag::Feature => parse_flags(data) as i64,
            ItemTag::Collection => CollectionType::from_name(data)
                .ok_or_else(|| syntax("unknown collection type"))?
                .value() as i64,
            ItemTag::UsagePage => match hut.page_from_name(data) {
                Some(page) => page.page_id as i64,
                None => hex_value(data, "Vendor Defined Page ")
                    .or_else(|| data.parse().ok())
                    .ok_or_else(|| syntax("unknown usage page"))?,
            },
            ItemTag::Usage => {
                let named = hut
                    .page(usage_page)
                    .and_then(|page| page.from_name(data))
                    .map(|usage| usage.id as i64);
                match named {
                    Some(id) => id,
                    None => hex_value(data, "Vendor Usage ")
                        .or_else(|| data.parse().ok())
                        .ok_or_else(|| DescriptorError::UnknownUsage {
                            name: data.to_string(),
                            page: usage_page,
                        })?,
                }
            }
            ItemTag::Unit => {
                let unit: HidUnit = data.parse()?;
                unit.value() as i64
            }
            _ => data.parse().map_err(|_| syntax("invalid number"))?,
        };

        let raw = Item::minimal_payload(tag, value);
        let mut item = Item::new(tag, raw);
        item.usage_page = match tag {
            ItemTag::UsagePage => value as u16,
            _ => usage_page,
        };
        Ok(item)
    }
}

impl Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes: Vec<String> = self.bytes().iter().map(|b| format!("{b:02x}")).collect();
        write!(f, "{}", bytes.join(" "))
    }
}

fn describe_flags(value: u32) -> String {
    let mut parts = Vec::new();
    for (bit, (clear, set)) in FLAG_NAMES.iter().enumerate() {
        if value & (1 << bit) != 0 {
            parts.push(*set);
        } else if !clear.is_empty() {
            parts.push(*clear);
        }
    }
    parts.join(",")
}

fn parse_flags(data: &str) -> u32 {
    let mut value = 0;
    for part in data.split(',') {
        let part = part.trim();
        if let Some(bit) = FLAG_NAMES.iter().position(|(_, set)| *set == part) {
            value |= 1 << bit;
        }
    }
    value
}

fn parse_raw_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || hex.len() > 8 || hex.len() == 6 {
        return None;
    }
    let mut raw = Vec::new();
    for i in (0..hex.len()).step_by(2).rev() {
        raw.push(u8::from_str_radix(&hex[i..i + 2], 16).ok()?);
    }
    Some(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signed_minimum() {
        let item = Item::parse_one(&[0x15, 0x81], 0).unwrap().unwrap();
        assert_eq!(item.tag, ItemTag::LogicalMinimum);
        assert_eq!(item.value, -127);

        // Maximum values are never sign decoded
        let item = Item::parse_one(&[0x25, 0xFF], 0).unwrap().unwrap();
        assert_eq!(item.value, 255);
    }

    #[test]
    fn parses_unit_exponent_nibble() {
        let item = Item::parse_one(&[0x55, 0x0E], 0).unwrap().unwrap();
        assert_eq!(item.value, -2);
        let item = Item::parse_one(&[0x55, 0x07], 0).unwrap().unwrap();
        assert_eq!(item.value, 7);
    }

    #[test]
    fn four_byte_payload() {
        let item = Item::parse_one(&[0x0B, 0x30, 0x00, 0x01, 0x00], 0)
            .unwrap()
            .unwrap();
        assert_eq!(item.tag, ItemTag::Usage);
        assert_eq!(item.value, 0x0001_0030);
        assert_eq!(item.bytes(), vec![0x0B, 0x30, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn rejects_bad_headers() {
        assert_eq!(
            Item::parse_one(&[0x00, 0x05], 3),
            Err(ParseError::UnexpectedType {
                header: 0,
                offset: 3
            })
        );
        assert!(matches!(
            Item::parse_one(&[0x26, 0xFF], 0),
            Err(ParseError::Truncated { .. })
        ));
        assert!(matches!(
            Item::parse_one(&[0xFE, 0x00], 0),
            Err(ParseError::UnknownItem { .. })
        ));
    }

    #[test]
    fn tolerates_trailing_zeros() {
        let (items, trailing) = Item::parse_all(&[0x05, 0x01, 0xC0, 0x00, 0x00]).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(trailing, 2);
    }

    #[test]
    fn describes_items() {
        let (items, _) = Item::parse_all(&[0x05, 0x01, 0x09, 0x05, 0x15, 0x81, 0x81, 0x02]).unwrap();
        let mut items = items;
        for item in items.iter_mut() {
            item.usage_page = 0x01;
        }
        let lines: Vec<String> = items.iter().map(|i| i.describe(0).0).collect();
        assert_eq!(
            lines,
            vec![
                "Usage Page (Generic Desktop)",
                "Usage (Game Pad)",
                "Logical Minimum (-127)",
                "Input (Data,Var,Abs)",
            ]
        );
    }

    #[test]
    fn non_minimal_payloads_round_trip_as_hex() {
        for bytes in [
            vec![0x25, 0xFF],
            vec![0x96, 0x40, 0x00],
            vec![0x55, 0xFE],
            vec![0x80],
            vec![0xC1, 0x00],
            vec![0x0A, 0x30, 0x00],
            vec![0x67, 0x01, 0x00, 0x00, 0x00],
        ] {
            let item = Item::parse_one(&bytes, 0).unwrap().unwrap();
            let (line, _) = item.describe(0);
            let parsed = Item::from_human(&line, 0x01).unwrap();
            assert_eq!(parsed.bytes(), bytes, "line '{line}'");
        }
    }

    #[test]
    fn human_input_uses_minimal_encoding() {
        let item = Item::from_human("Logical Maximum (255)", 0).unwrap();
        assert_eq!(item.bytes(), vec![0x26, 0xFF, 0x00]);
        let item = Item::from_human("Logical Minimum (-32768)", 0).unwrap();
        assert_eq!(item.bytes(), vec![0x16, 0x00, 0x80]);
        let item = Item::from_human("Usage Page (Vendor Defined Page 0xFF00)", 0).unwrap();
        assert_eq!(item.bytes(), vec![0x06, 0x00, 0xFF]);
        assert_eq!(item.usage_page, 0xFF00);
        let item = Item::from_human("Unit Exponent (-2)", 0).unwrap();
        assert_eq!(item.bytes(), vec![0x55, 0x0E]);
        assert!(matches!(
            Item::from_human("Usage (Not A Usage)", 0x01),
            Err(DescriptorError::UnknownUsage { .. })
        ));
    }
}
