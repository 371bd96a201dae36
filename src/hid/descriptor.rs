use std::collections::BTreeMap;

use super::{
    field::{FieldState, HidField},
    item::{Item, ItemTag},
    report::{HidReport, ReportType},
    usage::WIN8_BLOB,
    DescriptorError, ParseError,
};

/// Output formats of [ReportDescriptor::dump]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpFormat {
    /// One item per line, indented by collection depth
    #[default]
    Human,
    /// C source with the description in block comments, as used in the kernel
    Kernel,
    /// Hex bytes with line comments carrying the offset and description
    CArray,
}

/// Line of the human format that records zero padding after the last item
const TRAILING_ZEROS: &str = "Trailing Zeros";

/// Global parser state, saved and restored by Push and Pop
#[derive(Debug, Clone, Default)]
struct Globals {
    usage_page: u16,
    report_id: u8,
    logical: Option<u32>,
    physical: Option<u32>,
    application: Option<u32>,
    logical_min: i64,
    logical_max: i64,
    physical_min: i64,
    physical_max: i64,
    unit: u32,
    unit_exp: i64,
    count: u32,
    size: u32,
}

/// Local parser state, reset after every main item
#[derive(Debug, Clone, Default)]
struct Locals {
    usages: Vec<u32>,
    usage_sizes: Vec<usize>,
    usage_min: u32,
    usage_max: u32,
    usage_max_size: usize,
}

/// A fully parsed HID report descriptor
#[derive(Debug, Clone, Default)]
pub struct ReportDescriptor {
    pub input_reports: BTreeMap<u8, HidReport>,
    pub output_reports: BTreeMap<u8, HidReport>,
    pub feature_reports: BTreeMap<u8, HidReport>,
    /// True if the device declares the Windows 8 touch certification blob
    pub win8: bool,
    items: Vec<Item>,
    trailing_zeros: usize,
}

struct Parser {
    descriptor: ReportDescriptor,
    glob: Globals,
    stack: Vec<Globals>,
    local: Locals,
    collection: (u32, u32, u32),
}

impl Parser {
    fn new() -> Self {
        Self {
            descriptor: ReportDescriptor::default(),
            glob: Globals::default(),
            stack: Vec::new(),
            local: Locals::default(),
            collection: (0, 0, 0),
        }
    }

    fn page(&self) -> u32 {
        (self.glob.usage_page as u32) << 16
    }

    /// Usages declared before their usage page get the page that is in
    /// effect when they are consumed.
    fn concatenate_usages(&mut self) {
        let page = self.page();
        if self.local.usage_max != 0
            && self.local.usage_max_size <= 2
            && self.local.usage_max & 0xFFFF_0000 != page
        {
            self.local.usage_max = self.local.usage_max & 0xFFFF | page;
            self.local.usage_min = self.local.usage_min & 0xFFFF | page;
        }

        for i in (0..self.local.usages.len()).rev() {
            if self.local.usage_sizes[i] > 2 {
                continue;
            }
            let usage = self.local.usages[i];
            if usage & 0xFFFF_0000 == page {
                break;
            }
            self.local.usages[i] = usage & 0xFFFF | page;
        }
    }

    fn report_mut(&mut self, report_type: ReportType) -> &mut HidReport {
        let report_id = self.glob.report_id;
        let application = self.glob.application;
        let reports = match report_type {
            ReportType::Input => &mut self.descriptor.input_reports,
            ReportType::Output => &mut self.descriptor.output_reports,
            ReportType::Feature => &mut self.descriptor.feature_reports,
        };
        reports
            .entry(report_id)
            .or_insert_with(|| HidReport::new(report_id, application, report_type))
    }

    fn parse_item(&mut self, item: &mut Item) -> Result<(), ParseError> {
        item.usage_page = self.glob.usage_page;
        let value = item.value;
        let size = item.raw.len();
        let page = self.page();

        match item.tag {
            ItemTag::ReportId => self.glob.report_id = value as u8,
            ItemTag::Push => self.stack.push(self.glob.clone()),
            ItemTag::Pop => {
                let Some(glob) = self.stack.pop() else {
                    return Err(ParseError::StackUnderflow {
                        offset: item.offset,
                    });
                };
                self.glob = glob;
            }
            ItemTag::UsagePage => self.glob.usage_page = value as u16,
            ItemTag::Collection => {
                self.concatenate_usages();
                let last = self.local.usages.last().copied();
                match value {
                    0x00 => {
                        self.collection.1 += 1;
                        if last.is_some() {
                            self.glob.physical = last;
                        }
                    }
                    0x01 => {
                        self.collection.0 += 1;
                        if last.is_some() {
                            self.glob.application = last;
                        }
                    }
                    0x02 => {
                        self.collection.2 += 1;
                        if last.is_some() {
                            self.glob.logical = last;
                        }
                    }
                    _ => (),
                }
                self.local = Locals::default();
            }
            ItemTag::UsageMinimum => {
                self.local.usage_min = if size <= 2 {
                    value as u32 | page
                } else {
                    value as u32
                };
            }
            ItemTag::UsageMaximum => {
                self.local.usage_max = if size <= 2 {
                    value as u32 | page
                } else {
                    value as u32
                };
                self.local.usage_max_size = size;
            }
            ItemTag::Usage => {
                let usage = if size <= 2 {
                    value as u32 | page
                } else {
                    value as u32
                };
                self.local.usages.push(usage);
                self.local.usage_sizes.push(size);
            }
            ItemTag::LogicalMinimum => self.glob.logical_min = value,
            ItemTag::LogicalMaximum => self.glob.logical_max = value,
            ItemTag::PhysicalMinimum => self.glob.physical_min = value,
            ItemTag::PhysicalMaximum => self.glob.physical_max = value,
            ItemTag::Unit => self.glob.unit = value as u32,
            ItemTag::UnitExponent => self.glob.unit_exp = value,
            ItemTag::ReportCount => self.glob.count = value as u32,
            ItemTag::ReportSize => self.glob.size = value as u32,
            ItemTag::Input | ItemTag::Output | ItemTag::Feature => {
                self.concatenate_usages();
                let state = FieldState {
                    report_id: self.glob.report_id,
                    logical: self.glob.logical,
                    physical: self.glob.physical,
                    application: self.glob.application,
                    collection: self.collection,
                    flags: value as u32,
                    usage_page: self.glob.usage_page,
                    usages: self.local.usages.clone(),
                    usage_min: self.local.usage_min,
                    usage_max: self.local.usage_max,
                    logical_min: self.glob.logical_min,
                    logical_max: self.glob.logical_max,
                    physical_min: self.glob.physical_min,
                    physical_max: self.glob.physical_max,
                    unit: self.glob.unit,
                    unit_exp: self.glob.unit_exp,
                    size: self.glob.size,
                    count: self.glob.count,
                };
                let fields = HidField::from_parser_state(&state);
                let report_type = match item.tag {
                    ItemTag::Input => ReportType::Input,
                    ItemTag::Output => ReportType::Output,
                    _ => ReportType::Feature,
                };
                self.report_mut(report_type).extend(fields);
                if report_type == ReportType::Feature
                    && self.local.usages.last() == Some(&WIN8_BLOB)
                {
                    self.descriptor.win8 = true;
                }
                self.local = Locals::default();
            }
            ItemTag::EndCollection
            | ItemTag::DesignatorIndex
            | ItemTag::DesignatorMinimum
            | ItemTag::DesignatorMaximum
            | ItemTag::StringIndex
            | ItemTag::StringMinimum
            | ItemTag::StringMaximum
            | ItemTag::Delimiter => (),
        }
        Ok(())
    }
}

impl ReportDescriptor {
    /// Build a descriptor from already split items
    pub fn from_items(items: Vec<Item>, trailing_zeros: usize) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        let mut offset = 0;
        let mut parsed = Vec::with_capacity(items.len());
        for mut item in items {
            item.offset = offset;
            offset += item.size();
            parser.parse_item(&mut item)?;
            parsed.push(item);
        }
        let mut descriptor = parser.descriptor;
        descriptor.items = parsed;
        descriptor.trailing_zeros = trailing_zeros;
        Ok(descriptor)
    }

    /// Parse a descriptor from its raw bytes
    pub fn from_bytes(rdesc: &[u8]) -> Result<Self, ParseError> {
        let (items, trailing_zeros) = Item::parse_all(rdesc)?;
        Self::from_items(items, trailing_zeros)
    }

    /// Parse a whitespace separated list of hex bytes whose first number is
    /// the count of the remaining bytes.
    pub fn from_hex_string(rdesc: &str) -> Result<Self, ParseError> {
        let mut bytes = Vec::new();
        for word in rdesc.split_whitespace().skip(1) {
            let byte = u8::from_str_radix(word.trim_start_matches("0x"), 16).map_err(|_| {
                ParseError::Syntax {
                    line: word.to_string(),
                    reason: "invalid hex byte".into(),
                }
            })?;
            bytes.push(byte);
        }
        Self::from_bytes(&bytes)
    }

    /// Parse the format written by [DumpFormat::Human]
    pub fn from_human_descr(rdesc: &str) -> Result<Self, DescriptorError> {
        let mut usage_page = 0u16;
        let mut stack = Vec::new();
        let mut items = Vec::new();
        let mut trailing_zeros = 0;
        for line in rdesc.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(count) = line
                .strip_prefix(TRAILING_ZEROS)
                .and_then(|rest| rest.strip_prefix(" ("))
                .and_then(|rest| rest.strip_suffix(')'))
            {
                trailing_zeros = count
                    .trim()
                    .parse()
                    .map_err(|_| DescriptorError::TrailingZeros(line.to_string()))?;
                continue;
            }
            let item = Item::from_human(line, usage_page)?;
            match item.tag {
                ItemTag::UsagePage => usage_page = item.usage_page,
                ItemTag::Push => stack.push(usage_page),
                ItemTag::Pop => usage_page = stack.pop().unwrap_or(usage_page),
                _ => (),
            }
            items.push(item);
        }
        Ok(Self::from_items(items, trailing_zeros)?)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Size of the descriptor in bytes
    pub fn size(&self) -> usize {
        self.items.iter().map(|i| i.size()).sum::<usize>() + self.trailing_zeros
    }

    /// The descriptor as bytes, identical to the parsed input
    pub fn bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.size());
        for item in self.items.iter() {
            data.extend(item.bytes());
        }
        data.extend(std::iter::repeat(0).take(self.trailing_zeros));
        data
    }

    /// Returns the input report with the given id, falling back to the
    /// unnumbered report. Reports longer than `size` are rejected, shorter
    /// ones accepted.
    pub fn get(&self, report_id: u8, size: usize) -> Option<&HidReport> {
        let report = self
            .input_reports
            .get(&report_id)
            .or_else(|| self.input_reports.get(&0))?;
        (report.size() <= size).then_some(report)
    }

    /// Returns the first input report of the given application
    pub fn get_report_from_application(&self, application: &str) -> Option<&HidReport> {
        self.input_reports.values().find(|r| {
            r.application_name() == application
                || r.application.map(|a| format!("{a:#010x}")).as_deref() == Some(application)
        })
    }

    /// All reports of every type
    pub fn reports(&self) -> impl Iterator<Item = &HidReport> {
        self.input_reports
            .values()
            .chain(self.output_reports.values())
            .chain(self.feature_reports.values())
    }

    /// Write the descriptor in the given format
    pub fn dump(&self, format: DumpFormat) -> String {
        let mut out = String::new();
        let mut indent = 0;
        for item in self.items.iter() {
            let (descr, next) = item.describe(indent);
            indent = next;
            let bytes: String = item.bytes().iter().map(|b| format!("0x{b:02x}, ")).collect();
            let bytes = bytes.trim_end();
            let line = match format {
                DumpFormat::Human => descr,
                DumpFormat::Kernel => {
                    let tabs = "\t".repeat(40usize.saturating_sub(bytes.len()) / 8);
                    let pad = "\t".repeat(52usize.saturating_sub(descr.len()) / 8);
                    format!("\t{bytes}{tabs}/* {descr}{pad}*/")
                }
                DumpFormat::CArray => {
                    format!("{bytes:<18} // {:03x}:  {descr}", item.offset)
                }
            };
            out.push_str(&line);
            out.push('\n');
        }
        if self.trailing_zeros > 0 {
            let descr = format!("{TRAILING_ZEROS} ({})", self.trailing_zeros);
            let zeros = "0x00, ".repeat(self.trailing_zeros);
            let zeros = zeros.trim_end();
            let line = match format {
                DumpFormat::Human => descr,
                DumpFormat::Kernel => format!("\t{zeros}\t/* {descr} */"),
                DumpFormat::CArray => {
                    let offset = self.size() - self.trailing_zeros;
                    format!("{zeros:<18} // {offset:03x}:  {descr}")
                }
            };
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}
