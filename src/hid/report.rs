use std::fmt::Display;

use super::{field::HidField, usage::hut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    Input,
    Output,
    Feature,
}

impl Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportType::Input => write!(f, "Input"),
            ReportType::Output => write!(f, "Output"),
            ReportType::Feature => write!(f, "Feature"),
        }
    }
}

/// A report made of [HidField]s. Report id 0 means the report is not
/// numbered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidReport {
    pub report_id: u8,
    pub application: Option<u32>,
    pub report_type: ReportType,
    pub fields: Vec<HidField>,
    bitsize: u32,
}

impl HidReport {
    pub fn new(report_id: u8, application: Option<u32>, report_type: ReportType) -> Self {
        Self {
            report_id,
            application,
            report_type,
            fields: Vec::new(),
            bitsize: if report_id != 0 { 8 } else { 0 },
        }
    }

    /// Append fields, assigning their start bit
    pub fn extend(&mut self, fields: Vec<HidField>) {
        for mut field in fields {
            field.start = self.bitsize;
            self.bitsize = self.bitsize.saturating_add(field.bitsize());
            self.fields.push(field);
        }
    }

    pub fn numbered(&self) -> bool {
        self.report_id != 0
    }

    /// Size in bits, including the report id byte
    pub fn bitsize(&self) -> u32 {
        self.bitsize
    }

    /// Size in bytes, including the report id byte
    pub fn size(&self) -> usize {
        (self.bitsize as usize).div_ceil(8)
    }

    pub fn application_name(&self) -> String {
        let Some(application) = self.application else {
            return "Vendor".to_string();
        };
        match hut().usage(application) {
            Some(usage) => usage.name.clone(),
            None => "Vendor".to_string(),
        }
    }

    /// Decode every non padding field of the given report into
    /// `(usage, values)` pairs.
    pub fn decode(&self, data: &[u8]) -> Vec<(u32, Vec<i64>)> {
        self.fields
            .iter()
            .filter(|f| !f.is_padding())
            .map(|f| (f.usage, f.decode(data)))
            .collect()
    }
}
