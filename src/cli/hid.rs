use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Subcommand, ValueEnum};
use tabled::settings::{Panel, Style};
use tabled::{Table, Tabled};

use crate::hid::descriptor::{DumpFormat, ReportDescriptor};

#[derive(Subcommand, Debug, Clone)]
pub enum HidCommand {
    /// Print a report descriptor
    Dump {
        /// Binary descriptor, hidraw device or sysfs report_descriptor
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = HidFormat::Human)]
        format: HidFormat,
    },
    /// List the reports of a descriptor
    Reports {
        /// Binary descriptor, hidraw device or sysfs report_descriptor
        path: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidFormat {
    /// One item per line
    Human,
    /// C source as used by the kernel
    Kernel,
    /// Raw hex bytes
    Bytes,
    /// C array with comments
    C,
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Id")]
    id: u8,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Application")]
    application: String,
    #[tabled(rename = "Size (bytes)")]
    size: usize,
    #[tabled(rename = "Fields")]
    fields: usize,
}

/// Resolve `/dev/hidrawN` to the descriptor exposed in sysfs
fn descriptor_path(path: &Path) -> PathBuf {
    let is_hidraw = path.starts_with("/dev")
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("hidraw"));
    match (is_hidraw, path.file_name()) {
        (true, Some(name)) => Path::new("/sys/class/hidraw")
            .join(name)
            .join("device/report_descriptor"),
        _ => path.to_path_buf(),
    }
}

/// Load a descriptor in binary form, or as text in the human or hex formats
pub fn load_descriptor(path: &Path) -> Result<ReportDescriptor, Box<dyn Error>> {
    let data = fs::read(descriptor_path(path))?;
    let text = std::str::from_utf8(&data)
        .ok()
        .filter(|text| text.chars().all(|c| !c.is_control() || c.is_whitespace()));
    if let Some(text) = text {
        let text = text.trim();
        if text.contains('(') {
            return Ok(ReportDescriptor::from_human_descr(text)?);
        }
        if !text.is_empty() && text.split_whitespace().all(|w| w.len() <= 4) {
            if let Ok(descriptor) = ReportDescriptor::from_hex_string(text) {
                return Ok(descriptor);
            }
        }
    }
    Ok(ReportDescriptor::from_bytes(&data)?)
}

pub fn format_descriptor(descriptor: &ReportDescriptor, format: HidFormat) -> String {
    match format {
        HidFormat::Human => descriptor.dump(DumpFormat::Human),
        HidFormat::Kernel => descriptor.dump(DumpFormat::Kernel),
        HidFormat::C => descriptor.dump(DumpFormat::CArray),
        HidFormat::Bytes => {
            let bytes = descriptor.bytes();
            let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("{} {}", bytes.len(), hex.join(" "))
        }
    }
}

pub fn handle_hid(cmd: HidCommand) -> Result<(), Box<dyn Error>> {
    match cmd {
        HidCommand::Dump { path, format } => {
            let descriptor = load_descriptor(&path)?;
            println!("{}", format_descriptor(&descriptor, format));
        }
        HidCommand::Reports { path } => {
            let descriptor = load_descriptor(&path)?;
            let rows: Vec<ReportRow> = descriptor
                .reports()
                .map(|report| ReportRow {
                    id: report.report_id,
                    kind: report.report_type.to_string(),
                    application: report.application_name(),
                    size: report.size(),
                    fields: report.fields.len(),
                })
                .collect();
            let count = rows.len();
            let mut table = Table::new(rows);
            table
                .with(Style::modern_rounded())
                .with(Panel::header("HID Reports"));
            println!("{table}");
            println!("Found {count} report(s), {} bytes", descriptor.size());
        }
    }
    Ok(())
}
