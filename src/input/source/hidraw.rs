//! Generic hidraw producer. Devices are matched through hidapi and their
//! reports decoded with the bit maps of [ReportMap].
use std::{
    collections::{HashMap, HashSet},
    fs::{File, OpenOptions},
    io::{self, Read},
    os::{
        fd::{AsRawFd, RawFd},
        unix::fs::OpenOptionsExt,
    },
    path::PathBuf,
};

use hidapi::{DeviceInfo, HidApi};
use nix::fcntl::OFlag;

use crate::input::{
    event::{AxisCode, ButtonCode, ConfigCode, Event, Scalar},
    mapping::{decode_axis, decode_config, get_button, ReportMap},
    Consumer, DeviceError, Producer,
};

use super::{matches_any, matches_glob};

/// Largest report read from a device
pub const MAX_REPORT_SIZE: usize = 4096;

/// Properties a hidraw node must have. Empty lists match anything.
#[derive(Debug, Clone, Default)]
pub struct HidrawMatch {
    pub vid: Vec<u16>,
    pub pid: Vec<u16>,
    /// Glob patterns
    pub manufacturer: Vec<String>,
    /// Glob patterns
    pub product: Vec<String>,
    pub usage_page: Vec<u16>,
    pub usage: Vec<u16>,
    pub interface: Option<i32>,
}

impl HidrawMatch {
    pub fn matches(&self, info: &DeviceInfo) -> bool {
        matches_any(info.vendor_id(), &self.vid)
            && matches_any(info.product_id(), &self.pid)
            && matches_glob(info.manufacturer_string(), &self.manufacturer)
            && matches_glob(info.product_string(), &self.product)
            && matches_any(info.usage_page(), &self.usage_page)
            && matches_any(info.usage(), &self.usage)
            && self
                .interface
                .map(|i| i == info.interface_number())
                .unwrap_or(true)
    }

    /// Path of the first matching hidraw node
    pub fn find(&self) -> Result<Option<PathBuf>, DeviceError> {
        let api = HidApi::new().map_err(|e| DeviceError::NotReady(e.to_string()))?;
        let mut seen = HashSet::new();
        for info in api.device_list() {
            let path = PathBuf::from(info.path().to_string_lossy().as_ref());
            // hidapi lists a node once per top level collection
            if !seen.insert(path.clone()) || !self.matches(info) {
                continue;
            }
            log::info!(
                "Found device {:04x}:{:04x} '{}': '{}' at {}",
                info.vendor_id(),
                info.product_id(),
                info.manufacturer_string().unwrap_or_default(),
                info.product_string().unwrap_or_default(),
                path.display()
            );
            return Ok(Some(path));
        }
        Ok(None)
    }
}

impl std::fmt::Display for HidrawMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vid: {:04x?}, pid: {:04x?}", self.vid, self.pid)?;
        if !self.manufacturer.is_empty() {
            write!(f, ", manufacturer: {:?}", self.manufacturer)?;
        }
        if !self.product.is_empty() {
            write!(f, ", product: {:?}", self.product)?;
        }
        if !self.usage_page.is_empty() {
            write!(f, ", usage page: {:04x?}", self.usage_page)?;
        }
        if !self.usage.is_empty() {
            write!(f, ", usage: {:04x?}", self.usage)?;
        }
        if let Some(interface) = self.interface {
            write!(f, ", interface: {interface}")?;
        }
        Ok(())
    }
}

/// Device specific handling of an opened hidraw node, such as vendor
/// commands on open and close or feedback written back to the device.
pub trait HidrawCallback: Send {
    fn on_open(&mut self, _dev: &mut File) -> io::Result<()> {
        Ok(())
    }

    /// Called with every batch the source consumes
    fn on_events(&mut self, dev: &mut File, events: &[Event]) -> io::Result<()>;

    fn on_close(&mut self, _dev: &mut File, _exit: bool) -> io::Result<()> {
        Ok(())
    }
}

/// Decodes reports into events, emitting only values that changed
#[derive(Debug, Default)]
pub struct ReportDecoder {
    maps: Vec<ReportMap>,
    last: Option<Vec<u8>>,
    buttons: HashMap<ButtonCode, bool>,
    axes: HashMap<AxisCode, f64>,
    configs: HashMap<ConfigCode, Scalar>,
}

impl ReportDecoder {
    pub fn new(maps: Vec<ReportMap>) -> Self {
        Self {
            maps,
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.buttons.clear();
        self.axes.clear();
        self.configs.clear();
    }

    pub fn decode(&mut self, report: &[u8], out: &mut Vec<Event>) {
        if report.is_empty() || self.last.as_deref() == Some(report) {
            return;
        }
        self.last = Some(report.to_vec());

        let Some(map) = self.maps.iter().find(|m| m.matches(report)) else {
            log::trace!("Ignoring unmapped report: {:02x?}", &report[..report.len().min(8)]);
            return;
        };

        for (code, bmap) in map.buttons {
            let value = get_button(report, bmap);
            if self.buttons.insert(*code, value) != Some(value) {
                out.push(Event::button(*code, value));
            }
        }
        for (code, amap) in map.axes {
            let value = decode_axis(report, amap);
            if self.axes.insert(*code, value) != Some(value) {
                out.push(Event::axis(*code, value as f32));
            }
        }
        for (code, cmap) in map.configs {
            let value = decode_config(report, cmap);
            if self.configs.insert(*code, value) != Some(value) {
                out.push(Event::Configuration { code: *code, value });
            }
        }
    }
}

/// Producer for a hidraw node matched by [HidrawMatch]
pub struct HidrawSource {
    matcher: HidrawMatch,
    decoder: ReportDecoder,
    callback: Option<Box<dyn HidrawCallback>>,
    /// A missing device fails the graph instead of being skipped
    required: bool,
    /// Decode every queued report instead of only the newest
    lossless: bool,
    report_size: usize,
    device: Option<File>,
}

impl HidrawSource {
    pub fn new(matcher: HidrawMatch, maps: Vec<ReportMap>) -> Self {
        Self {
            matcher,
            decoder: ReportDecoder::new(maps),
            callback: None,
            required: true,
            lossless: true,
            report_size: MAX_REPORT_SIZE,
            device: None,
        }
    }

    pub fn with_callback(mut self, callback: impl HidrawCallback + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn lossy(mut self) -> Self {
        self.lossless = false;
        self
    }

    pub fn with_report_size(mut self, size: usize) -> Self {
        self.report_size = size;
        self
    }

    /// Read the queued reports. A closed node reads zero bytes.
    fn read_reports(&mut self) -> Result<Vec<Vec<u8>>, DeviceError> {
        let Some(device) = self.device.as_mut() else {
            return Ok(vec![]);
        };
        let mut reports = vec![];
        let mut buf = vec![0u8; self.report_size];
        loop {
            match device.read(&mut buf) {
                Ok(0) => {
                    return Err(DeviceError::NotReady(format!(
                        "hidraw device '{}' disconnected",
                        self.matcher
                    )))
                }
                Ok(len) => reports.push(buf[..len].to_vec()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        if !self.lossless && reports.len() > 1 {
            log::trace!("Dropping {} stale reports", reports.len() - 1);
            reports.drain(..reports.len() - 1);
        }
        Ok(reports)
    }
}

impl Producer for HidrawSource {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        if let Some(device) = self.device.as_ref() {
            return Ok(vec![device.as_raw_fd()]);
        }

        let Some(path) = self.matcher.find()? else {
            if self.required {
                return Err(DeviceError::NotReady(format!(
                    "hidraw device not found ({})",
                    self.matcher
                )));
            }
            log::warn!("Optional hidraw device not found ({})", self.matcher);
            return Ok(vec![]);
        };

        let mut device = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&path)?;
        if let Some(callback) = self.callback.as_mut() {
            callback.on_open(&mut device)?;
        }
        self.decoder.reset();
        let fd = device.as_raw_fd();
        self.device = Some(device);
        Ok(vec![fd])
    }

    fn produce(&mut self, ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        let Some(fd) = self.device.as_ref().map(|d| d.as_raw_fd()) else {
            return Ok(vec![]);
        };
        if !ready.contains(&fd) {
            return Ok(vec![]);
        }

        let mut out = vec![];
        for report in self.read_reports()? {
            self.decoder.decode(&report, &mut out);
        }
        Ok(out)
    }

    fn close(&mut self, exit: bool) -> bool {
        if let (Some(device), Some(callback)) = (self.device.as_mut(), self.callback.as_mut()) {
            if let Err(e) = callback.on_close(device, exit) {
                log::warn!("Failed to reset hidraw device: {e}");
            }
        }
        self.device = None;
        true
    }
}

impl Consumer for HidrawSource {
    fn consume(&mut self, events: &[Event]) -> Result<(), DeviceError> {
        if let (Some(device), Some(callback)) = (self.device.as_mut(), self.callback.as_mut()) {
            callback.on_events(device, events)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::mapping::{AxisMap, ButtonMap, ConfigMap, NumType};

    const BUTTONS: [(ButtonCode, ButtonMap); 2] = [
        (ButtonCode::A, ButtonMap::new(8)),
        (ButtonCode::B, ButtonMap::new(9)),
    ];
    const AXES: [(AxisCode, AxisMap); 1] = [(AxisCode::Lt, AxisMap::new(16, NumType::U8))];
    const CONFIGS: [(ConfigCode, ConfigMap); 1] = [(ConfigCode::IsAttached, ConfigMap::bit(24))];
    const MAP: ReportMap = ReportMap {
        report_id: Some(0x04),
        buttons: &BUTTONS,
        axes: &AXES,
        configs: &CONFIGS,
    };

    #[test]
    fn decodes_changes_only() {
        let mut decoder = ReportDecoder::new(vec![MAP]);
        let mut out = vec![];
        decoder.decode(&[0x04, 0x80, 0xff, 0x80], &mut out);
        assert_eq!(
            out,
            vec![
                Event::button(ButtonCode::A, true),
                Event::button(ButtonCode::B, false),
                Event::axis(AxisCode::Lt, 1.0),
                Event::config(ConfigCode::IsAttached, true),
            ]
        );

        // Identical reports are skipped
        out.clear();
        decoder.decode(&[0x04, 0x80, 0xff, 0x80], &mut out);
        assert!(out.is_empty());

        decoder.decode(&[0x04, 0x40, 0xff, 0x80], &mut out);
        assert_eq!(
            out,
            vec![
                Event::button(ButtonCode::A, false),
                Event::button(ButtonCode::B, true),
            ]
        );

        // Other report ids are ignored
        out.clear();
        decoder.decode(&[0x05, 0x00, 0x00, 0x00], &mut out);
        assert!(out.is_empty());

        decoder.reset();
        decoder.decode(&[0x04, 0x40, 0xff, 0x80], &mut out);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn missing_optional_device_is_skipped() {
        let matcher = HidrawMatch {
            vid: vec![0xdead],
            pid: vec![0xbeef],
            ..Default::default()
        };
        // Without hidraw access enumeration fails with NotReady as well
        let mut source = HidrawSource::new(matcher.clone(), vec![MAP]).optional();
        match source.open() {
            Ok(fds) => assert!(fds.is_empty()),
            Err(e) => assert!(e.is_not_ready()),
        }

        let mut source = HidrawSource::new(matcher, vec![MAP]);
        assert!(source.open().unwrap_err().is_not_ready());
        assert!(source.produce(&[3]).unwrap().is_empty());
        assert!(source.close(true));
    }
}
