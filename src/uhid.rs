//! Wrapper around `/dev/uhid`, used to create virtual HID devices.
//!
//! Each [Uhid] owns at most one kernel device. The handle is non-blocking, so
//! [Uhid::read_event] returns `None` once the backchannel is drained.
use std::{fs::File, io};

use thiserror::Error;
use uhid_virt::{CreateParams, StreamError, UHIDDevice};

pub const MAX_NAME: usize = 128;
pub const MAX_PHYS: usize = 64;
pub const MAX_UNIQ: usize = 64;
pub const MAX_DATA: usize = 4096;

/// Possible errors of the uhid wrapper
#[derive(Error, Debug)]
pub enum UhidError {
    #[error("device name is {0} bytes, at most {MAX_NAME} are allowed")]
    NameTooLong(usize),
    #[error("device phys is {0} bytes, at most {MAX_PHYS} are allowed")]
    PhysTooLong(usize),
    #[error("device uniq is {0} bytes, at most {MAX_UNIQ} are allowed")]
    UniqTooLong(usize),
    #[error("report descriptor is {0} bytes, at most {MAX_DATA} are allowed")]
    DescriptorTooLarge(usize),
    #[error("report is {0} bytes, at most {MAX_DATA} are allowed")]
    DataTooLarge(usize),
    #[error("a uhid device was already created with this handle")]
    AlreadyCreated,
    #[error("no uhid device was created")]
    NotCreated,
    #[error("uhid i/o failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bus {
    Usb,
    Bluetooth,
}

impl From<Bus> for uhid_virt::Bus {
    fn from(bus: Bus) -> Self {
        match bus {
            Bus::Usb => uhid_virt::Bus::USB,
            Bus::Bluetooth => uhid_virt::Bus::BLUETOOTH,
        }
    }
}

/// Parameters of a UHID_CREATE2 request
#[derive(Debug, Clone)]
pub struct DeviceParams {
    pub name: String,
    pub phys: String,
    pub uniq: String,
    pub bus: Bus,
    pub vid: u16,
    pub pid: u16,
    pub version: u32,
    pub country: u32,
    pub descriptor: Vec<u8>,
}

impl DeviceParams {
    /// Check the kernel limits of the create request
    pub fn validate(&self) -> Result<(), UhidError> {
        if self.name.len() > MAX_NAME {
            return Err(UhidError::NameTooLong(self.name.len()));
        }
        if self.phys.len() > MAX_PHYS {
            return Err(UhidError::PhysTooLong(self.phys.len()));
        }
        if self.uniq.len() > MAX_UNIQ {
            return Err(UhidError::UniqTooLong(self.uniq.len()));
        }
        if self.descriptor.len() > MAX_DATA {
            return Err(UhidError::DescriptorTooLarge(self.descriptor.len()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Feature,
    Output,
    Input,
}

impl From<uhid_virt::ReportType> for ReportKind {
    fn from(kind: uhid_virt::ReportType) -> Self {
        match kind {
            uhid_virt::ReportType::Feature => ReportKind::Feature,
            uhid_virt::ReportType::Output => ReportKind::Output,
            uhid_virt::ReportType::Input => ReportKind::Input,
        }
    }
}

/// Events sent by the kernel to the virtual device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UhidEvent {
    /// The hid subsystem started the device
    Start,
    Stop,
    /// A reader opened the device
    Open,
    /// The last reader closed the device
    Close,
    /// Data written by the host, e.g. rumble
    Output { data: Vec<u8> },
    /// Must be answered with [Uhid::get_report_reply] using the same id
    GetReport { id: u32, number: u8, kind: ReportKind },
    /// Must be answered with [Uhid::set_report_reply] using the same id
    SetReport {
        id: u32,
        number: u8,
        kind: ReportKind,
        data: Vec<u8>,
    },
}

/// A handle to `/dev/uhid` owning at most one virtual device
#[derive(Default)]
pub struct Uhid {
    device: Option<UHIDDevice<File>>,
}

impl std::fmt::Debug for Uhid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uhid")
            .field("created", &self.device.is_some())
            .finish()
    }
}

impl Uhid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_created(&self) -> bool {
        self.device.is_some()
    }

    /// Create the virtual device
    pub fn create(&mut self, params: &DeviceParams) -> Result<(), UhidError> {
        if self.device.is_some() {
            return Err(UhidError::AlreadyCreated);
        }
        params.validate()?;

        log::debug!(
            "Creating uhid device '{}' ({:04x}:{:04x})",
            params.name,
            params.vid,
            params.pid
        );
        let device = UHIDDevice::create(CreateParams {
            name: params.name.clone(),
            phys: params.phys.clone(),
            uniq: params.uniq.clone(),
            bus: params.bus.into(),
            vendor: params.vid as u32,
            product: params.pid as u32,
            version: params.version,
            country: params.country,
            rd_data: params.descriptor.clone(),
        })?;
        self.device = Some(device);
        Ok(())
    }

    fn device(&mut self) -> Result<&mut UHIDDevice<File>, UhidError> {
        self.device.as_mut().ok_or(UhidError::NotCreated)
    }

    /// Send an input report to the host
    pub fn send_input(&mut self, data: &[u8]) -> Result<(), UhidError> {
        if data.len() > MAX_DATA {
            return Err(UhidError::DataTooLarge(data.len()));
        }
        self.device()?.write(data)?;
        Ok(())
    }

    /// Read the next pending event, or `None` if there is nothing to read
    pub fn read_event(&mut self) -> Result<Option<UhidEvent>, UhidError> {
        let device = self.device()?;
        loop {
            let event = match device.read() {
                Ok(event) => event,
                Err(StreamError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(None)
                }
                Err(StreamError::Io(e)) => return Err(e.into()),
                Err(StreamError::UnknownEventType(kind)) => {
                    log::debug!("Unknown uhid event type: {kind}");
                    continue;
                }
            };

            let event = match event {
                uhid_virt::OutputEvent::Start { .. } => UhidEvent::Start,
                uhid_virt::OutputEvent::Stop => UhidEvent::Stop,
                uhid_virt::OutputEvent::Open => UhidEvent::Open,
                uhid_virt::OutputEvent::Close => UhidEvent::Close,
                uhid_virt::OutputEvent::Output { data } => UhidEvent::Output { data },
                uhid_virt::OutputEvent::GetReport {
                    id,
                    report_number,
                    report_type,
                } => UhidEvent::GetReport {
                    id,
                    number: report_number,
                    kind: report_type.into(),
                },
                uhid_virt::OutputEvent::SetReport {
                    id,
                    report_number,
                    report_type,
                    data,
                } => UhidEvent::SetReport {
                    id,
                    number: report_number,
                    kind: report_type.into(),
                    data,
                },
            };
            return Ok(Some(event));
        }
    }

    pub fn get_report_reply(&mut self, id: u32, err: u16, data: &[u8]) -> Result<(), UhidError> {
        if data.len() > MAX_DATA {
            return Err(UhidError::DataTooLarge(data.len()));
        }
        self.device()?
            .write_get_report_reply(id, err, data.to_vec())?;
        Ok(())
    }

    pub fn set_report_reply(&mut self, id: u32, err: u16) -> Result<(), UhidError> {
        self.device()?.write_set_report_reply(id, err)?;
        Ok(())
    }

    /// Destroy the virtual device. Destroying twice is a no-op.
    pub fn destroy(&mut self) -> Result<(), UhidError> {
        let Some(mut device) = self.device.take() else {
            return Ok(());
        };
        device.destroy()?;
        Ok(())
    }
}

impl Drop for Uhid {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::warn!("Failed to destroy uhid device: {e}");
        }
    }
}
