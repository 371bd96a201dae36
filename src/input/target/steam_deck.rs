//! Virtual Steam Deck controller, as seen by Steam through hidraw.
use std::os::fd::RawFd;

use packed_struct::{
    types::{Integer, SizedInteger},
    PackedStruct,
};
use rand::Rng;

use crate::{
    drivers::steam_deck::{
        driver::{
            attributes_reply, chip_id_reply, decode_feedback, denormalize_signed_value,
            denormalize_unsigned_to_signed_value, denormalize_unsigned_value, serial_reply,
            COUNTRY, NAME, SERIAL, VERSION,
        },
        hid_report::{
            PackedInputDataReport, ReportType, PAD_FORCE_MAX, PAD_X_MAX, PAD_X_MIN, PAD_Y_MAX,
            PAD_Y_MIN, STICK_X_MAX, STICK_X_MIN, STICK_Y_MAX, STICK_Y_MIN, TRIGG_MAX,
        },
        report_descriptor::CONTROLLER_DESCRIPTOR,
        ProductId, VID,
    },
    input::{
        event::{AxisCode, ButtonCode, Event},
        Consumer, DeviceError, Producer,
    },
    uhid::{Bus, DeviceParams, Uhid, UhidEvent},
};

/// Register of the IMU reporting mode
pub const REGISTER_GYRO_MODE: u8 = 0x30;
/// Accelerometer and gyro reports, the mode Steam enables
pub const GYRO_MODE_FULL: u16 = 0x18;

/// Accelerometer counts per m/s², 1 g is 16384
const ACCEL_SCALE: f64 = 16384.0 / 9.80665;
/// Gyro counts per deg/s, full scale is 2000 deg/s
const GYRO_SCALE: f64 = 32768.0 / 2000.0;

/// Analog trigger travel that also presses the digital trigger
const TRIGGER_CLICK: f64 = 0.8;

pub struct SteamDeck {
    uhid: Uhid,
    state: PackedInputDataReport,
    chip_id: [u8; 15],
    /// Steam selects a report with a set report, then fetches it with a get
    /// report
    current_report: ReportType,
    /// Per side IMU reporting, enabled through [REGISTER_GYRO_MODE]
    sensors: [bool; 2],
}

impl std::fmt::Debug for SteamDeck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteamDeck")
            .field("uhid", &self.uhid)
            .field("current_report", &self.current_report)
            .field("sensors", &self.sensors)
            .finish()
    }
}

impl Default for SteamDeck {
    fn default() -> Self {
        Self::new()
    }
}

impl SteamDeck {
    pub fn new() -> Self {
        let mut rng = rand::rng();
        let mut chip_id = [0u8; 15];
        rng.fill(&mut chip_id);
        Self {
            uhid: Uhid::new(),
            state: PackedInputDataReport::new(),
            chip_id,
            current_report: ReportType::InputData,
            sensors: [false; 2],
        }
    }

    fn params() -> DeviceParams {
        DeviceParams {
            name: NAME.to_string(),
            phys: String::new(),
            uniq: String::new(),
            bus: Bus::Usb,
            vid: VID,
            pid: ProductId::SteamDeck.to_u16(),
            version: VERSION,
            country: COUNTRY,
            descriptor: CONTROLLER_DESCRIPTOR.to_vec(),
        }
    }

    fn sensors_enabled(&self) -> bool {
        self.sensors.iter().any(|s| *s)
    }

    fn set_sensors(&mut self, enabled: bool) {
        if self.sensors != [enabled; 2] {
            log::debug!(
                "{} high quality IMU reports",
                if enabled { "Enabling" } else { "Disabling" }
            );
        }
        self.sensors = [enabled; 2];
    }

    fn apply_button(&mut self, code: ButtonCode, value: bool) {
        let s = &mut self.state;
        match code {
            ButtonCode::A => s.a = value,
            ButtonCode::B => s.b = value,
            ButtonCode::X => s.x = value,
            ButtonCode::Y => s.y = value,
            ButtonCode::Lb => s.l1 = value,
            ButtonCode::Rb => s.r1 = value,
            ButtonCode::Start => s.menu = value,
            ButtonCode::Select => s.options = value,
            ButtonCode::Mode => s.steam = value,
            ButtonCode::Share => s.quick_access = value,
            ButtonCode::DpadUp => s.up = value,
            ButtonCode::DpadDown => s.down = value,
            ButtonCode::DpadLeft => s.left = value,
            ButtonCode::DpadRight => s.right = value,
            ButtonCode::Ls => s.l3 = value,
            ButtonCode::Rs => s.r3 = value,
            ButtonCode::ExtraL1 => s.l4 = value,
            ButtonCode::ExtraL2 => s.l5 = value,
            ButtonCode::ExtraR1 => s.r4 = value,
            ButtonCode::ExtraR2 => s.r5 = value,
            ButtonCode::TouchpadTouch => s.r_pad_touch = value,
            ButtonCode::TouchpadLeft | ButtonCode::TouchpadRight => {
                s.r_pad_press = value;
                let force = if value { PAD_FORCE_MAX } else { 0.0 };
                s.r_pad_force = Integer::from_primitive(denormalize_unsigned_value(1.0, force));
            }
            _ => (),
        }
    }

    fn apply_axis(&mut self, code: AxisCode, value: f64) {
        let imu = self.sensors_enabled();
        let s = &mut self.state;
        let signed = |v: f64, min: f64, max: f64| {
            Integer::from_primitive(denormalize_signed_value(v, min, max))
        };
        let pad_x = |v: f64| {
            Integer::from_primitive(denormalize_unsigned_to_signed_value(v, PAD_X_MIN, PAD_X_MAX))
        };
        let pad_y = |v: f64| {
            Integer::from_primitive(denormalize_unsigned_to_signed_value(v, PAD_Y_MIN, PAD_Y_MAX))
        };
        let imu_value = |v: f64, scale: f64| {
            Integer::from_primitive((v * scale).clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        };

        match code {
            AxisCode::LsX => s.l_stick_x = signed(value, STICK_X_MIN, STICK_X_MAX),
            AxisCode::LsY => s.l_stick_y = signed(value, STICK_Y_MIN, STICK_Y_MAX),
            AxisCode::RsX => s.r_stick_x = signed(value, STICK_X_MIN, STICK_X_MAX),
            AxisCode::RsY => s.r_stick_y = signed(value, STICK_Y_MIN, STICK_Y_MAX),
            AxisCode::Lt => {
                s.l2 = value > TRIGGER_CLICK;
                s.l_trigg = Integer::from_primitive(denormalize_unsigned_value(value, TRIGG_MAX));
            }
            AxisCode::Rt => {
                s.r2 = value > TRIGGER_CLICK;
                s.r_trigg = Integer::from_primitive(denormalize_unsigned_value(value, TRIGG_MAX));
            }
            AxisCode::HatX => {
                s.left = value < -0.5;
                s.right = value > 0.5;
            }
            AxisCode::HatY => {
                s.up = value < -0.5;
                s.down = value > 0.5;
            }
            AxisCode::TouchpadX | AxisCode::RightTouchpadX => s.r_pad_x = pad_x(value),
            AxisCode::TouchpadY | AxisCode::RightTouchpadY => s.r_pad_y = pad_y(value),
            AxisCode::LeftTouchpadX => s.l_pad_x = pad_x(value),
            AxisCode::LeftTouchpadY => s.l_pad_y = pad_y(value),
            AxisCode::AccelX if imu => s.accel_x = imu_value(value, ACCEL_SCALE),
            AxisCode::AccelY if imu => s.accel_y = imu_value(value, ACCEL_SCALE),
            AxisCode::AccelZ if imu => s.accel_z = imu_value(value, ACCEL_SCALE),
            AxisCode::GyroX if imu => s.pitch = imu_value(value, GYRO_SCALE),
            AxisCode::GyroY if imu => s.yaw = imu_value(value, GYRO_SCALE),
            AxisCode::GyroZ if imu => s.roll = imu_value(value, GYRO_SCALE),
            _ => (),
        }
    }

    /// Fold events into the report and advance the frame counter
    fn update(&mut self, events: &[Event]) {
        for ev in events {
            match ev {
                Event::Button { code, value } => self.apply_button(*code, *value),
                Event::Axis { code, value } => self.apply_axis(*code, *value as f64),
                _ => (),
            }
        }
        let frame = self.state.frame.to_primitive();
        self.state.frame = Integer::from_primitive(frame.wrapping_add(1));
    }

    /// Reply to the report selected by the last set report
    fn get_report(&self) -> Vec<u8> {
        match self.current_report {
            ReportType::GetAttributesValues => {
                log::debug!("Sending attribute data");
                attributes_reply()
            }
            ReportType::GetStringAttribute => {
                log::debug!("Sending serial number: {SERIAL}");
                serial_reply(SERIAL)
            }
            ReportType::GetChipId => {
                log::debug!("Sending chip id: {:02x?}", self.chip_id);
                chip_id_reply(&self.chip_id)
            }
            _ => {
                log::trace!(
                    "Got get report for a report we do not handle: {:?}",
                    self.current_report
                );
                vec![]
            }
        }
    }

    /// Handle a set report. Returns the feedback it carries.
    fn set_report(&mut self, mut data: Vec<u8>) -> Option<Event> {
        let report_id = *data.get(1)?;
        self.current_report = match ReportType::try_from(report_id) {
            Ok(id) => id,
            Err(_) => {
                log::warn!("Unknown report id: {report_id:#04x}");
                return None;
            }
        };
        // uhid prepends the report number
        data.remove(0);

        match self.current_report {
            ReportType::TriggerHapticCommand | ReportType::TriggerRumbleCommand => {
                match decode_feedback(self.current_report, &data) {
                    Ok(ev) => ev.map(Event::Rumble),
                    Err(e) => {
                        log::error!("Failed to unpack {:?}: {e:?}", self.current_report);
                        None
                    }
                }
            }
            ReportType::WriteRegister => {
                // [cmd, len, (register, value lo, value hi)*]
                let len = data.get(1).copied().unwrap_or_default() as usize;
                let body = data.get(2..2 + len).unwrap_or_default();
                for reg in body.chunks_exact(3) {
                    if reg[0] == REGISTER_GYRO_MODE {
                        let mode = u16::from_le_bytes([reg[1], reg[2]]);
                        self.set_sensors(mode != 0);
                    }
                }
                None
            }
            // Lizard mode and mapping commands have no effect on a virtual device
            other => {
                log::trace!("Ignoring set report {other:?}");
                None
            }
        }
    }

    fn drain(&mut self) -> Result<Vec<Event>, DeviceError> {
        let mut out = vec![];
        if !self.uhid.is_created() {
            return Ok(out);
        }
        while let Some(event) = self.uhid.read_event()? {
            match event {
                UhidEvent::GetReport { id, .. } => {
                    let reply = self.get_report();
                    self.uhid.get_report_reply(id, 0, &reply)?;
                }
                UhidEvent::SetReport { id, data, .. } => {
                    out.extend(self.set_report(data));
                    self.uhid.set_report_reply(id, 0)?;
                }
                UhidEvent::Output { data } => {
                    log::trace!("Got output report: {data:02x?}");
                }
                other => log::debug!("Received {other:?}"),
            }
        }
        Ok(out)
    }
}

impl Producer for SteamDeck {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        if self.uhid.is_created() {
            return Ok(vec![]);
        }
        self.state = PackedInputDataReport::new();
        self.current_report = ReportType::InputData;
        self.uhid.create(&Self::params())?;
        self.set_sensors(true);
        log::info!("Starting '{NAME}'");
        Ok(vec![])
    }

    fn produce(&mut self, _ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        self.drain()
    }

    fn close(&mut self, exit: bool) -> bool {
        self.set_sensors(false);
        if !exit {
            // Steam holds on to the device, keep it for the next open
            return false;
        }
        if let Err(e) = self.uhid.destroy() {
            log::warn!("Failed to destroy '{NAME}': {e}");
        }
        true
    }
}

impl Consumer for SteamDeck {
    fn consume(&mut self, events: &[Event]) -> Result<(), DeviceError> {
        if !self.uhid.is_created() {
            return Ok(());
        }
        self.update(events);
        let data = self
            .state
            .pack()
            .map_err(|e| DeviceError::Logic(format!("failed to pack input report: {e:?}")))?;
        self.uhid.send_input(&data)?;
        Ok(())
    }
}
