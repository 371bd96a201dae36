//! Accelerometer and gyroscope producer for Industrial I/O sensors
use std::{
    collections::HashMap,
    fmt,
    os::fd::RawFd,
    sync::OnceLock,
    time::{Duration, Instant},
};

use industrial_io::{Channel, ChannelType, Context, Device};
use thiserror::Error;

use crate::input::{
    event::{AxisCode, Event},
    DeviceError, Producer,
};

pub const ACCEL_NAMES: [&str; 1] = ["accel_3d"];
pub const GYRO_NAMES: [&str; 1] = ["gyro_3d"];

/// Default sampling period when the sensor does not report a frequency
const DEFAULT_PERIOD: Duration = Duration::from_millis(5);

static CLOCK: OnceLock<Instant> = OnceLock::new();

/// Where a sensor channel ends up and its sign
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuMapping {
    pub channel: &'static str,
    pub axis: AxisCode,
    pub scale: f64,
}

const fn map(channel: &'static str, axis: AxisCode, scale: f64) -> ImuMapping {
    ImuMapping {
        channel,
        axis,
        scale,
    }
}

/// Mapping of HID sensor hub devices
pub const ACCEL_MAPPINGS: [ImuMapping; 3] = [
    map("accel_x", AxisCode::AccelZ, 1.0),
    map("accel_y", AxisCode::AccelX, 1.0),
    map("accel_z", AxisCode::AccelY, 1.0),
];

pub const GYRO_MAPPINGS: [ImuMapping; 3] = [
    map("anglvel_x", AxisCode::GyroZ, 1.0),
    map("anglvel_y", AxisCode::GyroX, 1.0),
    map("anglvel_z", AxisCode::GyroY, 1.0),
];

/// Mapping of Bosch IMUs exposing both sensors on one device
pub const BMI_MAPPINGS: [ImuMapping; 6] = [
    map("accel_x", AxisCode::AccelZ, -1.0),
    map("accel_y", AxisCode::AccelX, 1.0),
    map("accel_z", AxisCode::AccelY, -1.0),
    map("anglvel_x", AxisCode::GyroZ, -1.0),
    map("anglvel_y", AxisCode::GyroX, 1.0),
    map("anglvel_z", AxisCode::GyroY, -1.0),
];

#[derive(Error, Debug, PartialEq)]
pub enum MountMatrixError {
    #[error("mount matrix needs 3 rows, got {0}")]
    Rows(usize),
    #[error("mount matrix row needs 3 values, got {0}")]
    Columns(usize),
    #[error("invalid mount matrix value: {0}")]
    Value(String),
}

/// Orientation of a sensor inside the device, as read from the `mount_matrix`
/// attribute, e.g. "1, 0, 0; 0, 1, 0; 0, 0, 1".
#[derive(Clone, Debug, PartialEq)]
pub struct MountMatrix {
    pub x: (f64, f64, f64),
    pub y: (f64, f64, f64),
    pub z: (f64, f64, f64),
}

impl Default for MountMatrix {
    fn default() -> Self {
        MountMatrix {
            x: (1.0, 0.0, 0.0),
            y: (0.0, 1.0, 0.0),
            z: (0.0, 0.0, 1.0),
        }
    }
}

impl std::str::FromStr for MountMatrix {
    type Err = MountMatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows: Vec<&str> = s.split(';').map(str::trim).collect();
        if rows.len() != 3 {
            return Err(MountMatrixError::Rows(rows.len()));
        }

        let mut parsed = [(0.0, 0.0, 0.0); 3];
        for (row, out) in rows.into_iter().zip(parsed.iter_mut()) {
            let values = row
                .split(',')
                .map(|v| {
                    v.trim()
                        .parse::<f64>()
                        .map_err(|_| MountMatrixError::Value(v.trim().to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let [x, y, z] = values[..] else {
                return Err(MountMatrixError::Columns(values.len()));
            };
            *out = (x, y, z);
        }

        Ok(MountMatrix {
            x: parsed[0],
            y: parsed[1],
            z: parsed[2],
        })
    }
}

impl fmt::Display for MountMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}; {}, {}, {}; {}, {}, {}",
            self.x.0, self.x.1, self.x.2, self.y.0, self.y.1, self.y.2, self.z.0, self.z.1, self.z.2,
        )
    }
}

impl MountMatrix {
    /// Rotate a sample into the frame of the device
    pub fn rotate(&self, (x, y, z): (f64, f64, f64)) -> (f64, f64, f64) {
        (
            self.x.0 * x + self.x.1 * y + self.x.2 * z,
            self.y.0 * x + self.y.1 * y + self.y.2 * z,
            self.z.0 * x + self.z.1 * y + self.z.2 * z,
        )
    }
}

/// The Legion Go sensors overflow to about -124 in both directions
pub fn is_legion_overflow(raw: i64) -> bool {
    raw == -124 || raw.div_euclid(1000) == -125
}

/// A channel with its conversion to real units
struct SensorChannel {
    id: String,
    channel: Channel,
    scale: f64,
    offset: i64,
}

impl SensorChannel {
    /// (raw + offset) * scale
    fn read(&self) -> Result<(i64, f64), DeviceError> {
        let raw = self
            .channel
            .attr_read_int("raw")
            .map_err(|e| DeviceError::Io(std::io::Error::other(e.to_string())))?;
        Ok((raw, (raw + self.offset) as f64 * self.scale))
    }
}

/// Three axes of one sensor type
struct Sensor {
    channels: [Option<SensorChannel>; 3],
    matrix: MountMatrix,
}

impl Sensor {
    fn find(device: &Device, ty: ChannelType, matrix: Option<MountMatrix>) -> Option<Self> {
        let mut channels: [Option<SensorChannel>; 3] = [None, None, None];
        for channel in device.channels().filter(|c| c.channel_type() == ty) {
            let Some(id) = channel.id() else {
                continue;
            };
            let idx = match id.chars().last() {
                Some('x') => 0,
                Some('y') => 1,
                Some('z') => 2,
                _ => continue,
            };
            let scale = channel.attr_read_float("scale").unwrap_or_else(|e| {
                log::warn!("Unable to read scale for channel {id}: {e}");
                1.0
            });
            let offset = channel.attr_read_int("offset").unwrap_or(0);
            log::debug!("Found channel {id} with scale {scale} and offset {offset}");
            channels[idx] = Some(SensorChannel {
                id,
                channel,
                scale,
                offset,
            });
        }
        if channels.iter().all(Option::is_none) {
            return None;
        }

        let matrix = matrix.unwrap_or_else(|| read_mount_matrix(device, ty));
        Some(Self { channels, matrix })
    }
}

fn read_mount_matrix(device: &Device, ty: ChannelType) -> MountMatrix {
    let prefix = match ty {
        ChannelType::Accel => "in_accel_mount_matrix",
        _ => "in_anglvel_mount_matrix",
    };
    let value = device
        .attr_read_str(prefix)
        .or_else(|_| device.attr_read_str("mount_matrix"));
    match value.map(|v| v.parse::<MountMatrix>()) {
        Ok(Ok(matrix)) => {
            log::debug!("Found mount matrix: {matrix}");
            matrix
        }
        Ok(Err(e)) => {
            log::warn!("Ignoring mount matrix: {e}");
            MountMatrix::default()
        }
        Err(_) => MountMatrix::default(),
    }
}

/// Polls the raw channels of an IIO device. Sensors have no descriptor to
/// wait on, so the loop polls this producer every iteration and it samples
/// at most once per period.
pub struct IioSource {
    names: Vec<String>,
    mappings: Vec<ImuMapping>,
    matrix: Option<MountMatrix>,
    legion_fix: bool,
    required: bool,
    period: Duration,
    sensors: Vec<Sensor>,
    last_sample: Option<Instant>,
    prev: HashMap<AxisCode, f64>,
}

impl IioSource {
    /// `names` are substrings of the IIO device name
    pub fn new(names: &[&str], mappings: &[ImuMapping]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            mappings: mappings.to_vec(),
            matrix: None,
            legion_fix: false,
            required: false,
            period: DEFAULT_PERIOD,
            sensors: vec![],
            last_sample: None,
            prev: HashMap::new(),
        }
    }

    pub fn accel() -> Self {
        Self::new(&ACCEL_NAMES, &ACCEL_MAPPINGS)
    }

    pub fn gyro() -> Self {
        Self::new(&GYRO_NAMES, &GYRO_MAPPINGS)
    }

    pub fn with_matrix(mut self, matrix: MountMatrix) -> Self {
        self.matrix = Some(matrix);
        self
    }

    pub fn with_legion_fix(mut self) -> Self {
        self.legion_fix = true;
        self
    }

    pub fn with_frequency(mut self, hz: f64) -> Self {
        if hz > 0.0 {
            self.period = Duration::from_secs_f64(1.0 / hz);
        }
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn find_device(&self, ctx: &Context) -> Option<Device> {
        ctx.devices().find(|d| {
            d.name()
                .map(|name| self.names.iter().any(|n| name.contains(n.as_str())))
                .unwrap_or(false)
        })
    }

    /// Convert a rotated sample into mapped events
    fn map_sample(&mut self, prefix: &str, values: [Option<(i64, f64)>; 3], out: &mut Vec<Event>) {
        for (idx, value) in values.into_iter().enumerate() {
            let Some((raw, value)) = value else {
                continue;
            };
            let name = format!("{prefix}_{}", ['x', 'y', 'z'][idx]);
            let Some(mapping) = self.mappings.iter().find(|m| m.channel == name) else {
                continue;
            };
            let value = value * mapping.scale;
            if self.prev.insert(mapping.axis, value) == Some(value) {
                continue;
            }
            if self.legion_fix && is_legion_overflow(raw) {
                log::trace!("Skipping overflowing sample of {name}: {raw}");
                continue;
            }
            out.push(Event::axis(mapping.axis, value as f32));
        }
    }
}

impl Producer for IioSource {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        if !self.sensors.is_empty() {
            return Ok(vec![]);
        }

        let ctx = Context::new().map_err(|e| DeviceError::NotReady(e.to_string()))?;
        let Some(device) = self.find_device(&ctx) else {
            if self.required {
                return Err(DeviceError::NotReady(format!(
                    "IIO device not found: {:?}",
                    self.names
                )));
            }
            log::warn!("IIO device not found: {:?}", self.names);
            return Ok(vec![]);
        };
        log::info!(
            "Found IIO device '{}'",
            device.name().unwrap_or_default()
        );

        for ty in [ChannelType::Accel, ChannelType::AnglVel] {
            if let Some(sensor) = Sensor::find(&device, ty, self.matrix.clone()) {
                self.sensors.push(sensor);
            }
        }
        self.prev.clear();
        self.last_sample = None;
        Ok(vec![])
    }

    fn produce(&mut self, _ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        if self.sensors.is_empty() {
            return Ok(vec![]);
        }
        let now = Instant::now();
        if let Some(last) = self.last_sample {
            if now.saturating_duration_since(last) < self.period {
                return Ok(vec![]);
            }
        }
        self.last_sample = Some(now);

        let mut samples = vec![];
        for sensor in self.sensors.iter() {
            let mut values = [None; 3];
            let mut prefix = "accel";
            for (idx, channel) in sensor.channels.iter().enumerate() {
                if let Some(channel) = channel {
                    if channel.id.starts_with("anglvel") {
                        prefix = "anglvel";
                    }
                    values[idx] = Some(channel.read()?);
                }
            }
            let rotated = sensor.matrix.rotate((
                values[0].map(|v| v.1).unwrap_or_default(),
                values[1].map(|v| v.1).unwrap_or_default(),
                values[2].map(|v| v.1).unwrap_or_default(),
            ));
            let rotated = [rotated.0, rotated.1, rotated.2];
            for (value, rot) in values.iter_mut().zip(rotated) {
                if let Some(v) = value.as_mut() {
                    v.1 = rot;
                }
            }
            samples.push((prefix, values));
        }

        let mut out = vec![];
        for (prefix, values) in samples {
            self.map_sample(prefix, values, &mut out);
        }
        if !out.is_empty() {
            let start = *CLOCK.get_or_init(Instant::now);
            let ts = now.saturating_duration_since(start).as_nanos() as f32;
            out.push(Event::axis(AxisCode::ImuTs, ts));
        }
        Ok(out)
    }

    fn close(&mut self, _exit: bool) -> bool {
        self.sensors.clear();
        true
    }
}
