//! Layout of the vendor report of the Legion Go controllers and the
//! commands accepted on the same interface.
use crate::input::{
    event::{AxisCode, ButtonCode, ConfigCode},
    mapping::{AxisMap, ButtonMap, ConfigMap, NumType, ReportMap},
};

use super::REPORT_ID;

/// Scale of the accelerometer, in m/s² per count
pub const ACCEL_SCALE: f64 = 0.00212;
/// Scale of the gyroscope, in rad/s per count
pub const GYRO_SCALE: f64 = 0.001065;

const fn bit(byte: usize, bit: usize) -> ButtonMap {
    ButtonMap::new((byte << 3) + bit)
}

pub const BUTTONS: [(ButtonCode, ButtonMap); 24] = [
    (ButtonCode::Mode, bit(18, 0)),
    (ButtonCode::Share, bit(18, 1)),
    (ButtonCode::Ls, bit(18, 2)),
    (ButtonCode::Rs, bit(18, 3)),
    (ButtonCode::DpadUp, bit(18, 4)),
    (ButtonCode::DpadDown, bit(18, 5)),
    (ButtonCode::DpadLeft, bit(18, 6)),
    (ButtonCode::DpadRight, bit(18, 7)),
    (ButtonCode::A, bit(19, 0)),
    (ButtonCode::B, bit(19, 1)),
    (ButtonCode::X, bit(19, 2)),
    (ButtonCode::Y, bit(19, 3)),
    (ButtonCode::Lb, bit(19, 4)),
    (ButtonCode::Lt, bit(19, 5)),
    (ButtonCode::Rb, bit(19, 6)),
    (ButtonCode::Rt, bit(19, 7)),
    (ButtonCode::ExtraL1, bit(20, 0)),
    (ButtonCode::ExtraL2, bit(20, 1)),
    (ButtonCode::ExtraR1, bit(20, 2)),
    (ButtonCode::ExtraR3, bit(20, 4)),
    (ButtonCode::ExtraR2, bit(20, 5)),
    (ButtonCode::Select, bit(20, 6)),
    (ButtonCode::Start, bit(20, 7)),
    (ButtonCode::BtnMiddle, bit(21, 0)),
];

/// Buttons the xinput evdev node does not report
pub const BUTTONS_ESSENTIAL: [ButtonCode; 7] = [
    ButtonCode::Mode,
    ButtonCode::Share,
    ButtonCode::ExtraL1,
    ButtonCode::ExtraL2,
    ButtonCode::ExtraR1,
    ButtonCode::ExtraR2,
    ButtonCode::ExtraR3,
];

const fn imu(byte: usize, scale: f64) -> AxisMap {
    AxisMap::new(byte << 3, NumType::I16)
        .big_endian()
        .with_scale(scale)
}

pub const AXES: [(AxisCode, AxisMap); 20] = [
    (AxisCode::LsX, AxisMap::new(14 << 3, NumType::M8)),
    (AxisCode::LsY, AxisMap::new(15 << 3, NumType::M8)),
    (AxisCode::RsX, AxisMap::new(16 << 3, NumType::M8)),
    (AxisCode::RsY, AxisMap::new(17 << 3, NumType::M8)),
    (AxisCode::Rt, AxisMap::new(22 << 3, NumType::U8)),
    (AxisCode::Lt, AxisMap::new(23 << 3, NumType::U8)),
    // Left controller
    (
        AxisCode::LeftImuTs,
        AxisMap::new(34 << 3, NumType::U8).with_scale(1.0),
    ),
    (AxisCode::LeftAccelX, imu(35, -ACCEL_SCALE)),
    (AxisCode::LeftAccelZ, imu(37, -ACCEL_SCALE)),
    (AxisCode::LeftAccelY, imu(39, -ACCEL_SCALE)),
    (AxisCode::LeftGyroX, imu(41, -GYRO_SCALE)),
    (AxisCode::LeftGyroZ, imu(43, -GYRO_SCALE)),
    (AxisCode::LeftGyroY, imu(45, -GYRO_SCALE)),
    // Right controller
    (
        AxisCode::RightImuTs,
        AxisMap::new(47 << 3, NumType::U8).with_scale(1.0),
    ),
    (AxisCode::RightAccelZ, imu(48, ACCEL_SCALE)),
    (AxisCode::RightAccelX, imu(50, -ACCEL_SCALE)),
    (AxisCode::RightAccelY, imu(52, -ACCEL_SCALE)),
    (AxisCode::RightGyroZ, imu(54, GYRO_SCALE)),
    (AxisCode::RightGyroX, imu(56, -GYRO_SCALE)),
    (AxisCode::RightGyroY, imu(58, -GYRO_SCALE)),
];

pub const CONFIGS: [(ConfigCode, ConfigMap); 6] = [
    (
        ConfigCode::BatteryLeft,
        ConfigMap::num(5 << 3, NumType::U8)
            .with_scale(1.0)
            .with_bounds(0.0, 100.0),
    ),
    (
        ConfigCode::BatteryRight,
        ConfigMap::num(7 << 3, NumType::U8)
            .with_scale(1.0)
            .with_bounds(0.0, 100.0),
    ),
    (ConfigCode::IsConnectedLeft, ConfigMap::bit((10 << 3) + 7)),
    (ConfigCode::IsConnectedRight, ConfigMap::bit((11 << 3) + 7)),
    (
        ConfigCode::IsAttachedLeft,
        ConfigMap::bit((12 << 3) + 7).flipped(),
    ),
    (
        ConfigCode::IsAttachedRight,
        ConfigMap::bit((13 << 3) + 7).flipped(),
    ),
];

/// Maps of the vendor report
pub const REPORT: ReportMap = ReportMap {
    report_id: Some(REPORT_ID),
    buttons: &BUTTONS,
    axes: &AXES,
    configs: &CONFIGS,
};

/// One half of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    Left = 0x03,
    Right = 0x04,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RgbMode {
    Solid = 0x01,
    Pulse = 0x02,
    Dynamic = 0x03,
    Spiral = 0x04,
}

/// Profile slot used for the lighting settings
pub const RGB_PROFILE: u8 = 0x03;

pub fn rgb_set_profile(
    controller: Controller,
    profile: u8,
    mode: RgbMode,
    color: (u8, u8, u8),
    brightness: f32,
    speed: f32,
) -> [u8; 13] {
    let brightness = ((64.0 * brightness) as i32).clamp(0, 63) as u8;
    let period = ((64.0 * (1.0 - speed)) as i32).clamp(0, 63) as u8;
    [
        0x05,
        0x0c,
        0x72,
        0x01,
        controller as u8,
        mode as u8,
        color.0,
        color.1,
        color.2,
        brightness,
        period,
        profile,
        0x01,
    ]
}

pub fn rgb_load_profile(controller: Controller, profile: u8) -> [u8; 7] {
    [0x05, 0x06, 0x73, 0x02, controller as u8, profile, 0x01]
}

pub fn rgb_enable(controller: Controller, enable: bool) -> [u8; 7] {
    [0x05, 0x06, 0x70, 0x02, controller as u8, enable as u8, 0x01]
}

/// Enable the gyro of a controller and switch it to high quality reports
pub fn enable_gyro(controller: Controller) -> [[u8; 7]; 2] {
    [
        [0x05, 0x06, 0x6a, 0x02, controller as u8, 0x01, 0x01],
        [0x05, 0x06, 0x6a, 0x07, controller as u8, 0x02, 0x01],
    ]
}

/// Switch a controller back to low quality gyro reports
pub fn disable_gyro(controller: Controller) -> [u8; 7] {
    [0x05, 0x06, 0x6a, 0x07, controller as u8, 0x01, 0x01]
}

/// Firmware side swap of the legion and start buttons
pub fn legion_swap(enabled: bool) -> [u8; 7] {
    [
        0x05,
        0x06,
        0x69,
        0x04,
        0x01,
        if enabled { 0x02 } else { 0x01 },
        0x01,
    ]
}

/// Factory reset the receiver, dongle and both controllers
pub fn factory_reset() -> [[u8; 7]; 4] {
    [
        [0x04, 0x05, 0x05, 0x01, 0x01, 0x01, 0x01],
        [0x04, 0x05, 0x05, 0x01, 0x01, 0x02, 0x01],
        [0x04, 0x05, 0x05, 0x01, 0x01, 0x03, 0x01],
        [0x04, 0x05, 0x05, 0x01, 0x01, 0x04, 0x01],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{
        event::Scalar,
        mapping::{decode_axis, decode_config, get_button},
    };

    fn report() -> [u8; 64] {
        let mut report = [0u8; 64];
        report[0] = REPORT_ID;
        report[5] = 85;
        report[7] = 120;
        report[10] = 0x01;
        report[12] = 0x01;
        report[14] = 0xff;
        report[18] = 0b1000_0000;
        // 0x01f4 big endian
        report[41] = 0x01;
        report[42] = 0xf4;
        report
    }

    fn axis(code: AxisCode) -> AxisMap {
        AXES.iter().find(|(c, _)| *c == code).unwrap().1
    }

    fn config(code: ConfigCode) -> ConfigMap {
        CONFIGS.iter().find(|(c, _)| *c == code).unwrap().1
    }

    #[test]
    fn decodes_vendor_report() {
        let report = report();
        assert!(REPORT.matches(&report));
        assert!(get_button(&report, &BUTTONS[0].1));
        assert!(!get_button(&report, &BUTTONS[1].1));

        let ls_x = decode_axis(&report, &axis(AxisCode::LsX));
        assert!((ls_x - 127.0 / 128.0).abs() < 1e-9);

        let gyro = decode_axis(&report, &axis(AxisCode::LeftGyroX));
        assert!((gyro + 500.0 * GYRO_SCALE).abs() < 1e-9);

        assert_eq!(
            decode_config(&report, &config(ConfigCode::BatteryLeft)),
            Scalar::Float(85.0)
        );
        assert_eq!(
            decode_config(&report, &config(ConfigCode::BatteryRight)),
            Scalar::Float(100.0)
        );
        assert_eq!(
            decode_config(&report, &config(ConfigCode::IsConnectedLeft)),
            Scalar::Bool(true)
        );
        // Attached bits are inverted
        assert_eq!(
            decode_config(&report, &config(ConfigCode::IsAttachedLeft)),
            Scalar::Bool(false)
        );
        assert_eq!(
            decode_config(&report, &config(ConfigCode::IsAttachedRight)),
            Scalar::Bool(true)
        );
    }

    #[test]
    fn commands() {
        let cmd = rgb_set_profile(
            Controller::Left,
            RGB_PROFILE,
            RgbMode::Solid,
            (1, 2, 3),
            1.0,
            1.0,
        );
        assert_eq!(
            cmd,
            [0x05, 0x0c, 0x72, 0x01, 0x03, 0x01, 1, 2, 3, 63, 0, 0x03, 0x01]
        );
        assert_eq!(rgb_enable(Controller::Right, true)[4..6], [0x04, 0x01]);
        assert_eq!(legion_swap(true)[5], 0x02);
        assert_eq!(enable_gyro(Controller::Left)[1][5], 0x02);
        assert_eq!(disable_gyro(Controller::Right)[4..6], [0x04, 0x01]);
    }
}
