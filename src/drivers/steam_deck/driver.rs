//! Wire level pieces of the emulated Steam Deck controller: identity,
//! feature report replies and decoding of feedback commands.
use packed_struct::{types::SizedInteger, PackedStruct, PackingError};

use crate::input::event::{RumbleEvent, Side};

use super::hid_report::{
    CommandType, Intensity, PackedHapticReport, PackedRumbleReport, PadSide, ReportType,
};

pub const NAME: &str = "Steam Controller";
pub const NAME_EMULATED: &str = "Emulated Steam Controller";
pub const VERSION: u32 = 256;
pub const COUNTRY: u32 = 0;
pub const PACKET_SIZE: usize = 64;
pub const SERIAL: &str = "HHDV1RTU4L5D";

/// Reply to [ReportType::GetAttributesValues]. The values are the ones sent
/// by a real Steam Deck.
pub fn attributes_reply() -> Vec<u8> {
    let mut data = vec![
        0x00,
        ReportType::GetAttributesValues as u8,
        0x2d,
        0x01,
        0x05,
        0x12,
        0x00,
        0x00,
        0x02,
        0x00,
        0x00,
        0x00,
        0x00,
        0x0a,
        0x2b,
        0x12,
        0xa9,
        0x62,
        0x04,
        0xad,
        0xf1,
        0xe4,
        0x65,
        0x09,
        0x2e,
        0x00,
        0x00,
        0x00,
        0x0b,
        0xa0,
        0x0f,
        0x00,
        0x00,
        0x0d,
        0x00,
        0x00,
        0x00,
        0x00,
        0x0c,
        0x00,
        0x00,
        0x00,
        0x00,
        0x0e,
    ];
    data.resize(PACKET_SIZE, 0);
    data
}

/// Reply to [ReportType::GetStringAttribute] with the serial number
pub fn serial_reply(serial: &str) -> Vec<u8> {
    let mut data = vec![0x00, ReportType::GetStringAttribute as u8, 0x14, 0x01];
    data.extend_from_slice(serial.as_bytes());
    data.resize(PACKET_SIZE, 0);
    data
}

/// Reply to [ReportType::GetChipId]
pub fn chip_id_reply(chip_id: &[u8; 15]) -> Vec<u8> {
    let mut data = vec![0x00, ReportType::GetChipId as u8, 0x11, 0x00];
    data.extend_from_slice(chip_id);
    data.resize(PACKET_SIZE, 0);
    data
}

fn side(side: PadSide) -> Side {
    match side {
        PadSide::Left => Side::Left,
        PadSide::Right => Side::Right,
        PadSide::Both => Side::Main,
    }
}

/// Strength of a trackpad haptic command
fn haptic_strength(report: &PackedHapticReport) -> f32 {
    if report.cmd_type == CommandType::Off {
        return 0.0;
    }
    match report.intensity {
        Intensity::Default => 0.2,
        Intensity::Short => 0.2,
        Intensity::Medium => 0.4,
        Intensity::Long => 0.6,
        Intensity::Insane => 1.0,
    }
}

/// Decode a set report command, with the uhid prefix byte removed, into a
/// rumble event. Commands other than rumble and haptics yield nothing.
pub fn decode_feedback(
    command: ReportType,
    data: &[u8],
) -> Result<Option<RumbleEvent>, PackingError> {
    let mut buf = [0u8; PACKET_SIZE];
    let len = data.len().min(PACKET_SIZE);
    buf[..len].copy_from_slice(&data[..len]);

    match command {
        ReportType::TriggerRumbleCommand => {
            let report = PackedRumbleReport::unpack(&buf)?;
            log::trace!("Got rumble report: {report}");
            let strong = report.left_speed.to_primitive() as f32 / u16::MAX as f32;
            let weak = report.right_speed.to_primitive() as f32 / u16::MAX as f32;
            Ok(Some(RumbleEvent::new(strong, weak)))
        }
        ReportType::TriggerHapticCommand => {
            let report = PackedHapticReport::unpack(&buf)?;
            log::trace!("Got haptic report: {report}");
            let value = haptic_strength(&report);
            Ok(Some(RumbleEvent {
                side: side(report.side),
                strong: value,
                weak: value,
            }))
        }
        _ => Ok(None),
    }
}

/// De-normalizes the given value from -1.0 - 1.0 into a real value based on
/// the minimum and maximum axis range.
pub fn denormalize_signed_value(normal_value: f64, min: f64, max: f64) -> i16 {
    let mid = (max + min) / 2.0;
    let normal_value_abs = normal_value.abs();
    if normal_value >= 0.0 {
        let maximum = max - mid;
        let value = normal_value * maximum + mid;
        value as i16
    } else {
        let minimum = min - mid;
        let value = normal_value_abs * minimum + mid;
        value as i16
    }
}

/// De-normalizes the given value from 0.0 - 1.0 into a signed value based
/// on the minimum and maximum axis range.
pub fn denormalize_unsigned_to_signed_value(normal_value: f64, min: f64, max: f64) -> i16 {
    let normal_value = (normal_value * 2.0) - 1.0;
    denormalize_signed_value(normal_value, min, max)
}

/// De-normalizes the given value from 0.0 - 1.0 into a real value based on
/// the maximum axis range.
pub fn denormalize_unsigned_value(normal_value: f64, max: f64) -> u16 {
    (normal_value * max).round() as u16
}

#[cfg(test)]
mod tests {
    use packed_struct::types::Integer;

    use super::*;
    use crate::drivers::steam_deck::hid_report::{STICK_Y_MAX, STICK_Y_MIN, TRIGG_MAX};

    #[test]
    fn replies_are_full_packets() {
        let attrs = attributes_reply();
        assert_eq!(attrs.len(), PACKET_SIZE);
        assert_eq!(&attrs[..4], &[0x00, 0x83, 0x2d, 0x01]);
        assert_eq!(attrs[43], 0x0e);

        let serial = serial_reply(SERIAL);
        assert_eq!(serial.len(), PACKET_SIZE);
        assert_eq!(&serial[4..4 + SERIAL.len()], SERIAL.as_bytes());

        let chip = chip_id_reply(&[7; 15]);
        assert_eq!(&chip[..4], &[0x00, 0xba, 0x11, 0x00]);
        assert_eq!(chip[18], 7);
        assert_eq!(chip[19], 0);
    }

    #[test]
    fn rumble_command() {
        let mut report = PackedRumbleReport::new();
        report.left_speed = Integer::from_primitive(u16::MAX);
        report.right_speed = Integer::from_primitive(0);
        let data = report.pack().unwrap();

        let event = decode_feedback(ReportType::TriggerRumbleCommand, &data)
            .unwrap()
            .unwrap();
        assert_eq!(event.side, Side::Main);
        assert_eq!(event.strong, 1.0);
        assert_eq!(event.weak, 0.0);
    }

    #[test]
    fn haptic_command() {
        let mut report = PackedHapticReport::new();
        report.side = PadSide::Right;
        report.cmd_type = CommandType::Click;
        report.intensity = Intensity::Insane;
        let data = report.pack().unwrap();

        let event = decode_feedback(ReportType::TriggerHapticCommand, &data[..13])
            .unwrap()
            .unwrap();
        assert_eq!(event.side, Side::Right);
        assert_eq!(event.strong, 1.0);

        assert!(decode_feedback(ReportType::SetMode, &data).unwrap().is_none());
    }

    #[test]
    fn denormalize() {
        assert_eq!(denormalize_signed_value(1.0, STICK_Y_MIN, STICK_Y_MAX), -32767);
        assert_eq!(denormalize_signed_value(0.0, STICK_Y_MIN, STICK_Y_MAX), 0);
        assert_eq!(denormalize_unsigned_value(1.0, TRIGG_MAX), 32767);
        assert_eq!(denormalize_unsigned_to_signed_value(0.5, -100.0, 100.0), 0);
    }
}
