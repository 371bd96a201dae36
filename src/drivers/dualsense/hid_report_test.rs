use std::error::Error;

use packed_struct::{PackedStruct, PackedStructSlice};

use crate::drivers::dualsense::{
    driver::{INPUT_REPORT_BT_OFS, INPUT_REPORT_USB_OFS, PREFILL_TIMESTAMP},
    hid_report::{BluetoothInputReport, Direction, InputState, PackedInputDataReport, TouchPoint},
};

#[test]
fn test_ds_touch() -> Result<(), Box<dyn Error>> {
    let mut point = TouchPoint::default();
    point.set_y(1068);
    point.set_x(1919);
    assert_eq!(point.y(), 1068);
    assert_eq!(point.x(), 1919);
    assert!(!point.is_touching());
    assert_eq!(point.pack()?.to_vec(), vec![0x80, 0x7F, 0xC7, 0x42]);

    let mut state = InputState::default();
    assert!(!state.has_touches());
    state.touch_1.context = 0x01;
    assert!(state.has_touches());

    Ok(())
}

fn check_template(report: &[u8], ofs: usize) {
    assert_eq!(&report[ofs..ofs + 4], &[0x80; 4]);
    // Neutral dpad, no buttons
    assert_eq!(report[ofs + 7], 0x08);
    assert_eq!(report[ofs + 8], 0x00);
    // Both touch points lifted
    assert_eq!(report[ofs + 32], 0x80);
    assert_eq!(report[ofs + 36], 0x80);
    // Discharging at 85%
    assert_eq!(report[ofs + 52], 0x08);
    let ts = u32::from_le_bytes([
        report[ofs + 27],
        report[ofs + 28],
        report[ofs + 29],
        report[ofs + 30],
    ]);
    assert_eq!(ts, PREFILL_TIMESTAMP);
}

#[test]
fn test_ds_template() -> Result<(), Box<dyn Error + Send + Sync>> {
    let usb = PackedInputDataReport::template(false).pack_to_vec()?;
    assert_eq!(usb.len(), 64);
    assert_eq!(usb[0], 0x01);
    check_template(&usb, INPUT_REPORT_USB_OFS);

    let bt = PackedInputDataReport::template(true).pack_to_vec()?;
    assert_eq!(bt.len(), 78);
    assert_eq!(&bt[..2], &[0x31, 0x01]);
    check_template(&bt, INPUT_REPORT_BT_OFS);

    let parsed = BluetoothInputReport::unpack_from_slice(&bt)?;
    assert_eq!(parsed.state.dpad, Direction::None);
    assert_eq!(&parsed.state, PackedInputDataReport::template(true).state());

    Ok(())
}
