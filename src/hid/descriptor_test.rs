use proptest::prelude::*;

use crate::drivers::dualsense::report_descriptor::{
    DS_BT_DESCRIPTOR, DS_EDGE_BT_DESCRIPTOR, DS_EDGE_USB_DESCRIPTOR, DS_USB_DESCRIPTOR,
};
use crate::hid::{
    descriptor::{DumpFormat, ReportDescriptor},
    item::ItemTag,
    ParseError,
};

#[test]
fn test_dualsense_edge_usb_reports() {
    let rdesc = ReportDescriptor::from_bytes(&DS_EDGE_USB_DESCRIPTOR).unwrap();
    assert_eq!(rdesc.size(), 389);
    assert_eq!(rdesc.bytes(), DS_EDGE_USB_DESCRIPTOR.to_vec());

    let input = rdesc.input_reports.get(&0x01).unwrap();
    assert_eq!(input.size(), 64);
    assert_eq!(input.application_name(), "Game Pad");
    assert_eq!(rdesc.output_reports.get(&0x02).unwrap().size(), 64);
    assert_eq!(rdesc.feature_reports.get(&0x05).unwrap().size(), 41);
    assert_eq!(rdesc.feature_reports.get(&0x09).unwrap().size(), 20);
    assert_eq!(rdesc.feature_reports.get(&0x20).unwrap().size(), 64);
    assert!(!rdesc.win8);
}

#[test]
fn test_dualsense_bluetooth_reports() {
    let rdesc = ReportDescriptor::from_bytes(&DS_BT_DESCRIPTOR).unwrap();
    assert_eq!(rdesc.input_reports.get(&0x31).unwrap().size(), 78);
    assert_eq!(rdesc.input_reports.get(&0x01).unwrap().size(), 10);
    assert_eq!(rdesc.output_reports.get(&0x31).unwrap().size(), 78);

    let rdesc = ReportDescriptor::from_bytes(&DS_USB_DESCRIPTOR).unwrap();
    assert_eq!(rdesc.output_reports.get(&0x02).unwrap().size(), 48);
}

#[test]
fn test_trailing_zero_is_kept() {
    let rdesc = ReportDescriptor::from_bytes(&DS_EDGE_BT_DESCRIPTOR).unwrap();
    assert_eq!(rdesc.size(), 429);
    assert_eq!(rdesc.bytes(), DS_EDGE_BT_DESCRIPTOR.to_vec());
}

#[test]
fn test_human_round_trip() {
    for data in [
        &DS_EDGE_USB_DESCRIPTOR[..],
        &DS_USB_DESCRIPTOR[..],
        &DS_EDGE_BT_DESCRIPTOR[..],
    ] {
        let rdesc = ReportDescriptor::from_bytes(data).unwrap();
        let human = rdesc.dump(DumpFormat::Human);
        let parsed = ReportDescriptor::from_human_descr(&human).unwrap();
        assert_eq!(parsed.bytes(), data.to_vec());
        assert_eq!(parsed.dump(DumpFormat::Human), human);
    }
}

#[test]
fn test_trailing_zeros_in_dumps() {
    let rdesc = ReportDescriptor::from_bytes(&DS_EDGE_BT_DESCRIPTOR).unwrap();
    let human = rdesc.dump(DumpFormat::Human);
    assert!(human.ends_with("End Collection\nTrailing Zeros (1)\n"));
    assert_eq!(
        ReportDescriptor::from_human_descr(&human).unwrap().size(),
        429
    );

    let carray = rdesc.dump(DumpFormat::CArray);
    let last = carray.lines().last().unwrap();
    assert!(last.starts_with("0x00,"));
    assert!(last.ends_with("// 1ac:  Trailing Zeros (1)"));

    assert!(ReportDescriptor::from_human_descr("Trailing Zeros (x)").is_err());
}

#[test]
fn test_human_dump() {
    let data = [
        0x05, 0x01, // Usage Page (Generic Desktop)
        0x09, 0x05, // Usage (Game Pad)
        0xA1, 0x01, // Collection (Application)
        0x09, 0x30, // Usage (X)
        0x15, 0x00, // Logical Minimum (0)
        0x26, 0xFF, 0x00, // Logical Maximum (255)
        0x75, 0x08, // Report Size (8)
        0x95, 0x01, // Report Count (1)
        0x81, 0x02, // Input (Data,Var,Abs)
        0xC0, // End Collection
    ];
    let rdesc = ReportDescriptor::from_bytes(&data).unwrap();
    let expected = "Usage Page (Generic Desktop)\n\
                    Usage (Game Pad)\n\
                    Collection (Application)\n \
                    Usage (X)\n \
                    Logical Minimum (0)\n \
                    Logical Maximum (255)\n \
                    Report Size (8)\n \
                    Report Count (1)\n \
                    Input (Data,Var,Abs)\n\
                    End Collection\n";
    assert_eq!(rdesc.dump(DumpFormat::Human), expected);

    let report = rdesc.get(0, 1).unwrap();
    assert_eq!(report.fields[0].usage, 0x0001_0030);
    assert_eq!(report.decode(&[0x7F]), vec![(0x0001_0030, vec![0x7F])]);

    let carray = rdesc.dump(DumpFormat::CArray);
    let first = carray.lines().next().unwrap();
    assert!(first.starts_with("0x05, 0x01,"));
    assert!(first.ends_with("// 000:  Usage Page (Generic Desktop)"));

    let kernel = rdesc.dump(DumpFormat::Kernel);
    let first = kernel.lines().next().unwrap();
    assert!(first.starts_with("\t0x05, 0x01,"));
    assert!(first.contains("/* Usage Page (Generic Desktop)"));
    assert!(first.ends_with("*/"));
}

#[test]
fn test_get_report() {
    let rdesc = ReportDescriptor::from_bytes(&DS_EDGE_USB_DESCRIPTOR).unwrap();
    assert!(rdesc.get(0x01, 64).is_some());
    assert!(rdesc.get(0x01, 128).is_some());
    assert!(rdesc.get(0x01, 63).is_none());
    // Numbered descriptors have no unnumbered fallback
    assert!(rdesc.get(0x42, 64).is_none());
    assert!(rdesc.get_report_from_application("Game Pad").is_some());
    assert!(rdesc.get_report_from_application("Keyboard").is_none());

    // Unnumbered reports answer for every id
    let rdesc = ReportDescriptor::from_bytes(&[0x75, 0x08, 0x95, 0x02, 0x81, 0x02]).unwrap();
    assert_eq!(rdesc.get(0x07, 2).unwrap().report_id, 0);
}

#[test]
fn test_usages_before_page() {
    // Usage (X) is declared before the page it belongs to
    let data = [
        0x09, 0x30, 0x05, 0x01, 0x75, 0x08, 0x95, 0x01, 0x25, 0x7F, 0x81, 0x02,
    ];
    let rdesc = ReportDescriptor::from_bytes(&data).unwrap();
    let report = rdesc.input_reports.get(&0).unwrap();
    assert_eq!(report.fields[0].usage, 0x0001_0030);
}

#[test]
fn test_push_pop() {
    let data = [0x05, 0x01, 0xA4, 0x05, 0x09, 0xB4, 0x09, 0x30];
    let rdesc = ReportDescriptor::from_bytes(&data).unwrap();
    let last = rdesc.items().last().unwrap();
    assert_eq!(last.usage_page, 0x01);

    let human = rdesc.dump(DumpFormat::Human);
    assert!(human.ends_with("Usage (X)\n"));
    let parsed = ReportDescriptor::from_human_descr(&human).unwrap();
    assert_eq!(parsed.bytes(), data.to_vec());

    assert_eq!(
        ReportDescriptor::from_bytes(&[0x05, 0x01, 0xB4]).unwrap_err(),
        ParseError::StackUnderflow { offset: 2 }
    );
}

#[test]
fn test_win8_blob() {
    let data = [
        0x06, 0x00, 0xFF, // Usage Page (Vendor Defined Page 0xFF00)
        0x85, 0x44, // Report ID (68)
        0x09, 0xC5, // Usage (Vendor Usage 0x00C5)
        0x75, 0x08, // Report Size (8)
        0x96, 0x00, 0x01, // Report Count (256)
        0xB1, 0x02, // Feature (Data,Var,Abs)
    ];
    let rdesc = ReportDescriptor::from_bytes(&data).unwrap();
    assert!(rdesc.win8);
    assert_eq!(rdesc.feature_reports.get(&0x44).unwrap().size(), 257);
}

#[test]
fn test_hex_string() {
    let rdesc = ReportDescriptor::from_hex_string("4 05 01 09 05").unwrap();
    assert_eq!(rdesc.bytes(), vec![0x05, 0x01, 0x09, 0x05]);
    assert!(ReportDescriptor::from_hex_string("2 zz 01").is_err());
}

const STREAM_TAGS: &[ItemTag] = &[
    ItemTag::Input,
    ItemTag::Output,
    ItemTag::Feature,
    ItemTag::Collection,
    ItemTag::EndCollection,
    ItemTag::UsagePage,
    ItemTag::LogicalMinimum,
    ItemTag::LogicalMaximum,
    ItemTag::PhysicalMinimum,
    ItemTag::PhysicalMaximum,
    ItemTag::UnitExponent,
    ItemTag::Unit,
    ItemTag::ReportSize,
    ItemTag::ReportId,
    ItemTag::Usage,
    ItemTag::DesignatorIndex,
    ItemTag::StringIndex,
];

fn item_bytes() -> impl Strategy<Value = Vec<u8>> {
    let generic = (
        0..STREAM_TAGS.len(),
        prop_oneof![Just(0usize), Just(1), Just(2), Just(4)],
        any::<[u8; 4]>(),
    )
        .prop_map(|(tag, len, payload)| {
            let size_bits = if len == 4 { 3 } else { len as u8 };
            let mut bytes = vec![STREAM_TAGS[tag].code() | size_bits];
            bytes.extend_from_slice(&payload[..len]);
            bytes
        });
    // Counts stay small so that variable fields do not explode
    let count = (0u8..16).prop_map(|count| vec![0x95, count]);
    prop_oneof![4 => generic, 1 => count]
}

proptest! {
    #[test]
    fn test_item_streams_round_trip(items in prop::collection::vec(item_bytes(), 0..48)) {
        let data: Vec<u8> = items.concat();
        let rdesc = ReportDescriptor::from_bytes(&data).unwrap();
        prop_assert_eq!(rdesc.bytes(), data.clone());

        let human = rdesc.dump(DumpFormat::Human);
        let parsed = ReportDescriptor::from_human_descr(&human).unwrap();
        prop_assert_eq!(parsed.bytes(), data);
    }

    #[test]
    fn test_padded_streams_round_trip(
        items in prop::collection::vec(item_bytes(), 0..48),
        zeros in 0usize..=3,
    ) {
        let mut data: Vec<u8> = items.concat();
        data.extend(std::iter::repeat(0).take(zeros));
        let rdesc = ReportDescriptor::from_bytes(&data).unwrap();
        prop_assert_eq!(rdesc.size(), data.len());

        let human = rdesc.dump(DumpFormat::Human);
        let parsed = ReportDescriptor::from_human_descr(&human).unwrap();
        prop_assert_eq!(parsed.bytes(), data);
    }
}
