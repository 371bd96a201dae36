/// Report descriptor of the Steam Deck controller interface. A single
/// vendor collection with a 64 byte input report and a 64 byte feature
/// report carrying the Steam command protocol.
pub const CONTROLLER_DESCRIPTOR: [u8; 38] = [
    0x06, 0xff, 0xff, // Usage Page (Vendor Defined Page 0xFFFF)  0
    0x09, 0x01, // Usage (Vendor Usage 0x01)                       3
    0xa1, 0x01, // Collection (Application)                        5
    0x09, 0x02, //  Usage (Vendor Usage 0x02)                      7
    0x09, 0x03, //  Usage (Vendor Usage 0x03)                      9
    0x15, 0x00, //  Logical Minimum (0)                            11
    0x26, 0xff, 0x00, //  Logical Maximum (255)                    13
    0x75, 0x08, //  Report Size (8)                                16
    0x95, 0x40, //  Report Count (64)                              18
    0x81, 0x02, //  Input (Data,Var,Abs)                           20
    0x09, 0x06, //  Usage (Vendor Usage 0x06)                      22
    0x09, 0x07, //  Usage (Vendor Usage 0x07)                      24
    0x15, 0x00, //  Logical Minimum (0)                            26
    0x26, 0xff, 0x00, //  Logical Maximum (255)                    28
    0x75, 0x08, //  Report Size (8)                                31
    0x95, 0x40, //  Report Count (64)                              33
    0xb1, 0x02, //  Feature (Data,Var,Abs)                         35
    0xc0, // End Collection                                        37
];
