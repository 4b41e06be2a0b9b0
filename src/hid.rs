//! USB/HID boundary data: the report descriptor and device-identity
//! constants a board integration needs to enumerate this token, without
//! pulling in a USB stack dependency.

/// The canonical FIDO U2FHID HID report descriptor: one Application
/// collection on usage page `0xF1D0`, usage `0x01`, with a 64-byte input
/// report and a 64-byte output report, both raw data arrays.
#[rustfmt::skip]
pub const REPORT_DESCRIPTOR: [u8; 34] = [
    0x06, 0xd0, 0xf1, // USAGE_PAGE (FIDO Alliance Page)
    0x09, 0x01,       // USAGE (U2FHID)
    0xa1, 0x01,       // COLLECTION (Application)
    0x09, 0x20,       //   USAGE (Input Report Data)
    0x15, 0x00,       //   LOGICAL_MINIMUM (0)
    0x26, 0xff, 0x00, //   LOGICAL_MAXIMUM (255)
    0x75, 0x08,       //   REPORT_SIZE (8)
    0x95, 0x40,       //   REPORT_COUNT (64)
    0x81, 0x02,       //   INPUT (Data,Var,Abs)
    0x09, 0x21,       //   USAGE (Output Report Data)
    0x15, 0x00,       //   LOGICAL_MINIMUM (0)
    0x26, 0xff, 0x00, //   LOGICAL_MAXIMUM (255)
    0x75, 0x08,       //   REPORT_SIZE (8)
    0x95, 0x40,       //   REPORT_COUNT (64)
    0x91, 0x02,       //   OUTPUT (Data,Var,Abs)
    0xc0,             // END_COLLECTION
];

/// Placeholder vendor/product id pair from the pid.codes open-source
/// allocation. Board integrations that ship hardware must request and
/// substitute their own.
pub const VENDOR_ID: u16 = 0x1209;
pub const PRODUCT_ID: u16 = 0x0001;

pub const DEVICE_RELEASE: u16 = 0x0001;

pub const INTERFACE_CLASS: u8 = 0x03; // HID
pub const INTERFACE_SUBCLASS: u8 = 0x00;
pub const INTERFACE_PROTOCOL: u8 = 0x00;

pub const ENDPOINT_OUT: u8 = 0x01;
pub const ENDPOINT_IN: u8 = 0x81;
pub const POLL_INTERVAL_MS: u8 = 5;
pub const MAX_PACKET_SIZE: u8 = 63;
