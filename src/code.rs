// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TLV type codes understood by the board.
//!
//! Codes 0x21 through 0x2F and 0xFD/0xFE follow the ONIE TlvInfo layout that
//! deployed EEPROMs already use; 0x30 and up are board vendor additions. The
//! store accepts any non-reserved code, known or not.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Reserved type byte; also what an erased EEPROM reads as.
pub const RESERVED_ZERO: u8 = 0x00;
/// Reserved type byte; also what erased NOR flash reads as.
pub const RESERVED_ONES: u8 = 0xFF;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum TlvCode {
    ProductName = 0x21,
    PartNumber = 0x22,
    SerialNumber = 0x23,
    MacBase = 0x24,
    ManufactureDate = 0x25,
    DeviceVersion = 0x26,
    LabelRevision = 0x27,
    PlatformName = 0x28,
    OnieVersion = 0x29,
    MacSize = 0x2A,
    ManufacturerName = 0x2B,
    ManufactureCountry = 0x2C,
    VendorName = 0x2D,
    DiagVersion = 0x2E,
    ServiceTag = 0x2F,
    WifiMacAddress = 0x30,
    BluetoothAddress = 0x31,
    SdkVersion = 0x40,
    DdrCsNum = 0x41,
    DdrType = 0x42,
    DdrDataRate = 0x43,
    DdrTxOdt = 0x44,
    VendorExtension = 0xFD,
    Crc32 = 0xFE,
}

/// How a record's value bytes are to be read.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ValueKind {
    /// ASCII text, not NUL terminated.
    Text,
    /// A MAC-48 address.
    Mac,
    /// A single byte number.
    U8,
    /// A big-endian 16-bit number.
    U16,
    /// Opaque bytes.
    Bytes,
    /// The big-endian CRC-32 of the trailer.
    Checksum,
}

/// Every known code, in the order the board's shell lists them.
pub const ALL: &[TlvCode] = &[
    TlvCode::ProductName,
    TlvCode::PartNumber,
    TlvCode::SerialNumber,
    TlvCode::MacBase,
    TlvCode::ManufactureDate,
    TlvCode::DeviceVersion,
    TlvCode::LabelRevision,
    TlvCode::PlatformName,
    TlvCode::OnieVersion,
    TlvCode::MacSize,
    TlvCode::ManufacturerName,
    TlvCode::ManufactureCountry,
    TlvCode::VendorName,
    TlvCode::DiagVersion,
    TlvCode::ServiceTag,
    TlvCode::WifiMacAddress,
    TlvCode::BluetoothAddress,
    TlvCode::SdkVersion,
    TlvCode::DdrCsNum,
    TlvCode::DdrType,
    TlvCode::DdrDataRate,
    TlvCode::DdrTxOdt,
    TlvCode::VendorExtension,
    TlvCode::Crc32,
];

impl TlvCode {
    /// Looks up a raw type byte.
    pub fn from_byte(code: u8) -> Option<Self> {
        Self::from_u8(code)
    }

    pub fn name(self) -> &'static str {
        match self {
            TlvCode::ProductName => "Product Name",
            TlvCode::PartNumber => "Part Number",
            TlvCode::SerialNumber => "Serial Number",
            TlvCode::MacBase => "Base MAC Address",
            TlvCode::ManufactureDate => "Manufacture Date",
            TlvCode::DeviceVersion => "Device Version",
            TlvCode::LabelRevision => "Label Revision",
            TlvCode::PlatformName => "Platform Name",
            TlvCode::OnieVersion => "ONIE Version",
            TlvCode::MacSize => "MAC Addresses",
            TlvCode::ManufacturerName => "Manufacturer",
            TlvCode::ManufactureCountry => "Country Code",
            TlvCode::VendorName => "Vendor Name",
            TlvCode::DiagVersion => "Diag Version",
            TlvCode::ServiceTag => "Service Tag",
            TlvCode::WifiMacAddress => "Wifi MAC Address",
            TlvCode::BluetoothAddress => "Bluetooth Address",
            TlvCode::SdkVersion => "SDK Version",
            TlvCode::DdrCsNum => "DDR CS Number",
            TlvCode::DdrType => "DDR Type",
            TlvCode::DdrDataRate => "DDR Data Rate",
            TlvCode::DdrTxOdt => "DDR tx odt",
            TlvCode::VendorExtension => "Vendor Extension",
            TlvCode::Crc32 => "CRC-32",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            TlvCode::ProductName
            | TlvCode::PartNumber
            | TlvCode::SerialNumber
            | TlvCode::ManufactureDate
            | TlvCode::LabelRevision
            | TlvCode::PlatformName
            | TlvCode::OnieVersion
            | TlvCode::ManufacturerName
            | TlvCode::ManufactureCountry
            | TlvCode::VendorName
            | TlvCode::DiagVersion
            | TlvCode::ServiceTag
            | TlvCode::DdrType => ValueKind::Text,
            TlvCode::MacBase | TlvCode::WifiMacAddress | TlvCode::BluetoothAddress => {
                ValueKind::Mac
            }
            TlvCode::DeviceVersion
            | TlvCode::SdkVersion
            | TlvCode::DdrCsNum
            | TlvCode::DdrTxOdt => ValueKind::U8,
            TlvCode::MacSize | TlvCode::DdrDataRate => ValueKind::U16,
            TlvCode::VendorExtension => ValueKind::Bytes,
            TlvCode::Crc32 => ValueKind::Checksum,
        }
    }
}

impl From<TlvCode> for u8 {
    fn from(code: TlvCode) -> u8 {
        code as u8
    }
}

/// Display name for a raw type byte, "Unknown" for codes we don't know.
pub fn name_of(code: u8) -> &'static str {
    TlvCode::from_byte(code).map_or("Unknown", TlvCode::name)
}

/// Value kind for a raw type byte; unknown codes are opaque bytes.
pub fn kind_of(code: u8) -> ValueKind {
    TlvCode::from_byte(code).map_or(ValueKind::Bytes, TlvCode::kind)
}

/// Whether `code` may never appear as a record type.
pub fn is_reserved(code: u8) -> bool {
    code == RESERVED_ZERO || code == RESERVED_ONES
}
