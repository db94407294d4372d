// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversions between record values and their textual form.

use core::fmt;
use core::str::FromStr;

use heapless::Vec;

use crate::code::{kind_of, ValueKind};
use crate::codec::MAX_VALUE_LEN;
use crate::error::{Error, Result};

/// Encoded record value, at most one record's worth of bytes.
pub type Value = Vec<u8, MAX_VALUE_LEN>;

/// A MAC-48 address as stored in `MacBase` and friends.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Non-zero and not a multicast address.
    pub fn is_valid(&self) -> bool {
        self.0 != [0; 6] && self.0[0] & 0x01 == 0
    }

    /// The next address in the board's block.
    ///
    /// Bumps the last three bytes with carry. If the carry runs out of the
    /// NIC-specific half the whole address becomes zero, which is invalid
    /// and ends any further derivation.
    pub fn successor(&self) -> Self {
        let mut mac = self.0;
        mac[5] = mac[5].wrapping_add(1);
        if mac[5] == 0 {
            mac[4] = mac[4].wrapping_add(1);
            if mac[4] == 0 {
                mac[3] = mac[3].wrapping_add(1);
                if mac[3] == 0 {
                    mac[..3].fill(0);
                }
            }
        }
        MacAddress(mac)
    }
}

impl TryFrom<&[u8]> for MacAddress {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 6] = bytes.try_into().map_err(|_| Error::InvalidValue)?;
        Ok(MacAddress(bytes))
    }
}

/// Parses `XX:XX:XX:XX:XX:XX`, one or two hex digits per group.
impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut mac = [0u8; 6];
        let mut groups = s.split(':');
        for byte in mac.iter_mut() {
            let group = groups.next().ok_or(Error::InvalidValue)?;
            if group.is_empty() || group.len() > 2 {
                return Err(Error::InvalidValue);
            }
            *byte = u8::from_str_radix(group, 16).map_err(|_| Error::InvalidValue)?;
        }
        if groups.next().is_some() {
            return Err(Error::InvalidValue);
        }
        Ok(MacAddress(mac))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Consecutive MAC addresses starting at a base address.
///
/// Stops early at the first invalid address.
#[derive(Clone, Debug)]
pub struct MacAddresses {
    next: MacAddress,
    remaining: u16,
}

impl MacAddresses {
    pub fn new(base: MacAddress, count: u16) -> Self {
        Self {
            next: base,
            remaining: count,
        }
    }

    /// An iterator that yields nothing.
    pub fn none() -> Self {
        Self::new(MacAddress::default(), 0)
    }
}

impl Iterator for MacAddresses {
    type Item = MacAddress;

    fn next(&mut self) -> Option<MacAddress> {
        if self.remaining == 0 || !self.next.is_valid() {
            return None;
        }
        let mac = self.next;
        self.next = mac.successor();
        self.remaining -= 1;
        Some(mac)
    }
}

/// Parses an unsigned number the way C's `strtoul(s, NULL, 0)` picks a
/// radix: `0x` prefix for hex, a leading `0` for octal, decimal otherwise.
/// Unlike `strtoul`, the whole string must be consumed.
pub fn parse_number(s: &str) -> Result<u32> {
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    // `from_str_radix` would accept a leading '+'.
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidValue);
    }
    u32::from_str_radix(digits, radix).map_err(|_| Error::InvalidValue)
}

/// Converts the textual form of a value into the bytes stored for `code`.
///
/// Text is stored as-is, cut at 255 bytes. Numbers go through
/// [`parse_number`] and must fit the code's width. Raw bytes are numbers
/// separated by blanks, commas or semicolons.
pub fn encode(code: u8, text: &str) -> Result<Value> {
    let mut out = Value::new();
    match kind_of(code) {
        ValueKind::Text => {
            let len = text.len().min(MAX_VALUE_LEN);
            out.extend_from_slice(&text.as_bytes()[..len])
                .map_err(|_| Error::InvalidValue)?;
        }
        ValueKind::Mac => {
            let mac: MacAddress = text.parse()?;
            if !mac.is_valid() {
                return Err(Error::InvalidValue);
            }
            out.extend_from_slice(&mac.0).map_err(|_| Error::InvalidValue)?;
        }
        ValueKind::U8 => {
            let n = u8::try_from(parse_number(text)?).map_err(|_| Error::InvalidValue)?;
            out.push(n).map_err(|_| Error::InvalidValue)?;
        }
        ValueKind::U16 => {
            let n = u16::try_from(parse_number(text)?).map_err(|_| Error::InvalidValue)?;
            out.extend_from_slice(&n.to_be_bytes())
                .map_err(|_| Error::InvalidValue)?;
        }
        ValueKind::Bytes => {
            for token in text
                .split(|c| matches!(c, ' ' | '\t' | ',' | ';'))
                .filter(|t| !t.is_empty())
            {
                let n = u8::try_from(parse_number(token)?).map_err(|_| Error::InvalidValue)?;
                out.push(n).map_err(|_| Error::InvalidValue)?;
            }
        }
        // The trailer is owned by the codec.
        ValueKind::Checksum => return Err(Error::InvalidValue),
    }
    Ok(out)
}

/// Folds up to four value bytes, big-endian, into a number.
pub fn decode_uint(value: &[u8]) -> Option<u32> {
    if value.is_empty() || value.len() > 4 {
        return None;
    }
    Some(value.iter().fold(0, |acc, &b| acc << 8 | u32::from(b)))
}

/// Renders a record value according to its code's value kind. Values whose
/// length doesn't fit the kind are shown as raw bytes.
pub struct DisplayValue<'a> {
    code: u8,
    value: &'a [u8],
}

impl<'a> DisplayValue<'a> {
    pub fn new(code: u8, value: &'a [u8]) -> Self {
        Self { code, value }
    }

    fn raw(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.value.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "0x{:02X}", b)?;
        }
        Ok(())
    }
}

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.value;
        match (kind_of(self.code), v.len()) {
            (ValueKind::Text, _) => {
                for &b in v {
                    let c = if b.is_ascii_graphic() || b == b' ' {
                        char::from(b)
                    } else {
                        '.'
                    };
                    write!(f, "{}", c)?;
                }
                Ok(())
            }
            (ValueKind::Mac, 6) => match MacAddress::try_from(v) {
                Ok(mac) => write!(f, "{}", mac),
                Err(_) => self.raw(f),
            },
            (ValueKind::U8, 1) | (ValueKind::U16, 2) => match decode_uint(v) {
                Some(n) => write!(f, "{}", n),
                None => self.raw(f),
            },
            (ValueKind::Checksum, 4) => match decode_uint(v) {
                Some(n) => write!(f, "0x{:08X}", n),
                None => self.raw(f),
            },
            _ => self.raw(f),
        }
    }
}
