// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire format of the TlvInfo block: header, record framing and the CRC-32
//! trailer.
//!
//! ```text
//! offset  size  field
//! 0       8     signature, "TlvInfo\0"
//! 8       1     version, 1
//! 9       2     total length of the records that follow, big-endian
//! 11      ...   records: type (1), length (1), value (length)
//! end-6   6     trailer record: 0xFE, 4, CRC-32 (big-endian)
//! ```
//!
//! The CRC covers every byte from the start of the signature up to, but not
//! including, the four value bytes of the trailer.
//!
//! All functions here take the whole working buffer. Its length is the
//! store's capacity, and bounds every length and offset we trust.

use core::mem::size_of;

use static_assertions::const_assert_eq;
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::checksum::crc32;
use crate::code::TlvCode;
use crate::error::{Error, Result};
use crate::table;

/// NUL-terminated identifier at the start of every TlvInfo block.
pub const SIGNATURE: [u8; 8] = *b"TlvInfo\0";
/// The only format version we understand.
pub const VERSION: u8 = 1;
/// Size of the fixed header.
pub const HEADER_SIZE: usize = size_of::<RawHeader>();
/// Size of the type and length bytes in front of every value.
pub const RECORD_HEADER_SIZE: usize = 2;
/// Type code of the trailer record.
pub const CRC_CODE: u8 = TlvCode::Crc32 as u8;
/// Length of the trailer record's value.
pub const CRC_LEN: usize = 4;
/// Size of the complete trailer record.
pub const TRAILER_SIZE: usize = RECORD_HEADER_SIZE + CRC_LEN;
/// Longest value a single record can carry.
pub const MAX_VALUE_LEN: usize = u8::MAX as usize;

/// On-media header layout. Only ever copied out of, or into, a byte buffer.
#[derive(Copy, Clone, Debug, AsBytes, FromBytes, Unaligned)]
#[repr(C)]
struct RawHeader {
    signature: [u8; 8],
    version: u8,
    total_length: [u8; 2],
}

const_assert_eq!(size_of::<RawHeader>(), 11);

/// Decoded header fields.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub version: u8,
    /// Bytes of records following the header, trailer included.
    pub total_length: u16,
}

impl Header {
    /// Header of a store with no records at all (not even a trailer).
    pub fn empty() -> Self {
        Self {
            version: VERSION,
            total_length: 0,
        }
    }

    /// Offset one past the last record byte.
    pub fn end(&self) -> usize {
        HEADER_SIZE + usize::from(self.total_length)
    }

    fn to_raw(self) -> RawHeader {
        RawHeader {
            signature: SIGNATURE,
            version: self.version,
            total_length: self.total_length.to_be_bytes(),
        }
    }
}

/// Largest `total_length` a buffer of `capacity` bytes can describe.
pub fn max_total_len(capacity: usize) -> usize {
    capacity
        .saturating_sub(HEADER_SIZE)
        .min(usize::from(u16::MAX))
}

/// Checks the signature, version and total length of the header at the
/// start of `buf`.
pub fn decode_header(buf: &[u8]) -> Result<Header> {
    let (raw, _) = LayoutVerified::<_, RawHeader>::new_from_prefix(buf)
        .ok_or(Error::InvalidFormat)?;
    let raw = raw.into_ref();

    if raw.signature != SIGNATURE || raw.version != VERSION {
        return Err(Error::InvalidFormat);
    }
    let total_length = u16::from_be_bytes(raw.total_length);
    if usize::from(total_length) > max_total_len(buf.len()) {
        return Err(Error::InvalidFormat);
    }

    Ok(Header {
        version: raw.version,
        total_length,
    })
}

/// Writes `header` to the start of `buf`.
pub fn encode_header(buf: &mut [u8], header: Header) -> Result<()> {
    let available = buf.len();
    let dest = buf.get_mut(..HEADER_SIZE).ok_or(Error::CapacityExceeded {
        needed: HEADER_SIZE,
        available,
    })?;
    dest.copy_from_slice(header.to_raw().as_bytes());
    Ok(())
}

/// Rewrites the total length field. `total` must already be known to fit.
pub(crate) fn set_total_length(buf: &mut [u8], total: usize) {
    debug_assert!(total <= max_total_len(buf.len()));
    buf[HEADER_SIZE - 2..HEADER_SIZE].copy_from_slice(&(total as u16).to_be_bytes());
}

/// Validates the header and the checksum trailer, returning the header.
///
/// The trailer must be the last record, occupying exactly the final six
/// bytes of the declared total length.
pub fn validate(buf: &[u8]) -> Result<Header> {
    let header = decode_header(buf)?;
    let end = header.end();

    let trailer = end
        .checked_sub(TRAILER_SIZE)
        .filter(|&at| at >= HEADER_SIZE)
        .ok_or(Error::ChecksumMismatch)?;
    if buf[trailer] != CRC_CODE || usize::from(buf[trailer + 1]) != CRC_LEN {
        return Err(Error::ChecksumMismatch);
    }

    let mut stored = [0; CRC_LEN];
    stored.copy_from_slice(&buf[end - CRC_LEN..end]);
    if crc32(&buf[..end - CRC_LEN]) != u32::from_be_bytes(stored) {
        return Err(Error::ChecksumMismatch);
    }

    Ok(header)
}

/// Returns `true` if `buf` holds a valid header and a matching trailer.
pub fn verify_checksum(buf: &[u8]) -> bool {
    validate(buf).is_ok()
}

/// Brings the trailer up to date with the rest of the buffer.
///
/// An existing trailer in last position is updated in place. One found
/// anywhere else is dropped and a fresh trailer appended at the end; so is a
/// missing one, which grows `total_length` by six bytes. If there is no room
/// for that, the buffer is left alone and `CapacityExceeded` returned.
pub fn recompute_checksum(buf: &mut [u8]) -> Result<()> {
    let header = decode_header(buf)?;
    let mut end = header.end();

    let in_place = match table::find(buf, CRC_CODE)? {
        Some(trailer) => {
            let last = trailer.offset + TRAILER_SIZE == end && trailer.value.len() == CRC_LEN;
            if !last {
                table::remove_at(buf, trailer.offset)?;
            }
            last
        }
        None => false,
    };

    if !in_place {
        let total = usize::from(decode_header(buf)?.total_length);
        let available = max_total_len(buf.len()) - total;
        if available < TRAILER_SIZE {
            return Err(Error::CapacityExceeded {
                needed: TRAILER_SIZE,
                available,
            });
        }
        end = HEADER_SIZE + total + TRAILER_SIZE;
        set_total_length(buf, total + TRAILER_SIZE);
        buf[end - TRAILER_SIZE] = CRC_CODE;
        buf[end - TRAILER_SIZE + 1] = CRC_LEN as u8;
    }

    let crc = crc32(&buf[..end - CRC_LEN]);
    buf[end - CRC_LEN..end].copy_from_slice(&crc.to_be_bytes());
    Ok(())
}

/// Replaces the contents of `buf` with the canonical empty store: header,
/// zero records and a trailer, followed by zero fill.
pub fn reset_to_empty(buf: &mut [u8]) -> Result<()> {
    if buf.len() < HEADER_SIZE + TRAILER_SIZE {
        return Err(Error::CapacityExceeded {
            needed: HEADER_SIZE + TRAILER_SIZE,
            available: buf.len(),
        });
    }
    buf.fill(0);
    encode_header(buf, Header::empty())?;
    recompute_checksum(buf)
}
