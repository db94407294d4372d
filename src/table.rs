// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Record-level operations on a TlvInfo buffer: scanning, lookup, append and
//! delete with compaction.
//!
//! Every mutation here leaves the buffer with a valid header, an accurate
//! total length and an up to date trailer before it returns, or leaves it
//! untouched if it fails.

use core::fmt;

use crate::code::{self, is_reserved};
use crate::codec::{
    self, decode_header, max_total_len, set_total_length, CRC_CODE, HEADER_SIZE,
    MAX_VALUE_LEN, RECORD_HEADER_SIZE, TRAILER_SIZE,
};
use crate::error::{Error, Result};
use crate::value::DisplayValue;

/// A record borrowed from a buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Record<'a> {
    /// Offset of the type byte from the start of the buffer.
    pub offset: usize,
    pub code: u8,
    pub value: &'a [u8],
}

impl Record<'_> {
    /// Bytes taken up by the record, framing included.
    pub fn size(&self) -> usize {
        RECORD_HEADER_SIZE + self.value.len()
    }
}

/// Formats like one line of the board shell's listing: name, code, length
/// and decoded value.
impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} 0x{:02X} {:>3} {}",
            code::name_of(self.code),
            self.code,
            self.value.len(),
            DisplayValue::new(self.code, self.value)
        )
    }
}

/// Sequential scan over the records of a buffer, in physical order.
///
/// A reserved type byte, or a record running past the declared total length,
/// yields one `CorruptRecord` error and ends the scan. There is no attempt to
/// resynchronize.
pub struct Records<'a> {
    buf: &'a [u8],
    offset: usize,
    end: usize,
    failed: bool,
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.end {
            return None;
        }

        let offset = self.offset;
        let corrupt = Error::CorruptRecord { offset };
        if offset + RECORD_HEADER_SIZE > self.end || is_reserved(self.buf[offset]) {
            self.failed = true;
            return Some(Err(corrupt));
        }

        let code = self.buf[offset];
        let value_start = offset + RECORD_HEADER_SIZE;
        let value_end = value_start + usize::from(self.buf[offset + 1]);
        if value_end > self.end {
            self.failed = true;
            return Some(Err(corrupt));
        }

        self.offset = value_end;
        Some(Ok(Record {
            offset,
            code,
            value: &self.buf[value_start..value_end],
        }))
    }
}

/// Starts a scan over the records of `buf`. Fails only if the header is bad.
pub fn records(buf: &[u8]) -> Result<Records<'_>> {
    let header = decode_header(buf)?;
    Ok(Records {
        buf,
        offset: HEADER_SIZE,
        end: header.end(),
        failed: false,
    })
}

/// Finds the first record of type `code`.
pub fn find(buf: &[u8], code: u8) -> Result<Option<Record<'_>>> {
    for record in records(buf)? {
        let record = record.map_err(|e| {
            log::warn!("{}", e);
            e
        })?;
        if record.code == code {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// Cuts the record at `offset` out of the buffer, shifting everything after
/// it down and shrinking the total length. Does not touch the trailer.
pub(crate) fn remove_at(buf: &mut [u8], offset: usize) -> Result<()> {
    let end = decode_header(buf)?.end();
    if offset < HEADER_SIZE || offset + RECORD_HEADER_SIZE > end {
        return Err(Error::CorruptRecord { offset });
    }
    let size = RECORD_HEADER_SIZE + usize::from(buf[offset + 1]);
    if offset + size > end {
        return Err(Error::CorruptRecord { offset });
    }

    buf.copy_within(offset + size..end, offset);
    buf[end - size..end].fill(0);
    set_total_length(buf, end - size - HEADER_SIZE);
    Ok(())
}

/// Deletes the first record of type `code`, compacting the records after it
/// and recomputing the trailer. Returns `false` if there was no such record,
/// in which case nothing changes.
pub fn delete(buf: &mut [u8], code: u8) -> Result<bool> {
    let offset = match find(buf, code)? {
        Some(record) => record.offset,
        None => return Ok(false),
    };
    remove_at(buf, offset)?;
    codec::recompute_checksum(buf)?;
    Ok(true)
}

/// Appends a record of type `code` after the last existing record, then
/// re-adds the trailer after it.
///
/// Room for the trailer is reserved up front: if the record and a trailer
/// don't both fit, this fails with `CapacityExceeded` and the buffer is left
/// exactly as it was. Existing records of the same type are not replaced;
/// use [`delete`] first for that.
pub fn add(buf: &mut [u8], code: u8, value: &[u8]) -> Result<()> {
    if is_reserved(code) || code == CRC_CODE || value.len() > MAX_VALUE_LEN {
        return Err(Error::InvalidValue);
    }

    let header = decode_header(buf)?;
    let trailer = find(buf, CRC_CODE)?.map(|t| (t.offset, t.size()));
    let records_len =
        usize::from(header.total_length) - trailer.map_or(0, |(_, size)| size);

    let needed = RECORD_HEADER_SIZE + value.len() + TRAILER_SIZE;
    let available = max_total_len(buf.len()) - records_len;
    if needed > available {
        return Err(Error::CapacityExceeded { needed, available });
    }

    if let Some((offset, _)) = trailer {
        remove_at(buf, offset)?;
    }

    let at = HEADER_SIZE + records_len;
    buf[at] = code;
    buf[at + 1] = value.len() as u8;
    buf[at + RECORD_HEADER_SIZE..at + RECORD_HEADER_SIZE + value.len()].copy_from_slice(value);
    set_total_length(buf, records_len + RECORD_HEADER_SIZE + value.len());

    codec::recompute_checksum(buf)
}

/// Human-readable dump of a whole buffer, in the layout of the board shell's
/// TLV listing.
pub struct Listing<'a>(pub &'a [u8]);

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = match decode_header(self.0) {
            Ok(header) => header,
            Err(_) => {
                return writeln!(
                    f,
                    "TLV data does not contain data in a valid TlvInfo format."
                )
            }
        };

        writeln!(f, "TlvInfo Header:")?;
        writeln!(f, "   Id String:    TlvInfo")?;
        writeln!(f, "   Version:      {}", header.version)?;
        writeln!(f, "   Total Length: {}", header.total_length)?;
        writeln!(f, "TLV Name             Code Len Value")?;
        writeln!(f, "-------------------- ---- --- -----")?;

        for record in records(self.0).map_err(|_| fmt::Error)? {
            match record {
                Ok(record) => writeln!(f, "{}", record)?,
                Err(Error::CorruptRecord { offset }) => {
                    return writeln!(f, "Invalid TLV field starting at TLV offset {}", offset)
                }
                Err(_) => return Err(fmt::Error),
            }
        }

        writeln!(
            f,
            "Checksum is {}.",
            if codec::verify_checksum(self.0) {
                "valid"
            } else {
                "invalid"
            }
        )
    }
}
