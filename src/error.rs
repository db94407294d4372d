// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types shared by the codec, the record table, the backends and the
//! store.

use core::fmt;

/// Result type for store operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Everything that can go wrong with the TLV store.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Signature or version mismatch, or a total length beyond capacity.
    InvalidFormat,
    /// The trailer is missing or its CRC does not match the contents.
    ChecksumMismatch,
    /// A record scan hit a reserved type byte, or a record that runs past
    /// the declared total length, at `offset` from the start of the buffer.
    CorruptRecord { offset: usize },
    /// No record with the requested type code.
    NotFound,
    /// A mutation would need `needed` bytes of record space but only
    /// `available` are left.
    CapacityExceeded { needed: usize, available: usize },
    /// The value (or type code) cannot be stored: reserved code, value too
    /// long, or text that does not parse for the code's value kind.
    InvalidValue,
    /// No backend could be probed and read.
    NoBackend,
    /// The physical medium failed.
    Backend(BackendError),
}

/// Failures reported by storage backends.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BackendError {
    /// The device did not respond to probing.
    NotPresent,
    /// A bus transaction or device command failed.
    Transfer,
    /// The device moved fewer bytes than requested. Treated as a failure of
    /// the whole operation.
    ShortTransfer { requested: usize, transferred: usize },
    /// The access falls outside the device or its region.
    OutOfRange,
    /// The access is not aligned the way the device requires.
    Misaligned,
    /// The operation is not available on this backend (e.g. writes from a
    /// first-stage build).
    Unsupported,
    /// The device did not finish an internal operation within the retry
    /// budget.
    Timeout,
}

impl Error {
    /// Negative status code for board glue that still speaks C conventions.
    ///
    /// The lookup codes match what board code historically tested for: `-1`
    /// when the store itself is unavailable, `-2` for a corrupt record, `-3`
    /// when the record is absent.
    pub fn errno(&self) -> i32 {
        match self {
            Error::InvalidFormat
            | Error::ChecksumMismatch
            | Error::NoBackend
            | Error::Backend(_) => -1,
            Error::CorruptRecord { .. } => -2,
            Error::NotFound => -3,
            Error::InvalidValue => -22,
            Error::CapacityExceeded { .. } => -28,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidFormat => write!(f, "not a valid TlvInfo header"),
            Error::ChecksumMismatch => write!(f, "TlvInfo checksum mismatch"),
            Error::CorruptRecord { offset } => {
                write!(f, "invalid TLV field starting at offset {}", offset)
            }
            Error::NotFound => write!(f, "no such TLV record"),
            Error::CapacityExceeded { needed, available } => write!(
                f,
                "not enough room for TLV data ({} bytes needed, {} available)",
                needed, available
            ),
            Error::InvalidValue => write!(f, "invalid TLV value"),
            Error::NoBackend => write!(f, "no TLV storage backend available"),
            Error::Backend(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotPresent => write!(f, "device not present"),
            BackendError::Transfer => write!(f, "transfer failed"),
            BackendError::ShortTransfer {
                requested,
                transferred,
            } => write!(f, "short transfer ({} of {} bytes)", transferred, requested),
            BackendError::OutOfRange => write!(f, "address out of range"),
            BackendError::Misaligned => write!(f, "misaligned access"),
            BackendError::Unsupported => write!(f, "operation not supported"),
            BackendError::Timeout => write!(f, "device timed out"),
        }
    }
}

impl core::error::Error for Error {}

impl core::error::Error for BackendError {}

impl From<BackendError> for Error {
    fn from(error: BackendError) -> Self {
        Error::Backend(error)
    }
}
