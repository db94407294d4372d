// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The CRC-32 primitive protecting the store.
//!
//! This is the standard zlib/Ethernet CRC-32 (CRC-32/ISO-HDLC), equivalent to
//! `crc32(0, data, len)` in most boot loaders. By default we use `tinycrc`,
//! which trades speed for a table-free implementation; the `fast-crc` feature
//! swaps in the table-driven `crc` crate for builds that have the room.

cfg_if::cfg_if! {
    if #[cfg(feature = "fast-crc")] {
        const CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

        /// Computes the CRC-32 of `data`.
        pub fn crc32(data: &[u8]) -> u32 {
            CRC32.checksum(data)
        }
    } else {
        /// Computes the CRC-32 of `data`.
        pub fn crc32(data: &[u8]) -> u32 {
            tinycrc::Crc32::checksum(&crc_catalog::CRC_32_ISO_HDLC, data)
        }
    }
}
