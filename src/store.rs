// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The TLV store: a working copy of the image plus the backends it came from.
//!
//! The image is loaded on first use. Loading walks the backends in priority
//! order, taking the first that probes and reads cleanly; whatever it read is
//! then validated, and anything that fails validation is replaced with an
//! empty store. Updates only touch the working copy until [`TlvStore::flush`]
//! writes it back.

use crate::backend::Backends;
use crate::code::{is_reserved, TlvCode};
use crate::codec::{
    self, decode_header, max_total_len, CRC_CODE, HEADER_SIZE, MAX_VALUE_LEN,
    RECORD_HEADER_SIZE, TRAILER_SIZE,
};
use crate::error::{BackendError, Error, Result};
use crate::table::{self, Listing, Records};
use crate::value::{self, decode_uint, MacAddress, MacAddresses};

/// Runtime knobs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StoreConfig {
    /// When writing to the backend the image was loaded from fails, try the
    /// backends after it in turn.
    pub write_fallback: bool,
}

/// Where the working copy stands.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// Nothing loaded yet, or the last load failed.
    Empty,
    /// Loaded from a backend and valid.
    Valid,
    /// The backend held no valid image, so defaults were installed.
    ResetToDefault,
}

/// Outcome of [`TlvStore::get`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Copied {
    /// Bytes copied into the caller's buffer.
    pub copied: usize,
    /// Full length of the record's value.
    pub len: usize,
}

impl Copied {
    pub fn truncated(&self) -> bool {
        self.copied < self.len
    }
}

pub struct TlvStore<'a, const N: usize> {
    backends: Backends<'a>,
    config: StoreConfig,
    status: Status,
    /// Index of the backend the image was loaded from.
    active: Option<usize>,
    buffer: [u8; N],
}

impl<'a, const N: usize> TlvStore<'a, N> {
    const FITS_EMPTY_STORE: () = assert!(N >= HEADER_SIZE + TRAILER_SIZE);

    pub fn new(backends: Backends<'a>, config: StoreConfig) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS_EMPTY_STORE;
        Self {
            backends,
            config,
            status: Status::Empty,
            active: None,
            buffer: [0; N],
        }
    }

    /// Loads the image if it hasn't been loaded yet. Every other operation
    /// does this implicitly.
    pub fn init(&mut self) -> Result<()> {
        self.ensure_loaded()
    }

    /// Drops the working copy and loads it again.
    pub fn reload(&mut self) -> Result<()> {
        self.status = Status::Empty;
        self.active = None;
        self.ensure_loaded()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Name of the backend the image was loaded from.
    pub fn active_backend(&self) -> Option<&'static str> {
        self.active.and_then(|i| self.backends.name(i))
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.status != Status::Empty {
            return Ok(());
        }

        let mut last_error = Error::NoBackend;
        for i in 0..self.backends.len() {
            let Some(backend) = self.backends.get_mut(i) else {
                break;
            };
            if let Err(e) = backend.probe() {
                log::debug!("{}: {}", backend.name(), e);
                continue;
            }
            match backend.load(&mut self.buffer) {
                Ok(()) => {
                    log::debug!("TLV data loaded from {}", backend.name());
                    self.active = Some(i);
                    break;
                }
                Err(e) => {
                    log::warn!("reading TLV data from {} failed: {}", backend.name(), e);
                    last_error = e.into();
                }
            }
        }

        if self.active.is_none() {
            log::error!("failed to read TLV data: {}", last_error);
            self.buffer.fill(0);
            return Err(last_error);
        }

        self.status = match codec::validate(&self.buffer) {
            Ok(_) => Status::Valid,
            Err(e) => {
                log::info!("{}; using default TLV contents", e);
                codec::reset_to_empty(&mut self.buffer)?;
                Status::ResetToDefault
            }
        };
        Ok(())
    }

    /// Copies the value of the first `code` record into `out`, truncating it
    /// if `out` is too small.
    pub fn get(&mut self, code: u8, out: &mut [u8]) -> Result<Copied> {
        let value = self.get_value(code)?;
        let copied = value.len().min(out.len());
        out[..copied].copy_from_slice(&value[..copied]);
        Ok(Copied {
            copied,
            len: value.len(),
        })
    }

    /// Borrows the value of the first `code` record.
    pub fn get_value(&mut self, code: u8) -> Result<&[u8]> {
        self.ensure_loaded()?;
        match table::find(&self.buffer, code)? {
            Some(record) => Ok(record.value),
            None => Err(Error::NotFound),
        }
    }

    /// Reads a numeric record: up to four bytes, big-endian.
    pub fn get_uint(&mut self, code: u8) -> Result<u32> {
        decode_uint(self.get_value(code)?).ok_or(Error::InvalidValue)
    }

    /// Replaces the `code` record with `value`, or removes it for `None`.
    /// Removing a record that isn't there is fine.
    ///
    /// Either the whole update happens or none of it does: a value that
    /// won't fit leaves the old record in place.
    pub fn set(&mut self, code: u8, value: Option<&[u8]>) -> Result<()> {
        if is_reserved(code) || code == CRC_CODE {
            return Err(Error::InvalidValue);
        }
        self.ensure_loaded()?;

        let Some(value) = value else {
            table::delete(&mut self.buffer, code)?;
            return Ok(());
        };
        if value.len() > MAX_VALUE_LEN {
            return Err(Error::InvalidValue);
        }

        let total = usize::from(decode_header(&self.buffer)?.total_length);
        let trailer = table::find(&self.buffer, CRC_CODE)?.map_or(0, |t| t.size());
        let freed = table::find(&self.buffer, code)?.map_or(0, |r| r.size());
        let needed = RECORD_HEADER_SIZE + value.len() + TRAILER_SIZE;
        let available = max_total_len(N) - (total - trailer - freed);
        if needed > available {
            return Err(Error::CapacityExceeded { needed, available });
        }

        table::delete(&mut self.buffer, code)?;
        table::add(&mut self.buffer, code, value)
    }

    /// [`TlvStore::set`] with the value in text form, converted according
    /// to the code's value kind.
    pub fn set_str(&mut self, code: u8, text: Option<&str>) -> Result<()> {
        match text {
            Some(text) => {
                let value = value::encode(code, text)?;
                self.set(code, Some(value.as_slice()))
            }
            None => self.set(code, None),
        }
    }

    /// Writes the working copy back to the backend it was loaded from.
    ///
    /// With [`StoreConfig::write_fallback`] set, a failed write moves on to
    /// the next backends in priority order.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        codec::recompute_checksum(&mut self.buffer)?;
        let len = decode_header(&self.buffer)?.end();
        let first = self.active.ok_or(Error::NoBackend)?;

        let mut error = match write_image(&mut self.backends, first, &self.buffer, len) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if self.config.write_fallback {
            for i in first + 1..self.backends.len() {
                match write_image(&mut self.backends, i, &self.buffer, len) {
                    Ok(()) => return Ok(()),
                    Err(Error::Backend(BackendError::NotPresent)) => continue,
                    Err(e) => error = e,
                }
            }
        }
        log::error!("writing TLV data failed: {}", error);
        Err(error)
    }

    /// Resets the working copy to an empty store. Takes effect on the medium
    /// at the next flush.
    pub fn erase(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        codec::reset_to_empty(&mut self.buffer)?;
        self.status = Status::ResetToDefault;
        Ok(())
    }

    pub fn records(&mut self) -> Result<Records<'_>> {
        self.ensure_loaded()?;
        table::records(&self.buffer)
    }

    /// The image as it would be written: header, records and trailer.
    pub fn bytes(&mut self) -> Result<&[u8]> {
        self.ensure_loaded()?;
        let end = decode_header(&self.buffer)?.end();
        Ok(&self.buffer[..end])
    }

    pub fn listing(&mut self) -> Result<Listing<'_>> {
        self.ensure_loaded()?;
        Ok(Listing(&self.buffer))
    }

    /// The board's block of MAC addresses: `MacSize` of them (one if unset)
    /// starting at `MacBase`. Empty if the base is missing or unusable.
    pub fn mac_addresses(&mut self) -> Result<MacAddresses> {
        let count = match self.get_value(TlvCode::MacSize.into()) {
            Ok(&[hi, lo]) => u16::from_be_bytes([hi, lo]),
            Ok(_) | Err(Error::NotFound) => 1,
            Err(e) => return Err(e),
        };
        let base = match self.get_value(TlvCode::MacBase.into()) {
            Ok(value) => MacAddress::try_from(value).ok(),
            Err(Error::NotFound) => None,
            Err(e) => return Err(e),
        };
        Ok(match base {
            Some(base) if base.is_valid() => MacAddresses::new(base, count),
            _ => MacAddresses::none(),
        })
    }
}

/// Writes the first `len` bytes of `image` to backend `index`, padded to the
/// backend's write granule but never past the end of the buffer.
fn write_image(backends: &mut Backends<'_>, index: usize, image: &[u8], len: usize) -> Result<()> {
    let backend = backends.get_mut(index).ok_or(Error::NoBackend)?;
    backend.probe()?;
    let granule = backend.write_granule().max(1);
    let len = len.div_ceil(granule).saturating_mul(granule).min(image.len());
    backend.write_all(0, &image[..len])?;
    log::info!("wrote {} bytes of TLV data to {}", len, backend.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::string::ToString;

    use super::*;
    use crate::codec::{validate, CRC_LEN};
    use crate::mock::MemBackend;
    use hex_literal::hex;

    const EMPTY_STORE: [u8; 17] = hex!("546c76496e666f00 01 0006 fe04 d4431c18");
    const SERIAL_STORE: [u8; 25] =
        hex!("546c76496e666f00 01 000e 2306 534e30303031 fe04 9377552a");

    const SN: u8 = TlvCode::SerialNumber as u8;

    fn store<'a, const N: usize>(backend: &'a mut MemBackend) -> TlvStore<'a, N> {
        let backends = Backends::new().with(backend).unwrap();
        TlvStore::new(backends, StoreConfig::default())
    }

    #[test]
    fn loads_valid_image() {
        let mut mem = MemBackend::holding("eeprom", 512, &SERIAL_STORE);
        let mut store = store::<512>(&mut mem);

        let mut out = [0; 16];
        assert_eq!(store.get(SN, &mut out), Ok(Copied { copied: 6, len: 6 }));
        assert_eq!(&out[..6], b"SN0001");
        assert_eq!(store.status(), Status::Valid);
        assert_eq!(store.active_backend(), Some("eeprom"));
    }

    #[test]
    fn loads_once() {
        let mut mem = MemBackend::holding("eeprom", 512, &SERIAL_STORE);
        let state = mem.state();
        let mut store = store::<512>(&mut mem);

        store.init().unwrap();
        store.init().unwrap();
        store.get_value(SN).unwrap();
        assert_eq!(state.borrow().reads, 1);

        store.reload().unwrap();
        assert_eq!(state.borrow().reads, 2);
    }

    #[test]
    fn bad_images_reset_to_the_same_empty_store() {
        let mut wrong_magic = SERIAL_STORE;
        wrong_magic[0] = b't';
        let mut oversize = EMPTY_STORE;
        oversize[9..11].copy_from_slice(&0x0200u16.to_be_bytes());
        let mut bad_crc = SERIAL_STORE;
        bad_crc[24] ^= 1;

        let images: [&[u8]; 4] = [&[0; 17], &wrong_magic, &oversize, &bad_crc];
        for image in images {
            let mut mem = MemBackend::holding("mem", 512, image);
            let mut store = store::<512>(&mut mem);
            store.init().unwrap();
            assert_eq!(store.status(), Status::ResetToDefault);
            assert_eq!(store.bytes().unwrap(), &EMPTY_STORE);
            // The rest of the working copy is clean.
            assert!(store.buffer[17..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn set_then_get() {
        let mut mem = MemBackend::holding("mem", 512, &EMPTY_STORE);
        let mut store = store::<512>(&mut mem);

        store.set(SN, Some(b"SN0001")).unwrap();
        assert_eq!(store.get_value(SN).unwrap(), b"SN0001");
        assert_eq!(store.bytes().unwrap(), &SERIAL_STORE);

        store.set(SN, Some(b"SN0002")).unwrap();
        assert_eq!(store.get_value(SN).unwrap(), b"SN0002");
        assert_eq!(store.records().unwrap().count(), 2);
    }

    #[test]
    fn get_truncates_to_caller_buffer() {
        let mut mem = MemBackend::holding("mem", 512, &SERIAL_STORE);
        let mut store = store::<512>(&mut mem);

        let mut out = [0; 4];
        let copied = store.get(SN, &mut out).unwrap();
        assert_eq!(copied, Copied { copied: 4, len: 6 });
        assert!(copied.truncated());
        assert_eq!(&out, b"SN00");
    }

    #[test]
    fn set_none_deletes() {
        let mut mem = MemBackend::holding("mem", 512, &SERIAL_STORE);
        let mut store = store::<512>(&mut mem);

        store.set(SN, None).unwrap();
        assert_eq!(store.get(SN, &mut [0; 8]), Err(Error::NotFound));
        assert_eq!(store.bytes().unwrap(), &EMPTY_STORE);
        // Deleting again is not an error.
        store.set(SN, None).unwrap();
    }

    #[test]
    fn set_refuses_the_trailer_and_reserved_codes() {
        let mut mem = MemBackend::holding("mem", 512, &EMPTY_STORE);
        let mut store = store::<512>(&mut mem);
        assert_eq!(store.set(CRC_CODE, Some(&[0; CRC_LEN])), Err(Error::InvalidValue));
        assert_eq!(store.set(CRC_CODE, None), Err(Error::InvalidValue));
        assert_eq!(store.set(0x00, Some(b"x")), Err(Error::InvalidValue));
        assert_eq!(store.set(0xFF, None), Err(Error::InvalidValue));
    }

    #[test]
    fn oversized_set_keeps_the_old_value() {
        let mut mem = MemBackend::holding("mem", 64, &SERIAL_STORE);
        let mut store = store::<64>(&mut mem);
        let before = store.bytes().unwrap().to_vec();

        // 53 bytes of record space, 6 for the trailer, 2 per record header.
        assert!(matches!(
            store.set(SN, Some(&[b'x'; 46])),
            Err(Error::CapacityExceeded { .. })
        ));
        assert_eq!(store.bytes().unwrap(), &before[..]);

        // Replacing the record frees its space first.
        store.set(SN, Some(&[b'x'; 45])).unwrap();
        assert_eq!(validate(&store.buffer).unwrap().total_length, 53);
    }

    #[test]
    fn set_str_converts_by_kind() {
        let mut mem = MemBackend::holding("mem", 512, &EMPTY_STORE);
        let mut store = store::<512>(&mut mem);

        store.set_str(TlvCode::DdrDataRate.into(), Some("2400")).unwrap();
        assert_eq!(store.get_uint(TlvCode::DdrDataRate.into()), Ok(2400));
        assert_eq!(
            store.get_value(TlvCode::DdrDataRate.into()).unwrap(),
            &[0x09, 0x60]
        );

        assert_eq!(
            store.set_str(TlvCode::MacBase.into(), Some("not a mac")),
            Err(Error::InvalidValue)
        );
        store.set_str(TlvCode::DdrDataRate.into(), None).unwrap();
        assert_eq!(
            store.get_uint(TlvCode::DdrDataRate.into()),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn corrupt_record_is_not_not_found() {
        let mut image = SERIAL_STORE;
        image[11] = 0xFF;
        let mut mem = MemBackend::holding("mem", 512, &image);
        let mut damaged = store::<512>(&mut mem);

        // A damaged record breaks the checksum; the image is replaced.
        damaged.init().unwrap();
        assert_eq!(damaged.status(), Status::ResetToDefault);

        let mut image = [0u8; 64];
        codec::reset_to_empty(&mut image).unwrap();
        table::add(&mut image, SN, b"SN0001").unwrap();
        table::add(&mut image, 0x50, b"zz").unwrap();
        // Damage the middle record's type and re-seal the image so it loads.
        image[HEADER_SIZE + 8] = 0x00;
        let end = decode_header(&image).unwrap().end();
        let crc = crate::checksum::crc32(&image[..end - CRC_LEN]);
        image[end - CRC_LEN..end].copy_from_slice(&crc.to_be_bytes());

        let mut mem = MemBackend::holding("mem", 64, &image);
        let mut resealed = store::<64>(&mut mem);
        assert_eq!(resealed.get_value(SN).unwrap(), b"SN0001");
        assert_eq!(
            resealed.get_value(0x50),
            Err(Error::CorruptRecord {
                offset: HEADER_SIZE + 8
            })
        );
        assert_eq!(resealed.status(), Status::Valid);
    }

    #[test]
    fn flush_writes_the_image_and_reload_reads_it_back() {
        let mut mem = MemBackend::new(512);
        let state = mem.state();
        let mut store = store::<512>(&mut mem);

        store.set(SN, Some(b"SN0001")).unwrap();
        // Nothing reaches the medium before a flush.
        assert!(state.borrow().writes.is_empty());

        store.flush().unwrap();
        assert_eq!(state.borrow().writes, [(0, 25)]);
        assert_eq!(&state.borrow().data[..25], &SERIAL_STORE);

        store.reload().unwrap();
        assert_eq!(store.status(), Status::Valid);
        assert_eq!(store.get_value(SN).unwrap(), b"SN0001");
    }

    #[test]
    fn flush_pads_to_the_write_granule() {
        let mut mem = MemBackend::new(1024);
        let state = mem.state();
        state.borrow_mut().granule = 512;
        let mut store = store::<512>(&mut mem);

        store.flush().unwrap();
        assert_eq!(state.borrow().writes, [(0, 512)]);
    }

    #[test]
    fn load_falls_back_to_the_next_backend() {
        let mut eeprom = MemBackend::named("eeprom", 512);
        eeprom.state().borrow_mut().fail_reads = true;
        let mut missing = MemBackend::named("sd", 512);
        missing.state().borrow_mut().present = false;
        let mut emmc = MemBackend::holding("emmc", 512, &SERIAL_STORE);

        let backends = Backends::new()
            .with(&mut eeprom)
            .unwrap()
            .with(&mut missing)
            .unwrap()
            .with(&mut emmc)
            .unwrap();
        let mut store: TlvStore<'_, 512> = TlvStore::new(backends, StoreConfig::default());

        assert_eq!(store.get_value(SN).unwrap(), b"SN0001");
        assert_eq!(store.active_backend(), Some("emmc"));
    }

    #[test]
    fn load_failure_leaves_store_empty_for_retry() {
        let mut mem = MemBackend::new(512);
        let state = mem.state();
        state.borrow_mut().fail_reads = true;
        let mut store = store::<512>(&mut mem);

        assert_eq!(store.init(), Err(Error::Backend(BackendError::Transfer)));
        assert_eq!(store.status(), Status::Empty);

        state.borrow_mut().fail_reads = false;
        store.init().unwrap();
        assert_eq!(store.status(), Status::ResetToDefault);
    }

    #[test]
    fn no_backends_at_all() {
        let mut store: TlvStore<'_, 512> = TlvStore::new(Backends::new(), StoreConfig::default());
        assert_eq!(store.init(), Err(Error::NoBackend));
        assert_eq!(store.get(SN, &mut [0; 4]), Err(Error::NoBackend));
    }

    #[test]
    fn flush_falls_back_when_configured() {
        let mut eeprom = MemBackend::holding("eeprom", 512, &EMPTY_STORE);
        let eeprom_state = eeprom.state();
        let mut emmc = MemBackend::named("emmc", 512);
        let emmc_state = emmc.state();

        let backends = Backends::new()
            .with(&mut eeprom)
            .unwrap()
            .with(&mut emmc)
            .unwrap();
        let mut store: TlvStore<'_, 512> = TlvStore::new(
            backends,
            StoreConfig {
                write_fallback: true,
            },
        );
        store.set(SN, Some(b"SN0001")).unwrap();

        eeprom_state.borrow_mut().fail_writes = true;
        store.flush().unwrap();
        assert_eq!(&emmc_state.borrow().data[..25], &SERIAL_STORE);
    }

    #[test]
    fn flush_failure_without_fallback() {
        let mut eeprom = MemBackend::holding("eeprom", 512, &EMPTY_STORE);
        let eeprom_state = eeprom.state();
        let mut emmc = MemBackend::named("emmc", 512);
        let emmc_state = emmc.state();

        let backends = Backends::new()
            .with(&mut eeprom)
            .unwrap()
            .with(&mut emmc)
            .unwrap();
        let mut store: TlvStore<'_, 512> = TlvStore::new(backends, StoreConfig::default());
        store.init().unwrap();

        eeprom_state.borrow_mut().fail_writes = true;
        assert_eq!(store.flush(), Err(Error::Backend(BackendError::Transfer)));
        assert!(emmc_state.borrow().writes.is_empty());
    }

    #[test]
    fn erase_resets_the_working_copy() {
        let mut mem = MemBackend::holding("mem", 512, &SERIAL_STORE);
        let state = mem.state();
        let mut store = store::<512>(&mut mem);

        store.erase().unwrap();
        assert_eq!(store.status(), Status::ResetToDefault);
        assert_eq!(store.bytes().unwrap(), &EMPTY_STORE);
        assert_eq!(&state.borrow().data[..25], &SERIAL_STORE);

        store.flush().unwrap();
        assert_eq!(&state.borrow().data[..17], &EMPTY_STORE);
    }

    #[test]
    fn mac_block() {
        let mut mem = MemBackend::holding("mem", 512, &EMPTY_STORE);
        let mut store = store::<512>(&mut mem);

        assert_eq!(store.mac_addresses().unwrap().count(), 0);

        store
            .set_str(TlvCode::MacBase.into(), Some("FE:FE:FE:00:00:FF"))
            .unwrap();
        let macs: std::vec::Vec<_> = store.mac_addresses().unwrap().collect();
        assert_eq!(macs, [MacAddress([0xFE, 0xFE, 0xFE, 0, 0, 0xFF])]);

        store.set_str(TlvCode::MacSize.into(), Some("3")).unwrap();
        let macs: std::vec::Vec<_> = store
            .mac_addresses()
            .unwrap()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(
            macs,
            ["FE:FE:FE:00:00:FF", "FE:FE:FE:00:01:00", "FE:FE:FE:00:01:01"]
        );

        // A multicast base yields nothing.
        store.set(TlvCode::MacBase.into(), Some(&[1, 0, 0x5E, 0, 0, 1])).unwrap();
        assert_eq!(store.mac_addresses().unwrap().count(), 0);
    }

    #[test]
    fn listing_of_loaded_store() {
        let mut mem = MemBackend::holding("mem", 512, &SERIAL_STORE);
        let mut store = store::<512>(&mut mem);
        let text = store.listing().unwrap().to_string();
        assert!(text.contains("Serial Number        0x23   6 SN0001\n"));
        assert!(text.contains("CRC-32               0xFE   4 0x9377552A\n"));
    }
}
