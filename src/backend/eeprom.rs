// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! I2C EEPROM backend.
//!
//! Boards may fit the identity EEPROM on one of several buses depending on
//! the revision; the backend tries each configured location in turn and
//! sticks with the first that acknowledges.

use super::Backend;
use crate::codec::{decode_header, HEADER_SIZE};
use crate::error::BackendError;

type Result<T> = core::result::Result<T, BackendError>;

/// Bytes per read transaction. The controller can't do more in one go.
pub const READ_LINE_LEN: usize = 16;

/// Acknowledge polls allowed after a page write before giving up.
pub const WRITE_POLL_RETRIES: u32 = 100;

/// Delay between acknowledge polls.
pub const WRITE_POLL_DELAY_US: u32 = 100;

/// The I2C controller, as far as the EEPROM cares.
pub trait I2cBus {
    /// Routes subsequent transactions to bus number `bus`.
    fn select_bus(&mut self, bus: u8) -> Result<()>;

    /// Addresses `chip` and reports whether it acknowledged.
    fn probe(&mut self, chip: u8) -> Result<()>;

    /// Reads `buf.len()` bytes from word address `addr`.
    fn read(&mut self, chip: u8, addr: u16, buf: &mut [u8]) -> Result<()>;

    /// Writes `data` at word address `addr`. `data` never crosses a page.
    fn write(&mut self, chip: u8, addr: u16, data: &[u8]) -> Result<()>;

    fn delay_us(&mut self, _us: u32) {}
}

/// Where an EEPROM may be fitted, and what part it is.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EepromConfig {
    pub bus: u8,
    /// 7-bit chip address.
    pub addr: u8,
    /// Total bytes.
    pub size: usize,
    /// Largest write that doesn't wrap inside the part.
    pub page_size: usize,
}

impl EepromConfig {
    /// Atmel 24C02 (256 bytes, 8 byte pages) at `addr` on `bus`.
    pub const fn at24c02(bus: u8, addr: u8) -> Self {
        Self {
            bus,
            addr,
            size: 256,
            page_size: 8,
        }
    }

    /// Atmel 24C16 (2 KiB, 16 byte pages) at `addr` on `bus`.
    pub const fn at24c16(bus: u8, addr: u8) -> Self {
        Self {
            bus,
            addr,
            size: 2048,
            page_size: 16,
        }
    }
}

pub struct EepromBackend<'c, B> {
    bus: B,
    configs: &'c [EepromConfig],
    found: Option<EepromConfig>,
}

impl<'c, B: I2cBus> EepromBackend<'c, B> {
    pub fn new(bus: B, configs: &'c [EepromConfig]) -> Self {
        Self {
            bus,
            configs,
            found: None,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// The part that answered the last probe, if any.
    pub fn found(&self) -> Option<EepromConfig> {
        self.found
    }

    fn part(&self, offset: usize, len: usize) -> Result<EepromConfig> {
        let part = self.found.ok_or(BackendError::NotPresent)?;
        match offset.checked_add(len) {
            Some(end) if end <= part.size => Ok(part),
            _ => Err(BackendError::OutOfRange),
        }
    }

    /// Waits for the part to finish an internal write cycle; it doesn't
    /// acknowledge its address until then.
    fn wait_ready(&mut self, chip: u8) -> Result<()> {
        for _ in 0..WRITE_POLL_RETRIES {
            if self.bus.probe(chip).is_ok() {
                return Ok(());
            }
            self.bus.delay_us(WRITE_POLL_DELAY_US);
        }
        log::error!("EEPROM 0x{:02x} still busy after write", chip);
        Err(BackendError::Timeout)
    }
}

impl<B: I2cBus> Backend for EepromBackend<'_, B> {
    fn name(&self) -> &'static str {
        "eeprom"
    }

    fn probe(&mut self) -> Result<()> {
        self.found = None;
        for config in self.configs {
            if self.bus.select_bus(config.bus).is_ok() && self.bus.probe(config.addr).is_ok() {
                log::info!("found EEPROM on bus {}, address 0x{:02x}", config.bus, config.addr);
                self.found = Some(*config);
                return Ok(());
            }
            log::debug!("no EEPROM on bus {}, address 0x{:02x}", config.bus, config.addr);
        }
        Err(BackendError::NotPresent)
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let part = self.part(offset, buf.len())?;
        for (i, line) in buf.chunks_mut(READ_LINE_LEN).enumerate() {
            let addr = offset + i * READ_LINE_LEN;
            self.bus.read(part.addr, addr as u16, line).map_err(|e| {
                log::error!("EEPROM read at {} failed: {}", addr, e);
                e
            })?;
        }
        Ok(buf.len())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        let part = self.part(offset, data.len())?;
        let mut done = 0;
        while done < data.len() {
            let addr = offset + done;
            let room = part.page_size - addr % part.page_size;
            let chunk = &data[done..data.len().min(done + room)];
            self.bus.write(part.addr, addr as u16, chunk).map_err(|e| {
                log::error!("EEPROM write at {} failed: {}", addr, e);
                e
            })?;
            self.wait_ready(part.addr)?;
            done += chunk.len();
        }
        Ok(done)
    }

    /// Reads the header on its own, then only as many record bytes as it
    /// declares. A header that is unreadable, or that claims more than the
    /// part holds, zero-fills `buf`, which the store treats like any other
    /// bad image.
    fn load(&mut self, buf: &mut [u8]) -> Result<()> {
        buf.fill(0);
        if buf.len() < HEADER_SIZE {
            return Ok(());
        }
        self.read_exact(0, &mut buf[..HEADER_SIZE])?;
        let size = self.found.map_or(0, |part| part.size);

        let end = match decode_header(buf) {
            Ok(header) if header.end() <= size => header.end(),
            Ok(header) => {
                log::warn!(
                    "TlvInfo header in EEPROM claims {} bytes, part holds {}",
                    header.end(),
                    size
                );
                buf.fill(0);
                return Ok(());
            }
            Err(_) => {
                log::debug!("no TlvInfo header in EEPROM");
                buf.fill(0);
                return Ok(());
            }
        };
        self.read_exact(HEADER_SIZE, &mut buf[HEADER_SIZE..end])
    }
}
