// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SPI NOR backend.
//!
//! The image sits at the start of a partition the board reserves for it.
//! NOR can only clear bits, so every write erases the blocks it covers
//! first. The store therefore owns whole erase blocks, and the region base
//! must be erase-block aligned.

use super::Backend;
use crate::error::BackendError;

type Result<T> = core::result::Result<T, BackendError>;

pub trait NorFlash {
    /// Brings up the controller and checks for a responding part.
    fn probe(&mut self) -> Result<()>;

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()>;

    /// Programs `data`; the target must already be erased.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<()>;

    /// Erases `size` bytes at `address`, both erase-block aligned.
    fn erase(&mut self, address: u32, size: u32) -> Result<()>;

    /// Smallest erasable unit in bytes.
    fn erase_size(&self) -> u32;

    fn capacity(&self) -> u32;
}

pub struct NorBackend<F> {
    flash: F,
    base: u32,
}

impl<F: NorFlash> NorBackend<F> {
    pub fn new(flash: F, base: u32) -> Self {
        Self { flash, base }
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    fn span(&self, offset: usize, len: usize) -> Result<u32> {
        let start = u32::try_from(offset)
            .ok()
            .and_then(|o| self.base.checked_add(o))
            .ok_or(BackendError::OutOfRange)?;
        let len = u32::try_from(len).map_err(|_| BackendError::OutOfRange)?;
        match start.checked_add(len) {
            Some(end) if end <= self.flash.capacity() => Ok(start),
            _ => Err(BackendError::OutOfRange),
        }
    }
}

impl<F: NorFlash> Backend for NorBackend<F> {
    fn name(&self) -> &'static str {
        "nor"
    }

    fn probe(&mut self) -> Result<()> {
        self.flash.probe()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let start = self.span(offset, buf.len())?;
        self.flash.read(start, buf)?;
        Ok(buf.len())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        let start = self.span(offset, data.len())?;
        let es = self.flash.erase_size();
        if es == 0 || start % es != 0 {
            return Err(BackendError::Misaligned);
        }
        let erase_len = (data.len() as u32).div_ceil(es) * es;
        if start.checked_add(erase_len).map_or(true, |end| end > self.flash.capacity()) {
            return Err(BackendError::OutOfRange);
        }

        self.flash.erase(start, erase_len)?;
        self.flash.write(start, data)?;
        log::info!("wrote {} bytes to NOR at 0x{:x}", data.len(), start);
        Ok(data.len())
    }
}
