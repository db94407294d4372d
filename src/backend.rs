// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Storage backends: the physical homes of the TLV image.
//!
//! A backend addresses its own region from offset 0, so the store never has
//! to know where on the medium the image actually lives. The drivers here are
//! thin adapters between the [`Backend`] interface and a handful of small
//! device traits that board code implements on top of its HAL.

pub mod block;
pub mod boot_storage;
pub mod eeprom;
pub mod nor;

use heapless::Vec;

use crate::error::{BackendError, Error, Result};

/// Most backends a store will consider. Real boards have one or two.
pub const MAX_BACKENDS: usize = 4;

/// A medium that can hold a TLV image.
pub trait Backend {
    /// Short name for log messages.
    fn name(&self) -> &'static str;

    /// Checks that the device is there and answering. Called before the
    /// first read or write; cheap enough to call again.
    fn probe(&mut self) -> core::result::Result<(), BackendError>;

    /// Reads into `buf` starting at `offset`, returning the number of bytes
    /// actually read.
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> core::result::Result<usize, BackendError>;

    /// Writes `data` starting at `offset`, returning the number of bytes
    /// actually written.
    fn write(&mut self, offset: usize, data: &[u8]) -> core::result::Result<usize, BackendError>;

    /// Writes are padded out to a multiple of this many bytes.
    fn write_granule(&self) -> usize {
        1
    }

    /// Like `read`, but anything short of `buf.len()` is an error.
    fn read_exact(&mut self, offset: usize, buf: &mut [u8]) -> core::result::Result<(), BackendError> {
        let transferred = self.read(offset, buf)?;
        if transferred < buf.len() {
            return Err(BackendError::ShortTransfer {
                requested: buf.len(),
                transferred,
            });
        }
        Ok(())
    }

    /// Like `write`, but anything short of `data.len()` is an error.
    fn write_all(&mut self, offset: usize, data: &[u8]) -> core::result::Result<(), BackendError> {
        let transferred = self.write(offset, data)?;
        if transferred < data.len() {
            return Err(BackendError::ShortTransfer {
                requested: data.len(),
                transferred,
            });
        }
        Ok(())
    }

    /// Fills `buf` with the stored image. Backends that can read the header
    /// first and skip the rest of an obviously bad image override this.
    fn load(&mut self, buf: &mut [u8]) -> core::result::Result<(), BackendError> {
        self.read_exact(0, buf)
    }
}

/// The backends a store may use, in priority order.
#[derive(Default)]
pub struct Backends<'a> {
    list: Vec<&'a mut dyn Backend, MAX_BACKENDS>,
}

impl<'a> Backends<'a> {
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    /// Adds a backend after the ones already registered.
    pub fn push(&mut self, backend: &'a mut dyn Backend) -> Result<()> {
        self.list.push(backend).map_err(|_| Error::CapacityExceeded {
            needed: MAX_BACKENDS + 1,
            available: MAX_BACKENDS,
        })
    }

    /// Builder form of [`Backends::push`], for fixed board tables.
    pub fn with(mut self, backend: &'a mut dyn Backend) -> Result<Self> {
        self.push(backend)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Backend + 'a)> {
        match self.list.get_mut(index) {
            Some(backend) => Some(&mut **backend),
            None => None,
        }
    }

    pub fn name(&self, index: usize) -> Option<&'static str> {
        self.list.get(index).map(|backend| backend.name())
    }
}
