// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw boot storage: whichever medium the board booted from.
//!
//! [`BootStorage`] is a backend that works out which storage device is in
//! use (from the boot-mode flag and the boot strap pins) and forwards to the
//! backend registered for it. Early stages register their entries
//! read-only.

use heapless::Vec;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::Backend;
use crate::error::BackendError;

type Result<T> = core::result::Result<T, BackendError>;

/// Boot devices, with the values firmware stores in the boot-device flag
/// register.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum BootMode {
    None = 0,
    Usb = 0x55A,
    Emmc,
    Nand,
    Nor,
    Sd,
    Shell,
    Bootstrap,
}

impl BootMode {
    /// Decodes the boot-device flag register. Only modes that firmware
    /// actually sets there count; anything else means "not set".
    pub fn from_flag(flag: u32) -> Option<Self> {
        match Self::from_u32(flag)? {
            BootMode::None | BootMode::Bootstrap => None,
            mode => Some(mode),
        }
    }

    /// Decodes the two storage-select strap bits.
    pub fn from_strap(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => BootMode::Emmc,
            0b01 => BootMode::Nand,
            0b10 => BootMode::Nor,
            _ => BootMode::Sd,
        }
    }
}

/// Where the board learns how it booted.
pub trait BootModeSource {
    /// Raw boot-device flag register.
    fn boot_flag(&mut self) -> u32;

    /// Storage-select strap bits, already shifted down.
    fn boot_strap(&mut self) -> u32;

    /// Boot mode set by earlier firmware, or failing that the strap pins.
    fn boot_mode(&mut self) -> BootMode {
        match BootMode::from_flag(self.boot_flag()) {
            Some(mode) => mode,
            None => BootMode::from_strap(self.boot_strap()),
        }
    }

    /// Storage holding the image. The SD card is only used when we actually
    /// booted from it; otherwise the strap pins decide.
    fn boot_storage(&mut self) -> BootMode {
        match self.boot_mode() {
            BootMode::Sd => BootMode::Sd,
            _ => BootMode::from_strap(self.boot_strap()),
        }
    }
}

/// One row of the dispatch table.
pub struct StorageOp<'a> {
    pub mode: BootMode,
    pub backend: &'a mut dyn Backend,
    pub writable: bool,
}

impl<'a> StorageOp<'a> {
    pub fn read_write(mode: BootMode, backend: &'a mut dyn Backend) -> Self {
        Self {
            mode,
            backend,
            writable: true,
        }
    }

    pub fn read_only(mode: BootMode, backend: &'a mut dyn Backend) -> Self {
        Self {
            mode,
            backend,
            writable: false,
        }
    }
}

pub const MAX_STORAGE_OPS: usize = 4;

pub struct BootStorage<'a, S> {
    source: S,
    ops: Vec<StorageOp<'a>, MAX_STORAGE_OPS>,
    selected: Option<usize>,
}

impl<'a, S: BootModeSource> BootStorage<'a, S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            ops: Vec::new(),
            selected: None,
        }
    }

    /// Adds a row to the table. Gives the row back if the table is full.
    pub fn with(mut self, op: StorageOp<'a>) -> core::result::Result<Self, StorageOp<'a>> {
        self.ops.push(op)?;
        Ok(self)
    }

    /// Mode of the entry picked by the last probe.
    pub fn selected(&self) -> Option<BootMode> {
        self.selected.map(|i| self.ops[i].mode)
    }

    fn op(&mut self) -> Result<&mut StorageOp<'a>> {
        match self.selected {
            Some(i) => Ok(&mut self.ops[i]),
            None => Err(BackendError::NotPresent),
        }
    }
}

impl<S: BootModeSource> Backend for BootStorage<'_, S> {
    fn name(&self) -> &'static str {
        "boot storage"
    }

    fn probe(&mut self) -> Result<()> {
        let mode = self.source.boot_storage();
        self.selected = self.ops.iter().position(|op| op.mode == mode);
        let op = self.op().map_err(|e| {
            log::warn!("no boot storage handler for {:?}", mode);
            e
        })?;
        op.backend.probe()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.op()?.backend.read(offset, buf)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        let op = self.op()?;
        if !op.writable {
            return Err(BackendError::Unsupported);
        }
        op.backend.write(offset, data)
    }

    fn write_granule(&self) -> usize {
        self.selected
            .map_or(1, |i| self.ops[i].backend.write_granule())
    }

    fn load(&mut self, buf: &mut [u8]) -> Result<()> {
        self.op()?.backend.load(buf)
    }
}
