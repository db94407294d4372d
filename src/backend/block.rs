// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Block device backend for eMMC and SD cards.
//!
//! The image lives in raw blocks at a fixed byte offset, outside any
//! partition. Partial blocks go through a bounce buffer so callers can use
//! byte lengths.

use super::Backend;
use crate::error::BackendError;

type Result<T> = core::result::Result<T, BackendError>;

/// Largest block size we can bounce.
pub const MAX_BLOCK_SIZE: usize = 512;

pub trait BlockDevice {
    fn is_present(&mut self) -> bool;

    /// Bytes per block.
    fn block_size(&self) -> usize;

    /// Switches to hardware partition `part` (eMMC only; 0 is the user area).
    fn select_hwpart(&mut self, _part: u8) -> Result<()> {
        Ok(())
    }

    /// Reads whole blocks starting at `lba` into `buf`, whose length is a
    /// multiple of the block size. Returns the number of blocks read.
    fn read_blocks(&mut self, lba: u64, buf: &mut [u8]) -> Result<usize>;

    /// Writes whole blocks starting at `lba`. Returns the number of blocks
    /// written.
    fn write_blocks(&mut self, lba: u64, data: &[u8]) -> Result<usize>;
}

pub struct BlockBackend<D> {
    device: D,
    name: &'static str,
    base: u64,
    hwpart: Option<u8>,
}

impl<D: BlockDevice> BlockBackend<D> {
    /// The eMMC user area, `base` bytes in.
    pub fn emmc(device: D, base: u64) -> Self {
        Self {
            device,
            name: "emmc",
            base,
            hwpart: Some(0),
        }
    }

    /// An SD card, `base` bytes in.
    pub fn sd(device: D, base: u64) -> Self {
        Self {
            device,
            name: "sd",
            base,
            hwpart: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Block size, and the block at which `offset` starts.
    fn locate(&mut self, offset: usize) -> Result<(usize, u64)> {
        let bs = self.device.block_size();
        if bs == 0 || bs > MAX_BLOCK_SIZE {
            return Err(BackendError::Unsupported);
        }
        let start = self.base + offset as u64;
        if start % bs as u64 != 0 {
            return Err(BackendError::Misaligned);
        }
        if let Some(part) = self.hwpart {
            self.device.select_hwpart(part)?;
        }
        Ok((bs, start / bs as u64))
    }
}

impl<D: BlockDevice> Backend for BlockBackend<D> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn probe(&mut self) -> Result<()> {
        if self.device.is_present() {
            Ok(())
        } else {
            log::debug!("no {} device", self.name);
            Err(BackendError::NotPresent)
        }
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let (bs, lba) = self.locate(offset)?;
        let whole = buf.len() / bs * bs;
        let (head, tail) = buf.split_at_mut(whole);

        let blocks = self.device.read_blocks(lba, head)?;
        if blocks * bs < whole {
            return Ok(blocks * bs);
        }

        if !tail.is_empty() {
            let mut bounce = [0u8; MAX_BLOCK_SIZE];
            let bounce = &mut bounce[..bs];
            if self.device.read_blocks(lba + (whole / bs) as u64, bounce)? < 1 {
                return Ok(whole);
            }
            let len = tail.len();
            tail.copy_from_slice(&bounce[..len]);
        }
        Ok(buf.len())
    }

    /// Writes whole blocks straight from `data`. A trailing partial block is
    /// read, patched and written back, so bytes past the end of `data` keep
    /// their old contents.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        let (bs, lba) = self.locate(offset)?;
        let whole = data.len() / bs * bs;
        let (head, tail) = data.split_at(whole);

        log::info!("writing {} bytes to {} at {}", data.len(), self.name, self.base + offset as u64);
        let blocks = self.device.write_blocks(lba, head)?;
        if blocks * bs < whole {
            return Ok(blocks * bs);
        }

        if !tail.is_empty() {
            let tail_lba = lba + (whole / bs) as u64;
            let mut bounce = [0u8; MAX_BLOCK_SIZE];
            let bounce = &mut bounce[..bs];
            if self.device.read_blocks(tail_lba, bounce)? < 1 {
                return Ok(whole);
            }
            bounce[..tail.len()].copy_from_slice(tail);
            if self.device.write_blocks(tail_lba, bounce)? < 1 {
                return Ok(whole);
            }
        }
        Ok(data.len())
    }

    fn write_granule(&self) -> usize {
        self.device.block_size()
    }
}
