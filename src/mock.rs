// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory stand-ins for the hardware the backends drive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::vec;
use std::vec::Vec;

use crate::backend::block::BlockDevice;
use crate::backend::boot_storage::BootModeSource;
use crate::backend::eeprom::I2cBus;
use crate::backend::nor::NorFlash;
use crate::backend::Backend;
use crate::error::BackendError;

type Result<T> = core::result::Result<T, BackendError>;

/// Everything about a [`MemBackend`] a test may want to poke at while a
/// store holds the backend itself.
#[derive(Debug)]
pub struct MemState {
    pub data: Vec<u8>,
    pub present: bool,
    pub fail_reads: bool,
    pub fail_writes: bool,
    /// Transfers come up this many bytes short.
    pub short_by: usize,
    pub granule: usize,
    pub reads: usize,
    /// `(offset, len)` of every write that reached the medium.
    pub writes: Vec<(usize, usize)>,
}

/// A backend over a plain byte vector, with failure injection.
pub struct MemBackend {
    name: &'static str,
    state: Rc<RefCell<MemState>>,
}

impl MemBackend {
    pub fn new(size: usize) -> Self {
        Self::named("mem", size)
    }

    pub fn named(name: &'static str, size: usize) -> Self {
        Self {
            name,
            state: Rc::new(RefCell::new(MemState {
                data: vec![0; size],
                present: true,
                fail_reads: false,
                fail_writes: false,
                short_by: 0,
                granule: 1,
                reads: 0,
                writes: Vec::new(),
            })),
        }
    }

    /// A backend already holding `image` at offset 0.
    pub fn holding(name: &'static str, size: usize, image: &[u8]) -> Self {
        let mem = Self::named(name, size);
        mem.state.borrow_mut().data[..image.len()].copy_from_slice(image);
        mem
    }

    pub fn state(&self) -> Rc<RefCell<MemState>> {
        self.state.clone()
    }

    pub fn set_short_by(&mut self, n: usize) {
        self.state.borrow_mut().short_by = n;
    }
}

impl Backend for MemBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn probe(&mut self) -> Result<()> {
        if self.state.borrow().present {
            Ok(())
        } else {
            Err(BackendError::NotPresent)
        }
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        state.reads += 1;
        if state.fail_reads {
            return Err(BackendError::Transfer);
        }
        let end = offset + buf.len();
        if end > state.data.len() {
            return Err(BackendError::OutOfRange);
        }
        let n = buf.len().saturating_sub(state.short_by);
        buf[..n].copy_from_slice(&state.data[offset..offset + n]);
        Ok(n)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(BackendError::Transfer);
        }
        let end = offset + data.len();
        if end > state.data.len() {
            return Err(BackendError::OutOfRange);
        }
        let n = data.len().saturating_sub(state.short_by);
        state.data[offset..offset + n].copy_from_slice(&data[..n]);
        state.writes.push((offset, n));
        Ok(n)
    }

    fn write_granule(&self) -> usize {
        self.state.borrow().granule
    }
}

/// An I2C controller with EEPROMs hanging off it.
#[derive(Default)]
pub struct MockI2c {
    parts: HashMap<(u8, u8), Vec<u8>>,
    bus: Option<u8>,
    read_lens: Vec<usize>,
    write_lens: Vec<usize>,
    fail_read_at: Option<usize>,
    write_protect: bool,
    busy_polls: u32,
    busy_remaining: u32,
}

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits a blank part of `size` bytes at `chip` on `bus`.
    pub fn attach(&mut self, bus: u8, chip: u8, size: usize) {
        self.parts.insert((bus, chip), vec![0xFF; size]);
    }

    pub fn contents(&self, bus: u8, chip: u8) -> &[u8] {
        &self.parts[&(bus, chip)]
    }

    pub fn contents_mut(&mut self, bus: u8, chip: u8) -> &mut [u8] {
        self.parts.get_mut(&(bus, chip)).unwrap()
    }

    /// Any read transaction covering `addr` fails.
    pub fn fail_read_at(&mut self, addr: usize) {
        self.fail_read_at = Some(addr);
    }

    /// Every write transaction fails, as with the WP pin tied high.
    pub fn set_write_protect(&mut self, protect: bool) {
        self.write_protect = protect;
    }

    /// After each write the part ignores this many address polls.
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    pub fn read_lens(&self) -> &[usize] {
        &self.read_lens
    }

    pub fn write_lens(&self) -> &[usize] {
        &self.write_lens
    }

    fn part(&mut self, chip: u8) -> Result<&mut Vec<u8>> {
        let bus = self.bus.ok_or(BackendError::Transfer)?;
        self.parts.get_mut(&(bus, chip)).ok_or(BackendError::NotPresent)
    }
}

impl I2cBus for MockI2c {
    fn select_bus(&mut self, bus: u8) -> Result<()> {
        self.bus = Some(bus);
        Ok(())
    }

    fn probe(&mut self, chip: u8) -> Result<()> {
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            return Err(BackendError::Transfer);
        }
        self.part(chip).map(|_| ())
    }

    fn read(&mut self, chip: u8, addr: u16, buf: &mut [u8]) -> Result<()> {
        self.read_lens.push(buf.len());
        let start = usize::from(addr);
        let end = start + buf.len();
        if self.fail_read_at.map_or(false, |at| (start..end).contains(&at)) {
            return Err(BackendError::Transfer);
        }
        let part = self.part(chip)?;
        let src = part.get(start..end).ok_or(BackendError::OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, chip: u8, addr: u16, data: &[u8]) -> Result<()> {
        self.write_lens.push(data.len());
        if self.write_protect {
            return Err(BackendError::Transfer);
        }
        let start = usize::from(addr);
        let part = self.part(chip)?;
        let dst = part
            .get_mut(start..start + data.len())
            .ok_or(BackendError::OutOfRange)?;
        dst.copy_from_slice(data);
        self.busy_remaining = self.busy_polls;
        Ok(())
    }
}

/// A block device over a byte vector.
pub struct MockBlock {
    data: Vec<u8>,
    block_size: usize,
    present: bool,
    max_blocks: Option<usize>,
    hwparts: Vec<u8>,
}

impl MockBlock {
    pub fn new(block_size: usize, blocks: usize) -> Self {
        Self {
            data: vec![0; block_size * blocks],
            block_size,
            present: true,
            max_blocks: None,
            hwparts: Vec::new(),
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Caps how many blocks one transfer moves.
    pub fn set_max_blocks(&mut self, max: usize) {
        self.max_blocks = Some(max);
    }

    /// Hardware partitions selected so far, in order.
    pub fn hwparts(&self) -> &[u8] {
        &self.hwparts
    }

    fn range(&self, lba: u64, len: usize) -> Result<(usize, usize)> {
        let blocks = len / self.block_size;
        let blocks = self.max_blocks.map_or(blocks, |max| blocks.min(max));
        let start = lba as usize * self.block_size;
        let end = start + blocks * self.block_size;
        if end > self.data.len() {
            return Err(BackendError::OutOfRange);
        }
        Ok((start, blocks))
    }
}

impl BlockDevice for MockBlock {
    fn is_present(&mut self) -> bool {
        self.present
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn select_hwpart(&mut self, part: u8) -> Result<()> {
        self.hwparts.push(part);
        Ok(())
    }

    fn read_blocks(&mut self, lba: u64, buf: &mut [u8]) -> Result<usize> {
        let (start, blocks) = self.range(lba, buf.len())?;
        let len = blocks * self.block_size;
        buf[..len].copy_from_slice(&self.data[start..start + len]);
        Ok(blocks)
    }

    fn write_blocks(&mut self, lba: u64, data: &[u8]) -> Result<usize> {
        let (start, blocks) = self.range(lba, data.len())?;
        let len = blocks * self.block_size;
        self.data[start..start + len].copy_from_slice(&data[..len]);
        Ok(blocks)
    }
}

/// NOR flash over a byte vector. Programming ANDs bits in, as on a real part.
pub struct MockNor {
    data: Vec<u8>,
    erase_size: u32,
    erase_counts: Vec<u32>,
}

impl MockNor {
    pub fn new(erase_size: u32, blocks: usize) -> Self {
        Self {
            data: vec![0xFF; erase_size as usize * blocks],
            erase_size,
            erase_counts: vec![0; blocks],
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn erase_counts(&self) -> &[u32] {
        &self.erase_counts
    }
}

impl NorFlash for MockNor {
    fn probe(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let start = address as usize;
        let src = self
            .data
            .get(start..start + buf.len())
            .ok_or(BackendError::OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let start = address as usize;
        let dst = self
            .data
            .get_mut(start..start + data.len())
            .ok_or(BackendError::OutOfRange)?;
        for (d, s) in dst.iter_mut().zip(data) {
            *d &= *s;
        }
        Ok(())
    }

    fn erase(&mut self, address: u32, size: u32) -> Result<()> {
        if address % self.erase_size != 0 || size % self.erase_size != 0 {
            return Err(BackendError::Misaligned);
        }
        let start = address as usize;
        let end = start + size as usize;
        self.data
            .get_mut(start..end)
            .ok_or(BackendError::OutOfRange)?
            .fill(0xFF);
        for block in address / self.erase_size..(address + size) / self.erase_size {
            self.erase_counts[block as usize] += 1;
        }
        Ok(())
    }

    fn erase_size(&self) -> u32 {
        self.erase_size
    }

    fn capacity(&self) -> u32 {
        self.data.len() as u32
    }
}

/// Boot-mode flag register and strap pins with fixed values.
pub struct Straps {
    flag: u32,
    strap: u32,
}

impl Straps {
    pub fn new(flag: u32, strap: u32) -> Self {
        Self { flag, strap }
    }
}

impl BootModeSource for Straps {
    fn boot_flag(&mut self) -> u32 {
        self.flag
    }

    fn boot_strap(&mut self) -> u32 {
        self.strap
    }
}
