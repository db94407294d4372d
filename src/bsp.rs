// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types and hooks for describing boards to the TLV store.
//!
//! The store doesn't care much about the board. What it does need to know is
//! how big the working buffer should be, where the identity EEPROM might be
//! fitted, and where in raw boot storage the image lives. Those properties
//! are described by the `Bsp` trait below.
//!
//! To add a board:
//!
//! 1. Create a module within `tlvinfo::bsp` named after your board.
//! 2. Define a type in the module called `Board`. This type will never be
//!    instantiated, so it can be arbitrary; an empty enum is easy.
//! 3. Implement `tlvinfo::bsp::Bsp` for your `Board` type.
//! 4. Add a `target-board-*` feature to `Cargo.toml`.
//! 5. Add a branch to the `cfg_if` in `src/lib.rs` to select your `Board`.

// As with any set of BSPs that don't need different build settings, we
// compile all of them so that they all keep building.
pub mod generic;
pub mod k1x;

use crate::backend::block::{BlockBackend, BlockDevice};
use crate::backend::eeprom::{EepromBackend, EepromConfig, I2cBus};
use crate::backend::nor::{NorBackend, NorFlash};
use crate::backend::{Backend, Backends};
use crate::error::Result;
use crate::store::StoreConfig;

/// Requirements placed upon a BSP type.
pub trait Bsp {
    /// Size of the working buffer in bytes. Images larger than this can't be
    /// loaded, and are replaced with an empty store.
    const CAPACITY: usize;

    /// Places an identity EEPROM may be fitted, in probe order.
    const EEPROMS: &'static [EepromConfig];

    /// Byte offset of the image in raw eMMC or SD storage. Must be block
    /// aligned.
    const BOOT_STORAGE_OFFSET: u64;

    /// Byte offset of the image in SPI NOR. Must be erase-block aligned.
    const NOR_OFFSET: u32;

    /// Whether a failed EEPROM write may fall back to boot storage.
    ///
    /// Boards whose EEPROM is authoritative leave this off, so that a bad
    /// part is noticed rather than papered over.
    const WRITE_FALLBACK: bool;

    fn config() -> StoreConfig {
        StoreConfig {
            write_fallback: Self::WRITE_FALLBACK,
        }
    }

    /// The identity EEPROM, at whichever of `EEPROMS` answers first.
    fn eeprom<B: I2cBus>(bus: B) -> EepromBackend<'static, B> {
        EepromBackend::new(bus, Self::EEPROMS)
    }

    fn emmc<D: BlockDevice>(device: D) -> BlockBackend<D> {
        BlockBackend::emmc(device, Self::BOOT_STORAGE_OFFSET)
    }

    fn sd<D: BlockDevice>(device: D) -> BlockBackend<D> {
        BlockBackend::sd(device, Self::BOOT_STORAGE_OFFSET)
    }

    fn nor<F: NorFlash>(flash: F) -> NorBackend<F> {
        NorBackend::new(flash, Self::NOR_OFFSET)
    }
}

/// The backends a board loads from, in the order they are tried: the
/// identity EEPROM, then raw boot storage (normally a
/// [`BootStorage`](crate::backend::boot_storage::BootStorage) over the
/// board's `emmc`, `sd` and `nor` backends).
pub fn board_backends<'a>(
    eeprom: &'a mut dyn Backend,
    boot_storage: &'a mut dyn Backend,
) -> Result<Backends<'a>> {
    Backends::new().with(eeprom)?.with(boot_storage)
}
