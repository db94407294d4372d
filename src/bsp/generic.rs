// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BSP for boards with one full-size identity EEPROM.

use super::Bsp;
use crate::backend::eeprom::EepromConfig;

pub enum Board {}

impl Bsp for Board {
    const CAPACITY: usize = 2048;

    const EEPROMS: &'static [EepromConfig] = &[EepromConfig::at24c16(0, 0x50)];

    const BOOT_STORAGE_OFFSET: u64 = 0x10_0000;

    const NOR_OFFSET: u32 = 0x10_0000;

    // The EEPROM is the only copy anyone reads back.
    const WRITE_FALLBACK: bool = false;
}
