// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BSP for the K1-X family (deb1, deb2, evb).
//!
//! These carry a 24C02 on I2C2 (deb boards) or I2C6 (evb), and otherwise
//! keep the image in boot storage. The 24C02 is only 256 bytes, but boot
//! storage copies can be up to one 512 byte block.

use super::Bsp;
use crate::backend::eeprom::EepromConfig;

pub enum Board {}

impl Bsp for Board {
    const CAPACITY: usize = 512;

    const EEPROMS: &'static [EepromConfig] = &[
        EepromConfig::at24c02(2, 0x50),
        EepromConfig::at24c02(6, 0x50),
    ];

    const BOOT_STORAGE_OFFSET: u64 = 0x4_0000;

    const NOR_OFFSET: u32 = 0x4_0000;

    const WRITE_FALLBACK: bool = true;
}
