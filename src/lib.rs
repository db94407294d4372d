//! Board identity data in the ONIE TlvInfo format.
//!
//! A small, checksummed block of type-length-value records (serial number,
//! MAC addresses, DDR parameters and the like) that early boot firmware
//! reads before there is any filesystem, from an I2C EEPROM or from a raw
//! region of boot storage.
//!
//! The layers, from the bottom:
//!
//! - [`codec`]: header, trailer and checksum over a byte buffer.
//! - [`table`]: finding, adding and deleting records.
//! - [`backend`]: the media an image can live on.
//! - [`store`]: the working copy, loaded on first use and flushed on demand.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod backend;
pub mod bsp;
pub mod checksum;
pub mod code;
pub mod codec;
pub mod error;
pub mod store;
pub mod table;
pub mod value;

#[cfg(test)]
mod mock;

pub use code::TlvCode;
pub use error::{BackendError, Error, Result};
pub use store::{Copied, Status, StoreConfig, TlvStore};

pub use bsp::board_backends;

use bsp::Bsp;

cfg_if::cfg_if! {
    if #[cfg(feature = "target-board-k1x")] {
        pub use bsp::k1x::Board;
    } else if #[cfg(feature = "target-board-generic")] {
        pub use bsp::generic::Board;
    } else {
        compile_error!("no target-board-* feature enabled");
    }
}

/// Working buffer size for the board being built.
pub const CAPACITY: usize = <Board as Bsp>::CAPACITY;

/// A store sized for the board being built.
pub type BoardStore<'a> = TlvStore<'a, CAPACITY>;

/// Creates a store for the board being built, with the board's settings.
pub fn board_store(backends: backend::Backends<'_>) -> BoardStore<'_> {
    TlvStore::new(backends, Board::config())
}
