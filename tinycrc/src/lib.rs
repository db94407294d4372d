//! `tinycrc`: a tiny CRC implementation.
//!
//! This is a CRC32 implementation that focuses on size over performance. It
//! uses no lookup tables and about 16 bytes of RAM, which matters in a first
//! stage loader where the whole image has to fit in on-chip SRAM.
//!
//! Algorithms are those defined in the `crc_catalog` crate, used by `crc` (a
//! crate that you should use instead if performance is important).

#![no_std]

use crc_catalog::Algorithm;

/// A CRC32 operation-in-progress using a particular algorithm.
#[derive(Clone, Debug)]
pub struct Crc32 {
    /// Algorithm polynomial, bit-reversed when the algorithm reflects input.
    poly: u32,
    /// Should data be bit-reversed on the way in?
    reflect_in: bool,
    /// Should data be bit-reversed on the way out?
    reflect_out: bool,
    /// Value to XOR into the CRC at the end.
    xorout: u32,
    /// Current CRC value.
    value: u32,
}

impl Crc32 {
    /// Creates a new `Crc32` using `algorithm`'s settings.
    pub fn new(algorithm: &Algorithm<u32>) -> Self {
        let (poly, value) = if algorithm.refin {
            (algorithm.poly.reverse_bits(), algorithm.init.reverse_bits())
        } else {
            (algorithm.poly, algorithm.init)
        };
        Self {
            poly,
            reflect_in: algorithm.refin,
            reflect_out: algorithm.refout,
            xorout: algorithm.xorout,
            value,
        }
    }

    /// Computes the CRC of `data` in one go.
    pub fn checksum(algorithm: &Algorithm<u32>, data: &[u8]) -> u32 {
        let mut crc = Self::new(algorithm);
        crc.update(data);
        crc.finish()
    }

    /// Updates this CRC with the content of `data`.
    pub fn update(&mut self, data: &[u8]) {
        if self.reflect_in {
            for &byte in data {
                self.value = step_reflected(self.poly, self.value ^ u32::from(byte));
            }
        } else {
            for &byte in data {
                self.value = step(self.poly, self.value ^ (u32::from(byte) << 24));
            }
        }
    }

    /// Performs any final computations required and returns the computed CRC32.
    pub fn finish(mut self) -> u32 {
        if self.reflect_in ^ self.reflect_out {
            self.value = self.value.reverse_bits();
        }
        self.value ^ self.xorout
    }
}

/// Shifts one byte's worth of bits out of a reflected register.
fn step_reflected(poly: u32, mut value: u32) -> u32 {
    for _ in 0..8 {
        value = (value >> 1) ^ ((value & 1) * poly);
    }
    value
}

/// Shifts one byte's worth of bits out of a non-reflected register.
fn step(poly: u32, mut value: u32) -> u32 {
    for _ in 0..8 {
        value = (value << 1) ^ ((value >> 31) * poly);
    }
    value
}
