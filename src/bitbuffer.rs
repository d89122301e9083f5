use std::fmt;

use thiserror::Error;

/// Error returned when an integer does not fit in the requested bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("integer overflow for {width} bits: {value}")]
pub struct Overflow {
    pub width: u8,
    pub value: u32,
}

/// The order in which the bits of an integer are laid out across bit
/// positions. Bit position `p` is always bit `p % 8` of byte `p / 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// Bit `i` of a value goes to position `pos + i`. This is the
    /// compress(1) layout.
    #[default]
    Lsb0,
    /// Bit `width - 1 - i` of a value goes to position `pos + i`.
    Msb0,
}

/// A growable byte buffer addressable at single-bit granularity.
///
/// Bit-level accessors grow the buffer on demand, zero-filling new bytes, so
/// reading past the end yields `false`. Integer reads never grow: running out
/// of bytes returns `None`, which callers treat as end of stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuffer {
    bytes: Vec<u8>,
    order: BitOrder,
}

impl BitBuffer {
    /// Creates an empty buffer using the given bit order.
    pub fn new(order: BitOrder) -> Self {
        Self {
            bytes: Vec::new(),
            order,
        }
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize, order: BitOrder) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            order,
        }
    }

    /// Wraps existing bytes.
    pub fn from_bytes(bytes: Vec<u8>, order: BitOrder) -> Self {
        Self { bytes, order }
    }

    /// Returns the bit order used by the integer accessors.
    #[inline]
    pub fn order(&self) -> BitOrder {
        self.order
    }

    /// Returns the number of allocated bytes.
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the number of addressable bits (always a multiple of 8).
    #[inline]
    pub fn len_bits(&self) -> usize {
        self.bytes.len() * 8
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Grows the buffer to the smallest whole number of bytes containing
    /// bit `pos`.
    pub fn ensure_bit(&mut self, pos: usize) {
        let needed = pos / 8 + 1;
        if needed > self.bytes.len() {
            self.bytes.resize(needed, 0);
        }
    }

    /// Sets or clears the bit at `pos`, growing the buffer if needed.
    #[inline]
    pub fn set_bit(&mut self, pos: usize, bit: bool) {
        self.ensure_bit(pos);
        let mask = Self::mask(pos);
        let byte = &mut self.bytes[pos / 8];
        if bit {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Reads the bit at `pos`, growing the buffer if needed.
    #[inline]
    pub fn get_bit(&mut self, pos: usize) -> bool {
        self.ensure_bit(pos);
        self.bit_at(pos)
    }

    /// Writes the low `width` bits of `value` starting at bit `pos`.
    ///
    /// Returns `Err(Overflow)` if `value >= 2^width`; nothing is written in
    /// that case. `width` must be <= 32.
    pub fn set_int(&mut self, pos: usize, width: u8, value: u32) -> Result<(), Overflow> {
        debug_assert!(width <= 32);
        if u64::from(value) >> width != 0 {
            return Err(Overflow { width, value });
        }
        if width == 0 {
            return Ok(());
        }
        self.ensure_bit(pos + width as usize - 1);
        for i in 0..width {
            let bit = (value >> self.value_bit(width, i)) & 1 == 1;
            self.set_bit(pos + i as usize, bit);
        }
        Ok(())
    }

    /// Reads a `width`-bit integer starting at bit `pos`.
    ///
    /// Returns `None` if the buffer does not hold `pos + width` bits. Unlike
    /// the bit accessors this never grows the buffer.
    pub fn get_int(&self, pos: usize, width: u8) -> Option<u32> {
        debug_assert!(width <= 32);
        if pos + width as usize > self.len_bits() {
            return None;
        }
        let mut value = 0u32;
        for i in 0..width {
            if self.bit_at(pos + i as usize) {
                value |= 1 << self.value_bit(width, i);
            }
        }
        Some(value)
    }

    /// Iterates over every allocated bit in position order.
    pub fn bits(&self) -> Bits<'_> {
        Bits { buf: self, pos: 0 }
    }

    #[inline]
    fn mask(pos: usize) -> u8 {
        1 << (pos % 8)
    }

    #[inline]
    fn bit_at(&self, pos: usize) -> bool {
        self.bytes[pos / 8] & Self::mask(pos) != 0
    }

    /// Index of the value bit stored at offset `i` of a `width`-bit field.
    #[inline]
    fn value_bit(&self, width: u8, i: u8) -> u8 {
        match self.order {
            BitOrder::Lsb0 => i,
            BitOrder::Msb0 => width - 1 - i,
        }
    }
}

/// Renders the buffer as `0`/`1` characters in bit-position order.
impl fmt::Display for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Iterator over the bits of a [`BitBuffer`], see [`BitBuffer::bits`].
#[derive(Debug, Clone)]
pub struct Bits<'a> {
    buf: &'a BitBuffer,
    pos: usize,
}

impl Iterator for Bits<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.pos >= self.buf.len_bits() {
            return None;
        }
        let bit = self.buf.bit_at(self.pos);
        self.pos += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buf.len_bits() - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Bits<'_> {}
