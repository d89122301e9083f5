//! # LZW
//!
//! Scaling LZW compression in the stream format of Unix `compress(1)`.
//!
//! ## Algorithm overview
//!
//! The encoder replaces the longest input prefix it has seen before with a
//! dictionary code, then registers that prefix plus the next byte as a new
//! word. Codes start 9 bits wide and widen by one bit each time the code space
//! fills, up to a configurable maximum (16 for compress(1) compatibility).
//!
//! The decoder never receives the dictionary. It rebuilds it from the codes
//! alone, one entry per code, staying exactly one step behind the encoder.
//!
//! In **block mode** the encoder watches its compression ratio once the
//! dictionary is full, and emits a reset code when the ratio starts falling,
//! so that the dictionary can adapt to a change in the input.
//!
//! ## Stream format
//!
//! | Bits | Field |
//! |------|-------|
//! | 0-15 | magic bytes `1f 9d` |
//! | 16-20 | max code width |
//! | 23 | block mode |
//! | 24.. | codes, least significant bit first, no padding |
//!
//! ## Example
//!
//! ```rust
//! use lzw::Config;
//!
//! let data = b"TOBEORNOTTOBEORTOBEORNOT";
//! let compressed = lzw::compress(data, Config::default()).unwrap();
//! let restored = lzw::decompress(&compressed).unwrap();
//! assert_eq!(restored, data);
//! ```
//!
//! ## Reusing settings
//!
//! An [`Encoder`] validates its settings once and can then compress any number
//! of inputs, from any number of threads:
//!
//! ```rust
//! use lzw::{Config, Decoder, Encoder};
//!
//! let encoder = Encoder::new(Config::default().with_block_mode(false)).unwrap();
//! for input in [&b"abc"[..], &b"abcabcabc"[..]] {
//!     let compressed = encoder.compress(input).unwrap();
//!     assert_eq!(Decoder::decompress(&compressed).unwrap(), input);
//! }
//! ```

pub mod bitbuffer;
pub mod decoder;
pub mod encoder;
pub mod header;

// Re-export primary types at the crate root.
pub use bitbuffer::{BitBuffer, BitOrder, Overflow};
pub use decoder::{DecodeError, Decoder};
pub use encoder::{Config, ConfigError, Encoder};
pub use header::Header;

/// Compresses `data` with the given settings.
pub fn compress(data: &[u8], config: Config) -> Result<Vec<u8>, ConfigError> {
    Encoder::new(config)?.compress(data)
}

/// Decompresses a complete compress(1) stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    Decoder::decompress(data)
}
