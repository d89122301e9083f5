use std::collections::HashMap;

use log::{debug, trace};
use thiserror::Error;

use crate::bitbuffer::{BitBuffer, BitOrder, Overflow};
use crate::header::{
    Header, CHECKPOINT_BITS, INIT_CODE_WIDTH, MAX_CODE_WIDTH, RESET_CODE,
};

/// Error returned for invalid encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The maximum code width is outside `9..=31`.
    #[error("max code width must be between 9 and 31, got {0}")]
    MaxCodeWidth(u8),
    /// A value did not fit the bit width it was written at.
    #[error(transparent)]
    Overflow(#[from] Overflow),
}

/// Compression settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Allow mid-stream dictionary resets when the compression ratio drops.
    pub block_mode: bool,
    /// Largest code width the dictionary may scale up to. Values above 16
    /// are not readable by compress(1).
    pub max_code_width: u8,
}

impl Config {
    pub fn with_block_mode(mut self, block_mode: bool) -> Self {
        self.block_mode = block_mode;
        self
    }

    pub fn with_max_code_width(mut self, max_code_width: u8) -> Self {
        self.max_code_width = max_code_width;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_mode: true,
            max_code_width: 16,
        }
    }
}

/// The scaling LZW compressor.
///
/// Settings are fixed at construction; every call to [`Encoder::compress`]
/// starts from a fresh dictionary and buffer, so an encoder can be shared
/// freely.
///
/// # Example
/// ```
/// use lzw::{Config, Encoder};
///
/// let encoder = Encoder::new(Config::default().with_max_code_width(12)).unwrap();
/// let compressed = encoder.compress(b"TOBEORNOTTOBEORTOBEORNOT").unwrap();
/// assert_eq!(&compressed[..3], &[0x1F, 0x9D, 0x8C]);
/// ```
#[derive(Debug, Clone)]
pub struct Encoder {
    header: Header,
}

impl Encoder {
    /// Creates an encoder, rejecting a max code width outside `9..=31`.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        if !(INIT_CODE_WIDTH..=MAX_CODE_WIDTH).contains(&config.max_code_width) {
            return Err(ConfigError::MaxCodeWidth(config.max_code_width));
        }
        Ok(Self {
            header: Header {
                max_code_width: config.max_code_width,
                block_mode: config.block_mode,
            },
        })
    }

    pub fn block_mode(&self) -> bool {
        self.header.block_mode
    }

    pub fn max_code_width(&self) -> u8 {
        self.header.max_code_width
    }

    /// Compresses `data` into a complete stream, header included.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, ConfigError> {
        let mut session = Session::new(self.header, data.len())?;
        for &byte in data {
            session.push(byte)?;
        }
        session.finish()
    }
}

impl Default for Encoder {
    fn default() -> Self {
        let config = Config::default();
        Self {
            header: Header {
                max_code_width: config.max_code_width,
                block_mode: config.block_mode,
            },
        }
    }
}

/// String-to-code dictionary. A word is keyed by the code of its prefix and
/// its final byte; single-byte words are implicit and map to the byte value.
#[derive(Debug)]
struct Dictionary {
    words: HashMap<(u32, u8), u32>,
    next_code: u32,
}

impl Dictionary {
    fn new(first_code: u32) -> Self {
        Self {
            words: HashMap::new(),
            next_code: first_code,
        }
    }

    #[inline]
    fn get(&self, prefix: u32, byte: u8) -> Option<u32> {
        self.words.get(&(prefix, byte)).copied()
    }

    #[inline]
    fn insert(&mut self, prefix: u32, byte: u8) {
        self.words.insert((prefix, byte), self.next_code);
        self.next_code += 1;
    }
}

/// Working state of a single compression call.
#[derive(Debug)]
struct Session {
    header: Header,
    buf: BitBuffer,
    /// Next bit position to write.
    pos: usize,
    dict: Dictionary,
    code_width: u8,
    /// Code space is exhausted at the max width; no more insertions.
    full: bool,
    /// Code of the longest dictionary match seen so far.
    seen: Option<u32>,
    bytes_in: usize,
    checkpoint: Option<usize>,
    last_ratio: Option<usize>,
    resets: usize,
}

impl Session {
    fn new(header: Header, input_len: usize) -> Result<Self, ConfigError> {
        let mut buf = BitBuffer::with_capacity(input_len / 2 + 8, BitOrder::Lsb0);
        let pos = header.write(&mut buf)?;
        Ok(Self {
            header,
            buf,
            pos,
            dict: Dictionary::new(header.first_code()),
            code_width: INIT_CODE_WIDTH,
            full: false,
            seen: None,
            bytes_in: 0,
            checkpoint: None,
            last_ratio: None,
            resets: 0,
        })
    }

    fn push(&mut self, byte: u8) -> Result<(), ConfigError> {
        self.bytes_in += 1;

        let Some(seen) = self.seen else {
            self.seen = Some(u32::from(byte));
            return Ok(());
        };
        if let Some(code) = self.dict.get(seen, byte) {
            self.seen = Some(code);
            return Ok(());
        }

        self.write_code(seen)?;
        self.add_word(seen, byte);
        self.check_ratio()?;
        self.seen = Some(u32::from(byte));
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, ConfigError> {
        if let Some(seen) = self.seen.take() {
            self.write_code(seen)?;
        }
        debug!(
            "compressed {} bytes into {} bits ({} resets)",
            self.bytes_in, self.pos, self.resets
        );
        Ok(self.buf.into_bytes())
    }

    #[inline]
    fn write_code(&mut self, code: u32) -> Result<(), Overflow> {
        self.buf.set_int(self.pos, self.code_width, code)?;
        self.pos += self.code_width as usize;
        Ok(())
    }

    /// Registers `prefix + byte`, widening codes first when the current
    /// width is out of space.
    fn add_word(&mut self, prefix: u32, byte: u8) {
        if self.full {
            return;
        }
        if self.dict.next_code >= 1 << self.code_width {
            if self.code_width < self.header.max_code_width {
                self.code_width += 1;
                debug!(
                    "code width up to {} for code {} at bit {}",
                    self.code_width, self.dict.next_code, self.pos
                );
            } else {
                self.full = true;
                debug!("dictionary full at bit {}", self.pos);
                return;
            }
        }
        self.dict.insert(prefix, byte);
    }

    /// Once the dictionary is full in block mode, emits a reset when the
    /// compression ratio falls between checkpoints.
    fn check_ratio(&mut self) -> Result<(), Overflow> {
        if !self.header.block_mode || !self.full {
            return Ok(());
        }
        let Some(checkpoint) = self.checkpoint else {
            self.checkpoint = Some(self.pos + CHECKPOINT_BITS);
            return Ok(());
        };
        if self.pos <= checkpoint {
            return Ok(());
        }

        let bytes_out = self.pos / 8;
        if bytes_out == 0 {
            return Ok(());
        }
        let ratio = self.bytes_in / bytes_out;
        let last_ratio = *self.last_ratio.get_or_insert(ratio);
        trace!(
            "checkpoint at bit {}: ratio {} (last {})",
            self.pos,
            ratio,
            last_ratio
        );

        if ratio >= last_ratio {
            self.last_ratio = Some(ratio);
            self.checkpoint = Some(self.pos + CHECKPOINT_BITS);
        } else {
            debug!("ratio fell to {}, reset at bit {}", ratio, self.pos);
            self.write_code(RESET_CODE)?;
            self.reset();
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.dict = Dictionary::new(self.header.first_code());
        self.code_width = INIT_CODE_WIDTH;
        self.full = false;
        self.checkpoint = None;
        self.last_ratio = None;
        self.resets += 1;
    }
}
