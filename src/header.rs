use crate::bitbuffer::{BitBuffer, BitOrder, Overflow};
use crate::decoder::DecodeError;

/// The two magic bytes every compress(1) stream starts with.
pub const MAGIC: [u8; 2] = [0x1F, 0x9D];
/// Flags-byte mask for the maximum code width.
pub const MASK_BITS: u8 = 0x1F;
/// Flags-byte mask for block mode.
pub const MASK_BLOCK: u8 = 0x80;
/// Length of the header in bits.
pub const HEADER_BITS: usize = 24;

/// Block-mode code telling the decoder to reset its dictionary.
pub const RESET_CODE: u32 = 256;
/// First assignable code in block mode.
pub const BLOCK_INIT_CODE: u32 = 257;
/// First assignable code without block mode.
pub const NORMAL_INIT_CODE: u32 = 256;
/// Code width at the start of the stream and after each reset.
pub const INIT_CODE_WIDTH: u8 = 9;
/// Largest code width the flags byte and the bit buffer support.
pub const MAX_CODE_WIDTH: u8 = 31;
/// Output bits between compression ratio checks in block mode.
pub const CHECKPOINT_BITS: usize = 10_000;

/// The 3-byte stream header: magic bytes plus a flags byte.
///
/// ```
/// use lzw::Header;
///
/// let header = Header::parse(&[0x1F, 0x9D, 0x90]).unwrap();
/// assert_eq!(header.max_code_width, 16);
/// assert!(header.block_mode);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub max_code_width: u8,
    pub block_mode: bool,
}

impl Header {
    /// Reads the header at the start of a compressed stream.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let buf = BitBuffer::from_bytes(data.get(..3).unwrap_or(data).to_vec(), BitOrder::Lsb0);
        Self::read(&buf)
    }

    /// The flags byte: max code width in bits 0-4, block mode in bit 7.
    pub fn flags(&self) -> u8 {
        (self.max_code_width & MASK_BITS) | if self.block_mode { MASK_BLOCK } else { 0 }
    }

    /// First code the dictionary assigns after a reset.
    pub fn first_code(&self) -> u32 {
        if self.block_mode {
            BLOCK_INIT_CODE
        } else {
            NORMAL_INIT_CODE
        }
    }

    pub(crate) fn write(&self, buf: &mut BitBuffer) -> Result<usize, Overflow> {
        let mut pos = 0;
        for byte in MAGIC.into_iter().chain([self.flags()]) {
            buf.set_int(pos, 8, u32::from(byte))?;
            pos += 8;
        }
        Ok(pos)
    }

    pub(crate) fn read(buf: &BitBuffer) -> Result<Self, DecodeError> {
        let truncated = DecodeError::TruncatedHeader {
            len: buf.len_bytes(),
        };
        let byte = |i: usize| buf.get_int(i * 8, 8).map(|b| b as u8);

        let found = [
            byte(0).ok_or(truncated.clone())?,
            byte(1).ok_or(truncated.clone())?,
        ];
        if found != MAGIC {
            return Err(DecodeError::BadMagic { found });
        }

        let flags = byte(2).ok_or(truncated)?;
        let max_code_width = flags & MASK_BITS;
        // Widths below 9 are legal in the flags byte; such a stream simply
        // never widens past 9 bits.
        if max_code_width == 0 {
            return Err(DecodeError::InvalidMaxCodeWidth(max_code_width));
        }
        Ok(Self {
            max_code_width,
            block_mode: flags & MASK_BLOCK != 0,
        })
    }
}
