use log::debug;
use thiserror::Error;

use crate::bitbuffer::{BitBuffer, BitOrder};
use crate::header::{Header, HEADER_BITS, INIT_CODE_WIDTH, RESET_CODE};

/// Error type for decoding failures. Any of these means the input is not a
/// valid compress(1) stream; partial output is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The input is shorter than the 3-byte header.
    #[error("truncated compress(1) header ({len} bytes)")]
    TruncatedHeader { len: usize },
    /// The input does not start with `1f 9d`.
    #[error("invalid compress(1) header (expected [1f, 9d], got {found:02x?})")]
    BadMagic { found: [u8; 2] },
    /// The header declares a max code width of 0. Widths 1-8 are accepted
    /// and decode with 9-bit codes throughout.
    #[error("unsupported max code width {0} in header")]
    InvalidMaxCodeWidth(u8),
    /// A code is neither in the dictionary nor the next code to be assigned.
    #[error("({code} != {expected}) input may be corrupt at bit {bit_offset}")]
    InvalidCode {
        code: u32,
        expected: u32,
        bit_offset: usize,
    },
}

/// The scaling LZW decompressor.
///
/// All settings come from the stream header, so the decoder itself carries
/// no state.
///
/// # Example
/// ```
/// use lzw::{Decoder, Encoder};
///
/// let compressed = Encoder::default().compress(b"banana bandana").unwrap();
/// let data = Decoder::decompress(&compressed).unwrap();
/// assert_eq!(data, b"banana bandana");
/// ```
pub struct Decoder;

impl Decoder {
    /// Decompresses a complete stream, header included.
    pub fn decompress(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let buf = BitBuffer::from_bytes(data.to_vec(), BitOrder::Lsb0);
        let header = Header::read(&buf)?;
        let mut session = Session::new(buf, header);
        session.run()?;
        debug!(
            "decompressed {} bytes into {} bytes",
            data.len(),
            session.out.len()
        );
        Ok(session.out)
    }
}

/// A dictionary entry: the code of the word minus its last byte, the last
/// byte, and the first byte.
#[derive(Debug, Clone, Copy)]
struct Entry {
    prefix: Option<u32>,
    last: u8,
    first: u8,
}

/// Code-to-string dictionary, rebuilt from the codes read so far. Codes
/// below 256 are the implicit single-byte words.
#[derive(Debug)]
struct Dictionary {
    entries: Vec<Entry>,
    first_code: u32,
    /// One past the largest code the encoder can assign. Never below the
    /// 9-bit code space, which a stream always starts with.
    limit: u32,
}

impl Dictionary {
    fn new(header: Header) -> Self {
        Self {
            entries: Vec::new(),
            first_code: header.first_code(),
            limit: 1 << header.max_code_width.max(INIT_CODE_WIDTH),
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    fn next_code(&self) -> u32 {
        self.first_code + self.entries.len() as u32
    }

    #[inline]
    fn get(&self, code: u32) -> Option<Entry> {
        if code < 256 {
            let byte = code as u8;
            return Some(Entry {
                prefix: None,
                last: byte,
                first: byte,
            });
        }
        let index = code.checked_sub(self.first_code)?;
        self.entries.get(index as usize).copied()
    }

    #[inline]
    fn push(&mut self, entry: Entry) {
        if self.next_code() < self.limit {
            self.entries.push(entry);
        }
    }

    /// Appends the word for `code` to `out`. `code` must be present.
    fn expand(&self, code: u32, out: &mut Vec<u8>) {
        let start = out.len();
        let mut next = Some(code);
        while let Some(entry) = next.and_then(|code| self.get(code)) {
            out.push(entry.last);
            next = entry.prefix;
        }
        out[start..].reverse();
    }
}

/// Working state of a single decompression call.
#[derive(Debug)]
struct Session {
    header: Header,
    buf: BitBuffer,
    /// Next bit position to read.
    pos: usize,
    dict: Dictionary,
    code_width: u8,
    out: Vec<u8>,
}

impl Session {
    fn new(buf: BitBuffer, header: Header) -> Self {
        let capacity = buf.len_bytes() * 3;
        Self {
            header,
            buf,
            pos: HEADER_BITS,
            dict: Dictionary::new(header),
            code_width: INIT_CODE_WIDTH,
            out: Vec::with_capacity(capacity),
        }
    }

    fn run(&mut self) -> Result<(), DecodeError> {
        let Some(mut seen) = self.start()? else {
            return Ok(());
        };

        while let Some(code) = self.read_code() {
            if self.header.block_mode && code == RESET_CODE {
                debug!("reset at bit {}", self.pos - self.code_width as usize);
                self.reset();
                match self.start()? {
                    Some(code) => {
                        seen = code;
                        continue;
                    }
                    None => break,
                }
            }

            let first = match self.dict.get(code) {
                Some(entry) => {
                    self.dict.expand(code, &mut self.out);
                    entry.first
                }
                // The encoder used the word it registered right before
                // emitting this code: seen + first byte of seen.
                None if code == self.dict.next_code() => {
                    let first = self.first_byte(seen);
                    self.dict.expand(seen, &mut self.out);
                    self.out.push(first);
                    first
                }
                None => return Err(self.invalid(code)),
            };

            self.dict.push(Entry {
                prefix: Some(seen),
                last: first,
                first: self.first_byte(seen),
            });
            seen = code;

            if self.dict.next_code() >= 1 << self.code_width
                && self.code_width < self.header.max_code_width
            {
                self.code_width += 1;
                debug!(
                    "code width up to {} for code {} at bit {}",
                    self.code_width,
                    self.dict.next_code(),
                    self.pos
                );
            }
        }
        Ok(())
    }

    /// Reads the first code after the header or a reset. It must be a
    /// single-byte word.
    fn start(&mut self) -> Result<Option<u32>, DecodeError> {
        let Some(code) = self.read_code() else {
            return Ok(None);
        };
        if code >= 256 {
            return Err(self.invalid(code));
        }
        self.out.push(code as u8);
        Ok(Some(code))
    }

    #[inline]
    fn read_code(&mut self) -> Option<u32> {
        let code = self.buf.get_int(self.pos, self.code_width)?;
        self.pos += self.code_width as usize;
        Some(code)
    }

    #[inline]
    fn first_byte(&self, code: u32) -> u8 {
        self.dict.get(code).map_or(0, |entry| entry.first)
    }

    fn reset(&mut self) {
        self.dict.clear();
        self.code_width = INIT_CODE_WIDTH;
    }

    /// Error for `code`, which was just read.
    fn invalid(&self, code: u32) -> DecodeError {
        DecodeError::InvalidCode {
            code,
            expected: self.dict.next_code(),
            bit_offset: self.pos - self.code_width as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{Config, Encoder};

    /// Builds a stream from a header and `(width, code)` pairs.
    fn stream(header: Header, codes: &[(u8, u32)]) -> Vec<u8> {
        let mut buf = BitBuffer::new(BitOrder::Lsb0);
        let mut pos = header.write(&mut buf).unwrap();
        for &(width, code) in codes {
            buf.set_int(pos, width, code).unwrap();
            pos += width as usize;
        }
        buf.into_bytes()
    }

    fn block_header() -> Header {
        Header {
            max_code_width: 16,
            block_mode: true,
        }
    }

    fn session(data: Vec<u8>) -> Session {
        let buf = BitBuffer::from_bytes(data, BitOrder::Lsb0);
        let header = Header::read(&buf).unwrap();
        Session::new(buf, header)
    }

    #[test]
    fn test_known_codes() {
        let header = Header {
            max_code_width: 16,
            block_mode: false,
        };
        let codes: Vec<(u8, u32)> = b"TOBEORNOT"
            .iter()
            .map(|&b| u32::from(b))
            .chain([256, 258, 260, 265, 259, 261, 263])
            .map(|code| (9, code))
            .collect();
        let out = Decoder::decompress(&stream(header, &codes)).unwrap();
        assert_eq!(out, b"TOBEORNOTTOBEORTOBEORNOT");
    }

    #[test]
    fn test_kwkwk() {
        // "aaaa" is a, then the not yet registered "aa", then a.
        let out = Decoder::decompress(&stream(block_header(), &[(9, 97), (9, 257), (9, 97)]));
        assert_eq!(out.unwrap(), b"aaaa");
    }

    #[test]
    fn test_small_max_width_stays_at_nine_bits() {
        let header = Header {
            max_code_width: 5,
            block_mode: false,
        };
        // 300 codes at 9 bits: the dictionary fills to 512 but never widens.
        let mut codes = vec![(9, 97), (9, 256)];
        codes.extend((0..298u32).map(|i| (9, i % 256)));
        let out = Decoder::decompress(&stream(header, &codes)).unwrap();

        let mut expected = b"aaa".to_vec();
        expected.extend((0..298u32).map(|i| (i % 256) as u8));
        assert_eq!(out, expected);

        let mut s = session(stream(header, &codes));
        s.run().unwrap();
        assert_eq!(s.code_width, 9);
        assert_eq!(s.dict.next_code(), 512);
    }

    #[test]
    fn test_header_only() {
        assert_eq!(Decoder::decompress(&[0x1F, 0x9D, 0x90]), Ok(vec![]));
    }

    #[test]
    fn test_code_beyond_next_is_rejected() {
        let data = stream(block_header(), &[(9, 97), (9, 300)]);
        assert_eq!(
            Decoder::decompress(&data),
            Err(DecodeError::InvalidCode {
                code: 300,
                expected: 257,
                bit_offset: 33,
            })
        );
    }

    #[test]
    fn test_first_code_must_be_a_byte() {
        let data = stream(block_header(), &[(9, 256)]);
        assert_eq!(
            Decoder::decompress(&data),
            Err(DecodeError::InvalidCode {
                code: 256,
                expected: 257,
                bit_offset: 24,
            })
        );
    }

    #[test]
    fn test_reset_code_restores_initial_state() {
        let data = stream(
            block_header(),
            &[(9, 97), (9, 98), (9, 257), (9, RESET_CODE), (9, 99), (9, 97)],
        );
        let mut s = session(data);

        let seen = s.start().unwrap().unwrap();
        assert_eq!(seen, 97);
        for _ in 0..2 {
            let code = s.read_code().unwrap();
            let first = s.dict.get(code).unwrap().first;
            s.dict.expand(code, &mut s.out);
            s.dict.push(Entry {
                prefix: Some(seen),
                last: first,
                first: 0,
            });
        }
        assert_eq!(s.dict.next_code(), 259);

        assert_eq!(s.read_code(), Some(RESET_CODE));
        s.reset();
        assert_eq!(s.dict.next_code(), 257);
        assert_eq!(s.code_width, 9);
        assert!(s.dict.get(257).is_none());
    }

    #[test]
    fn test_reset_in_stream() {
        let data = stream(
            block_header(),
            &[
                (9, 97),
                (9, 98),
                (9, 257),
                (9, RESET_CODE),
                (9, 99),
                (9, 97),
                (9, 257),
            ],
        );
        // After the reset 257 is "ca", not "ab".
        assert_eq!(Decoder::decompress(&data).unwrap(), b"ababcaca");
    }

    #[test]
    fn test_reset_at_end_of_stream() {
        let data = stream(block_header(), &[(9, 97), (9, RESET_CODE)]);
        assert_eq!(Decoder::decompress(&data).unwrap(), b"a");
    }

    #[test]
    fn test_reset_code_is_literal_without_block_mode() {
        let header = Header {
            max_code_width: 16,
            block_mode: false,
        };
        // 256 is the first assignable code: "a" + "a".
        let data = stream(header, &[(9, 97), (9, 256)]);
        assert_eq!(Decoder::decompress(&data).unwrap(), b"aaa");
    }

    #[test]
    fn test_reset_after_width_growth() {
        // Fill past 512 entries so the decoder widens to 10 bits, then reset
        // and check it reads 9-bit codes again and widens at 512 again.
        let mut codes = vec![(9, 0)];
        let mut next = 257;
        let mut width = 9;
        for i in 1..400u32 {
            codes.push((width, i % 256));
            next += 1;
            if next >= 1 << width {
                width += 1;
            }
        }
        assert_eq!(width, 10);
        codes.push((width, RESET_CODE));
        codes.push((9, 1));
        width = 9;
        next = 257;
        for i in 0..300u32 {
            codes.push((width, i % 256));
            next += 1;
            if next >= 1 << width {
                width += 1;
            }
        }
        assert_eq!(width, 10);
        codes.push((width, 300));

        let out = Decoder::decompress(&stream(block_header(), &codes)).unwrap();
        let mut expected: Vec<u8> = (0..400u32).map(|i| (i % 256) as u8).collect();
        expected.push(1);
        expected.extend((0..300u32).map(|i| (i % 256) as u8));
        // Code 300 was registered after reading byte 43: prefix 42, byte 43.
        expected.extend([42, 43]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_encoder_streams_decode() {
        for block_mode in [false, true] {
            for max_code_width in [9, 10, 16, 31] {
                let config = Config {
                    block_mode,
                    max_code_width,
                };
                let data = b"she sells sea shells by the sea shore. ".repeat(300);
                let compressed = Encoder::new(config).unwrap().compress(&data).unwrap();
                assert_eq!(Decoder::decompress(&compressed).unwrap(), data);
            }
        }
    }
}
