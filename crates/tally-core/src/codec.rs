//! Bitcoin wire-format codec.
//!
//! - [`Parser`] reads from a borrowed byte slice; variable-length fields come
//!   back as slices tied to the buffer's lifetime, so nothing is copied until
//!   the caller asks for it.
//! - [`StreamParser`] reads the same primitives from any [`Read`] source,
//!   pulling bytes on demand. Running out of input mid-value is fatal.
//! - [`Writer`] is the encoding counterpart.
//!
//! Every multi-byte integer is little-endian on the wire. Conversions go
//! through `from_le_bytes`/`to_le_bytes`, which swap only on big-endian hosts.

use std::io::{self, Read};

use crate::constants::{HASH_SIZE, VARINT_MAX};
use crate::error::CodecError;
use crate::types::Hash256;

/// Types with a canonical wire encoding.
pub trait Encode {
    /// Append the wire encoding of `self` to `w`.
    fn encode(&self, w: &mut Writer);
}

/// Types that can be read back from their wire encoding.
pub trait Decode: Sized {
    /// Read one value from the parser, advancing it.
    fn decode(p: &mut Parser<'_>) -> Result<Self, CodecError>;
}

/// Encode a value into a fresh buffer.
pub fn encode_to_vec<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut w = Writer::new();
    value.encode(&mut w);
    w.into_inner()
}

/// Decode a value that must span the whole slice.
pub fn decode_from_slice<T: Decode>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut p = Parser::new(bytes);
    let value = T::decode(&mut p)?;
    if !p.is_empty() {
        return Err(CodecError::TrailingBytes(p.remaining()));
    }
    Ok(value)
}

/// Number of bytes the varint encoding of `n` occupies.
pub fn varint_size(n: u64) -> usize {
    match n {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

fn check_varint(value: u64) -> Result<u64, CodecError> {
    if value > VARINT_MAX {
        return Err(CodecError::VarIntTooLarge(value));
    }
    Ok(value)
}

// ------------------------------------------------------------------
// Slice parser
// ------------------------------------------------------------------

/// Cursor over an in-memory buffer.
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read position.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let available = self.data.len();
        let end = match self.pos.checked_add(n) {
            Some(end) if end <= available => end,
            _ => {
                return Err(CodecError::OutOfBounds {
                    requested: self.pos.saturating_add(n),
                    available,
                });
            }
        };
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Skip `n` bytes without materializing them.
    pub fn seek(&mut self, n: usize) -> Result<(), CodecError> {
        self.bytes(n).map(|_| ())
    }

    /// Re-borrow an absolute range of the underlying buffer.
    ///
    /// Used to hash byte spans that have already been parsed.
    pub fn span(&self, start: usize, end: usize) -> Result<&'a [u8], CodecError> {
        if start > end {
            return Err(CodecError::OutOfBounds { requested: start, available: end });
        }
        self.data.get(start..end).ok_or(CodecError::OutOfBounds {
            requested: end,
            available: self.data.len(),
        })
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        self.array().map(u64::from_le_bytes)
    }

    pub fn i64(&mut self) -> Result<i64, CodecError> {
        self.array().map(i64::from_le_bytes)
    }

    pub fn hash(&mut self) -> Result<Hash256, CodecError> {
        self.array::<HASH_SIZE>().map(Hash256)
    }

    /// Read a varint, rejecting values above [`VARINT_MAX`].
    pub fn varint(&mut self) -> Result<u64, CodecError> {
        let value = match self.u8()? {
            0xFD => u64::from(self.u16()?),
            0xFE => u64::from(self.u32()?),
            0xFF => self.u64()?,
            b => u64::from(b),
        };
        check_varint(value)
    }

    /// Read a varint length and return it as a `usize`.
    pub fn varint_len(&mut self) -> Result<usize, CodecError> {
        // VARINT_MAX fits in usize on every supported target.
        self.varint().map(|v| v as usize)
    }

    /// Read a varint-prefixed byte string.
    pub fn var_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.varint_len()?;
        self.bytes(len)
    }

    /// Decode any [`Decode`] type at the current position.
    pub fn decode<T: Decode>(&mut self) -> Result<T, CodecError> {
        T::decode(self)
    }
}

// ------------------------------------------------------------------
// Streaming parser
// ------------------------------------------------------------------

/// Parser over a streaming source.
///
/// Pulls bytes from the reader as they are needed. Unlike [`Parser`] it
/// cannot lend slices, so variable-length reads return owned buffers.
pub struct StreamParser<R> {
    reader: R,
    position: usize,
}

impl<R: Read> StreamParser<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, position: 0 }
    }

    /// Bytes consumed from the source so far.
    pub fn tell(&self) -> usize {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        let mut read = 0;
        while read < buf.len() {
            match self.reader.read(&mut buf[read..]) {
                Ok(0) => {
                    self.position += read;
                    return Err(CodecError::UnexpectedEof {
                        position: self.position,
                        requested: buf.len() - read,
                    });
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.position += read;
        Ok(())
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        self.fill(&mut out)?;
        Ok(out)
    }

    /// Read `n` bytes into an owned buffer.
    ///
    /// The buffer grows with the data actually read, so a bogus length
    /// cannot force a large up-front allocation.
    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        let got = (&mut self.reader).take(n as u64).read_to_end(&mut out)?;
        self.position += got;
        if got < n {
            return Err(CodecError::UnexpectedEof {
                position: self.position,
                requested: n - got,
            });
        }
        Ok(out)
    }

    /// Skip `n` bytes by reading and discarding them.
    pub fn seek(&mut self, n: usize) -> Result<(), CodecError> {
        let skipped = io::copy(&mut (&mut self.reader).take(n as u64), &mut io::sink())? as usize;
        self.position += skipped;
        if skipped < n {
            return Err(CodecError::UnexpectedEof {
                position: self.position,
                requested: n - skipped,
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        self.array::<1>().map(|b| b[0])
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        self.array().map(u32::from_le_bytes)
    }

    /// Read a u32, or `None` if the source is exhausted before its first byte.
    ///
    /// End of input in the middle of the value is still an error.
    pub fn try_u32(&mut self) -> Result<Option<u32>, CodecError> {
        let Some(first) = self.try_u8()? else {
            return Ok(None);
        };
        let rest: [u8; 3] = self.array()?;
        Ok(Some(u32::from_le_bytes([first, rest[0], rest[1], rest[2]])))
    }

    /// One byte, or `None` at a clean end of input.
    pub fn try_u8(&mut self) -> Result<Option<u8>, CodecError> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.position += 1;
        Ok(Some(byte[0]))
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        self.array().map(u64::from_le_bytes)
    }

    pub fn i64(&mut self) -> Result<i64, CodecError> {
        self.array().map(i64::from_le_bytes)
    }

    pub fn hash(&mut self) -> Result<Hash256, CodecError> {
        self.array::<HASH_SIZE>().map(Hash256)
    }

    pub fn varint(&mut self) -> Result<u64, CodecError> {
        let value = match self.u8()? {
            0xFD => u64::from(self.u16()?),
            0xFE => u64::from(self.u32()?),
            0xFF => self.u64()?,
            b => u64::from(b),
        };
        check_varint(value)
    }

    pub fn var_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.varint()? as usize;
        self.bytes(len)
    }
}

// ------------------------------------------------------------------
// Writer
// ------------------------------------------------------------------

/// Growable buffer for wire encoding.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn i64(&mut self, v: i64) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    pub fn hash(&mut self, h: &Hash256) -> &mut Self {
        self.bytes(h.as_bytes())
    }

    /// Write `n` using the shortest varint form.
    pub fn varint(&mut self, n: u64) -> &mut Self {
        match n {
            0..=0xFC => self.u8(n as u8),
            0xFD..=0xFFFF => self.u8(0xFD).u16(n as u16),
            0x1_0000..=0xFFFF_FFFF => self.u8(0xFE).u32(n as u32),
            _ => self.u8(0xFF).u64(n),
        }
    }

    pub fn var_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.varint(data.len() as u64).bytes(data)
    }

    pub fn put<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.encode(self);
        self
    }
}
