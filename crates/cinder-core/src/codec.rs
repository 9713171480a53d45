//! Canonical wire codec: big-endian fixed-width integers and the
//! variable-length unsigned integer used for counts and amounts.
//!
//! Varuint layout: a first byte below `0xFC` encodes itself; `0xFC` is
//! followed by a u16, `0xFD` by a u32, `0xFE` by a u64 and `0xFF` by a
//! u128. Encoding always chooses the smallest prefix that fits.

use crate::error::CodecError;

/// Growable write buffer for canonical encoding.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    /// Consume the writer and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u128(&mut self, v: u128) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a varuint with the smallest prefix that fits `v`.
    pub fn write_varuint(&mut self, v: u128) {
        if v < 0xFC {
            self.write_u8(v as u8);
        } else if v <= u16::MAX as u128 {
            self.write_u8(0xFC);
            self.write_u16(v as u16);
        } else if v <= u32::MAX as u128 {
            self.write_u8(0xFD);
            self.write_u32(v as u32);
        } else if v <= u64::MAX as u128 {
            self.write_u8(0xFE);
            self.write_u64(v as u64);
        } else {
            self.write_u8(0xFF);
            self.write_u128(v);
        }
    }
}

/// Positional reader over an encoded byte slice.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEnd { wanted: n, remaining: self.remaining() });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_u128(&mut self) -> Result<u128, CodecError> {
        Ok(u128::from_be_bytes(self.read_array()?))
    }

    pub fn read_varuint(&mut self) -> Result<u128, CodecError> {
        let first = self.read_u8()?;
        match first {
            0xFC => Ok(self.read_u16()? as u128),
            0xFD => Ok(self.read_u32()? as u128),
            0xFE => Ok(self.read_u64()? as u128),
            0xFF => self.read_u128(),
            b => Ok(b as u128),
        }
    }

    /// Read a varuint that must fit in a u64 (amounts, counts).
    pub fn read_varuint_u64(&mut self) -> Result<u64, CodecError> {
        u64::try_from(self.read_varuint()?).map_err(|_| CodecError::VarintOverflow)
    }
}
