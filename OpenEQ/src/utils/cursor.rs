//! Bounds-checked little-endian reader over an in-memory buffer
//!
//! Both container formats declare their own record sizes, so the cursor
//! allows absolute repositioning and never advances past a failed read.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Sequential/random-access reader over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

macro_rules! read_run {
    ($(#[$doc:meta])* $name:ident, $single:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&mut self, count: usize) -> Result<Vec<$ty>> {
            let mut out = Vec::with_capacity(count.min(self.remaining()));
            for _ in 0..count {
                out.push(self.$single()?);
            }
            Ok(out)
        }
    };
}

impl<'a> ByteCursor<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current absolute position
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to an absolute position. Positions past the end are allowed;
    /// the next read fails with [`Error::Truncated`].
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Advance by `count` bytes without reading them
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    /// Bytes left between the position and the end of the buffer
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read `count` bytes and advance
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if count > available {
            return Err(Error::Truncated {
                offset: self.pos,
                requested: count,
                available,
            });
        }
        let bytes = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    /// Read three consecutive floats
    pub fn read_vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    read_run!(
        /// Read a run of `count` unsigned 16-bit integers
        read_u16_n, read_u16, u16
    );
    read_run!(
        /// Read a run of `count` signed 16-bit integers
        read_i16_n, read_i16, i16
    );
    read_run!(
        /// Read a run of `count` unsigned 32-bit integers
        read_u32_n, read_u32, u32
    );
    read_run!(
        /// Read a run of `count` signed 32-bit integers
        read_i32_n, read_i32, i32
    );
    read_run!(
        /// Read a run of `count` floats
        read_f32_n, read_f32, f32
    );
}
