//! Bounds-checked little-endian reads at absolute offsets
//!
//! Every format in this crate addresses its input by absolute byte position
//! rather than by streaming. [`ByteReader`] wraps an immutable slice and turns
//! every out-of-range access into an [`OutOfBounds`] error, so corrupt or
//! adversarial offsets never panic.

use binrw::BinRead;
use std::io::Cursor;
use thiserror::Error;

/// A read that would fall outside the underlying buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("read of {len} bytes at offset {offset:#x} exceeds buffer of {size} bytes")]
pub struct OutOfBounds {
    /// Requested start offset
    pub offset: u64,
    /// Requested length in bytes
    pub len: u64,
    /// Size of the buffer that was read
    pub size: usize,
}

/// Errors produced when reading a fixed-layout record through the cursor
#[derive(Debug, Error)]
pub enum RecordError {
    /// The record would extend past the end of the buffer
    #[error(transparent)]
    OutOfBounds(#[from] OutOfBounds),

    /// The record's magic or an asserted field did not match
    #[error("malformed record at offset {offset:#x}: {reason}")]
    Malformed {
        /// Offset the record was read from
        offset: usize,
        /// Description from the record parser
        reason: String,
    },
}

/// Immutable, bounds-checked view over a byte buffer
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
}

macro_rules! read_le {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Read a little-endian `", stringify!($ty), "` at `offset`")]
            pub fn $name(&self, offset: usize) -> Result<$ty, OutOfBounds> {
                let bytes = self.read_array::<{ std::mem::size_of::<$ty>() }>(offset)?;
                Ok(<$ty>::from_le_bytes(bytes))
            }
        )*
    };
}

impl<'a> ByteReader<'a> {
    /// Wrap a buffer
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Total buffer length
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole underlying buffer
    pub const fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Check that `len` bytes starting at `offset` are addressable
    pub fn check(&self, offset: usize, len: usize) -> Result<(), OutOfBounds> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(self.out_of_bounds(offset, len)),
        }
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], OutOfBounds> {
        self.check(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    /// Copy a fixed-size array starting at `offset`
    pub fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], OutOfBounds> {
        let bytes = self.read_bytes(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read a single byte
    pub fn read_u8(&self, offset: usize) -> Result<u8, OutOfBounds> {
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| self.out_of_bounds(offset, 1))
    }

    /// Read a single signed byte
    pub fn read_i8(&self, offset: usize) -> Result<i8, OutOfBounds> {
        self.read_u8(offset).map(|b| b as i8)
    }

    read_le! {
        read_u16 => u16,
        read_i16 => i16,
        read_u32 => u32,
        read_i32 => i32,
        read_u64 => u64,
        read_i64 => i64,
        read_f32 => f32,
        read_f64 => f64,
    }

    /// Read a fixed-layout little-endian record at `offset`
    ///
    /// `size` is the record's on-disk size; the window is checked before the
    /// record parser runs so a truncated record is reported as
    /// [`RecordError::OutOfBounds`] rather than a parser failure.
    pub fn read_record<T>(&self, offset: usize, size: usize) -> Result<T, RecordError>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        let window = self.read_bytes(offset, size)?;
        T::read_le(&mut Cursor::new(window)).map_err(|e| RecordError::Malformed {
            offset,
            reason: e.to_string(),
        })
    }

    fn out_of_bounds(&self, offset: usize, len: usize) -> OutOfBounds {
        OutOfBounds {
            offset: offset as u64,
            len: len as u64,
            size: self.data.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_reads() {
        let data = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x00, 0x00, 0x80, 0x3F,
        ];
        let reader = ByteReader::new(&data);

        assert_eq!(reader.read_u8(0).unwrap(), 0x01);
        assert_eq!(reader.read_u16(0).unwrap(), 0x0201);
        assert_eq!(reader.read_u32(0).unwrap(), 0x0403_0201);
        assert_eq!(reader.read_u64(0).unwrap(), 0x0807_0605_0403_0201);
        assert_eq!(reader.read_f32(8).unwrap(), 1.0);
        assert_eq!(reader.read_i8(10).unwrap(), -128);
    }

    #[test]
    fn test_out_of_bounds() {
        let data = [0u8; 4];
        let reader = ByteReader::new(&data);

        assert!(reader.read_u32(0).is_ok());
        let err = reader.read_u32(1).unwrap_err();
        assert_eq!(
            err,
            OutOfBounds {
                offset: 1,
                len: 4,
                size: 4
            }
        );
        assert!(reader.read_u8(4).is_err());
        assert!(reader.read_bytes(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_read_bytes_borrows() {
        let data = b"abcdef";
        let reader = ByteReader::new(data);
        assert_eq!(reader.read_bytes(2, 3).unwrap(), b"cde");
        assert_eq!(reader.read_bytes(6, 0).unwrap(), b"");
    }
}
