use std::io::{self, Write};

/// Byte order of the multi-byte integers in a map file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Header byte for little-endian writers
    pub const LITTLE_TAG: u8 = 0x01;
    /// Header byte for big-endian writers
    pub const BIG_TAG: u8 = 0x02;

    /// Byte order of the running platform
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            Self::LITTLE_TAG => Some(ByteOrder::Little),
            Self::BIG_TAG => Some(ByteOrder::Big),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            ByteOrder::Little => Self::LITTLE_TAG,
            ByteOrder::Big => Self::BIG_TAG,
        }
    }

    /// Write a u16 in this byte order
    pub fn write_u16<W: Write>(self, writer: &mut W, value: u16) -> io::Result<()> {
        match self {
            ByteOrder::Little => writer.write_all(&value.to_le_bytes()),
            ByteOrder::Big => writer.write_all(&value.to_be_bytes()),
        }
    }

    /// Write a u32 in this byte order
    pub fn write_u32<W: Write>(self, writer: &mut W, value: u32) -> io::Result<()> {
        match self {
            ByteOrder::Little => writer.write_all(&value.to_le_bytes()),
            ByteOrder::Big => writer.write_all(&value.to_be_bytes()),
        }
    }
}

/// Bounds-checked reader over a byte slice.
///
/// Every read returns `None` instead of panicking once the slice runs out,
/// which is how truncated files are detected.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self { buf, pos: 0, order }
    }

    /// Take the next `len` bytes
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        let bytes: [u8; 2] = self.take(2)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(ByteOrder::from_tag(0x01), Some(ByteOrder::Little));
        assert_eq!(ByteOrder::from_tag(0x02), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::from_tag(0x00), None);
        assert_eq!(ByteOrder::from_tag(ByteOrder::native().tag()), Some(ByteOrder::native()));
    }

    #[test]
    fn test_big_endian_layout() {
        let mut buf = Vec::new();
        ByteOrder::Big.write_u32(&mut buf, 0x0102_0304).unwrap();
        ByteOrder::Big.write_u16(&mut buf, 0x0506).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);

        let mut reader = ByteReader::new(&buf, ByteOrder::Big);
        assert_eq!(reader.read_u32(), Some(0x0102_0304));
        assert_eq!(reader.read_u16(), Some(0x0506));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut buf = Vec::new();
        ByteOrder::Little.write_u32(&mut buf, 0x0102_0304).unwrap();
        assert_eq!(buf, [4, 3, 2, 1]);
    }

    #[test]
    fn test_short_read() {
        let buf = [1u8, 2, 3];
        let mut reader = ByteReader::new(&buf, ByteOrder::Little);
        assert_eq!(reader.read_u32(), None);
        assert_eq!(reader.read_u16(), Some(0x0201));
        assert_eq!(reader.read_u16(), None);
        assert_eq!(reader.position(), 2);
    }
}
