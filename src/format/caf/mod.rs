//! Core Audio Format (CAF) support
//!
//! CAF files are big endian. After the 8-byte file header comes a sequence of
//! chunks, each with a four-character type and a signed 64-bit size. The
//! reader and writer here handle the chunks a converted stream needs:
//! `desc`, `kuki`, `chan`, `pakt` and `data`.

pub mod chunks;
pub mod demuxer;
pub mod muxer;

pub use chunks::{CafDescription, PacketTable};
pub use demuxer::CafDemuxer;
pub use muxer::CafMuxer;

use crate::error::{Error, Result};
use crate::util::FourCC;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const CAFF_MAGIC: &[u8; 4] = b"caff";
pub const CAF_VERSION: u16 = 1;

pub const DESC_CHUNK: FourCC = FourCC::new(b"desc");
pub const DATA_CHUNK: FourCC = FourCC::new(b"data");
pub const KUKI_CHUNK: FourCC = FourCC::new(b"kuki");
pub const CHAN_CHUNK: FourCC = FourCC::new(b"chan");
pub const PAKT_CHUNK: FourCC = FourCC::new(b"pakt");

/// Chunk header (4 byte type + 8 byte size)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: FourCC,
    /// Size of the chunk body; -1 only for a data chunk running to end of file
    pub size: i64,
}

impl ChunkHeader {
    pub const SIZE: u64 = 12;

    pub fn new(chunk_type: FourCC, size: i64) -> Self {
        ChunkHeader { chunk_type, size }
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let chunk_type = FourCC(reader.read_u32::<BigEndian>()?);
        let size = reader.read_i64::<BigEndian>()?;
        Ok(ChunkHeader { chunk_type, size })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(self.chunk_type.0)?;
        writer.write_i64::<BigEndian>(self.size)?;
        Ok(())
    }
}

/// Append a CAF variable-length integer: big-endian groups of 7 bits, the
/// high bit set on every byte but the last
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    let mut groups = [0u8; 10];
    let mut count = 0;
    loop {
        groups[count] = (value & 0x7F) as u8;
        count += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let more = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | more);
    }
}

/// Decode a CAF variable-length integer, advancing `pos`
pub fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    for _ in 0..10 {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| Error::format("Truncated packet table entry"))?;
        *pos += 1;
        value = (value << 7) | (byte & 0x7F) as u64;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Error::format("Packet table entry longer than 64 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_varint_encoding() {
        let mut out = Vec::new();
        write_varint(&mut out, 0);
        write_varint(&mut out, 127);
        write_varint(&mut out, 128);
        write_varint(&mut out, 4096);
        assert_eq!(out, vec![0x00, 0x7F, 0x81, 0x00, 0xA0, 0x00]);

        let mut pos = 0;
        assert_eq!(read_varint(&out, &mut pos).unwrap(), 0);
        assert_eq!(read_varint(&out, &mut pos).unwrap(), 127);
        assert_eq!(read_varint(&out, &mut pos).unwrap(), 128);
        assert_eq!(read_varint(&out, &mut pos).unwrap(), 4096);
        assert_eq!(pos, out.len());
    }

    #[test]
    fn test_varint_truncated() {
        let mut pos = 0;
        assert!(read_varint(&[0x81], &mut pos).is_err());
    }

    #[test]
    fn test_chunk_header() {
        let mut out = Vec::new();
        ChunkHeader::new(DATA_CHUNK, -1).write(&mut out).unwrap();
        assert_eq!(out.len() as u64, ChunkHeader::SIZE);
        assert_eq!(&out[0..4], b"data");

        let header = ChunkHeader::read(&mut Cursor::new(out)).unwrap();
        assert_eq!(header.chunk_type, DATA_CHUNK);
        assert_eq!(header.size, -1);
    }
}
