//! CAF file demuxer implementation

use super::chunks::{CafDescription, PacketTable};
use super::{ChunkHeader, CAFF_MAGIC, CAF_VERSION, CHAN_CHUNK, DATA_CHUNK, DESC_CHUNK, KUKI_CHUNK, PAKT_CHUNK};
use crate::error::{Error, Result};
use crate::format::{
    ChannelLayout, Demuxer, DemuxerContext, FileType, PacketDescription, PacketTableInfo,
    StreamFormat,
};
use crate::util::PacketBuffer;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Location of one variable-size packet inside the data chunk
#[derive(Debug, Clone, Copy)]
struct PacketLocation {
    offset: u64,
    byte_size: u32,
    frames: u32,
}

/// CAF demuxer
pub struct CafDemuxer {
    reader: BufReader<File>,
    context: DemuxerContext,
    /// Offset of the first audio byte, past the edit count
    data_start: u64,
    /// Filled only for streams with variable packet sizes or durations
    packets: Vec<PacketLocation>,
}

impl CafDemuxer {
    /// Open and parse a CAF file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::format(format!("Failed to open CAF file: {}", e)))?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| Error::format(format!("Failed to read CAF header: {}", e)))?;
        if &magic != CAFF_MAGIC {
            return Err(Error::format("Not a valid CAF file"));
        }
        let version = reader.read_u16::<BigEndian>()?;
        let _flags = reader.read_u16::<BigEndian>()?;
        if version != CAF_VERSION {
            return Err(Error::unsupported(format!("CAF version {}", version)));
        }

        let mut description = None;
        let mut cookie = None;
        let mut layout = None;
        let mut pakt = None;
        let mut data = None;

        let mut position = 8u64;
        while position + ChunkHeader::SIZE <= file_len {
            reader.seek(SeekFrom::Start(position))?;
            let header = ChunkHeader::read(&mut reader)?;
            let body_start = position + ChunkHeader::SIZE;

            let size = if header.size < 0 {
                if header.chunk_type != DATA_CHUNK {
                    return Err(Error::format(format!(
                        "Chunk '{}' has an unknown size",
                        header.chunk_type
                    )));
                }
                file_len - body_start
            } else {
                header.size as u64
            };
            if body_start + size > file_len {
                return Err(Error::format(format!(
                    "Chunk '{}' runs past the end of the file",
                    header.chunk_type
                )));
            }

            match header.chunk_type {
                DESC_CHUNK => {
                    let body = read_body(&mut reader, size)?;
                    description = Some(CafDescription::from_bytes(&body)?);
                }
                KUKI_CHUNK => cookie = Some(Bytes::from(read_body(&mut reader, size)?)),
                CHAN_CHUNK => {
                    let body = Bytes::from(read_body(&mut reader, size)?);
                    layout = Some(ChannelLayout::from_bytes(body)?);
                }
                PAKT_CHUNK => pakt = Some(read_body(&mut reader, size)?),
                DATA_CHUNK => {
                    if size < 4 {
                        return Err(Error::format("CAF data chunk missing edit count"));
                    }
                    data = Some((body_start + 4, size - 4));
                }
                other => debug!("Skipping CAF chunk '{}' ({} bytes)", other, size),
            }

            position = body_start + size;
        }

        let description =
            description.ok_or_else(|| Error::format("CAF file has no desc chunk"))?;
        let format = description.to_stream_format()?;
        let (data_start, data_size) =
            data.ok_or_else(|| Error::format("CAF file has no data chunk"))?;

        let mut context = DemuxerContext::new(FileType::Caf, format);
        let table = pakt
            .map(|body| {
                PacketTable::from_bytes(&body, format.bytes_per_packet, format.frames_per_packet)
            })
            .transpose()?;

        let mut packets = Vec::new();
        if format.bytes_per_packet == 0 || format.frames_per_packet == 0 {
            let table = table.as_ref().ok_or_else(|| {
                Error::format("Variable packet CAF file has no pakt chunk")
            })?;

            let mut offset = 0u64;
            let mut upper_bound = 0u32;
            for entry in &table.entries {
                packets.push(PacketLocation {
                    offset,
                    byte_size: entry.byte_size,
                    frames: entry.frames,
                });
                offset += entry.byte_size as u64;
                upper_bound = upper_bound.max(entry.byte_size);
            }
            if offset > data_size {
                return Err(Error::format(format!(
                    "Packet table covers {} bytes but data chunk holds {}",
                    offset, data_size
                )));
            }
            context.set_packet_count(packets.len() as u64);
            if format.bytes_per_packet == 0 {
                context.set_packet_size_upper_bound(upper_bound);
            }
        } else {
            context.set_packet_count(data_size / format.bytes_per_packet as u64);
        }

        if let Some(table) = table {
            context.set_packet_table_info(table.info);
        }
        if let Some(cookie) = cookie {
            context.set_magic_cookie(cookie);
        }
        if let Some(layout) = layout {
            context.set_channel_layout(layout);
        }

        debug!(
            "Opened CAF {}: {}, {} packets",
            path.display(),
            format,
            context.packet_count()
        );

        Ok(CafDemuxer {
            reader,
            context,
            data_start,
            packets,
        })
    }

    fn read_variable_packets(
        &mut self,
        start_packet: u64,
        max_packets: usize,
        buf: &mut PacketBuffer,
        descs: &mut Vec<PacketDescription>,
    ) -> Result<usize> {
        let variable_frames = self.context.format().frames_per_packet == 0;
        let first = start_packet as usize;
        let last = first.saturating_add(max_packets).min(self.packets.len());

        let mut count = 0;
        let mut total = 0usize;
        for location in &self.packets[first..last] {
            if total + location.byte_size as usize > buf.remaining() {
                break;
            }
            total += location.byte_size as usize;
            count += 1;
        }
        if count == 0 {
            return Err(Error::BufferTooSmall {
                need: self.packets[first].byte_size as usize,
                have: buf.remaining(),
            });
        }

        let base = buf.len() as u64;
        let first_offset = self.packets[first].offset;
        self.reader
            .seek(SeekFrom::Start(self.data_start + first_offset))
            .map_err(|e| Error::format(format!("Failed to seek: {}", e)))?;
        let slot = buf.append_zeroed(total)?;
        self.reader
            .read_exact(slot)
            .map_err(|e| Error::format(format!("Failed to read audio data: {}", e)))?;

        for location in &self.packets[first..first + count] {
            descs.push(PacketDescription::new(
                base + location.offset - first_offset,
                location.byte_size,
                if variable_frames { location.frames } else { 0 },
            ));
        }

        Ok(count)
    }
}

fn read_body<R: Read>(reader: &mut R, size: u64) -> Result<Vec<u8>> {
    let mut body = vec![0u8; size as usize];
    reader
        .read_exact(&mut body)
        .map_err(|e| Error::format(format!("Failed to read chunk body: {}", e)))?;
    Ok(body)
}

impl Demuxer for CafDemuxer {
    fn file_type(&self) -> FileType {
        FileType::Caf
    }

    fn data_format(&self) -> StreamFormat {
        self.context.format()
    }

    fn packet_count(&self) -> u64 {
        self.context.packet_count()
    }

    fn packet_size_upper_bound(&self) -> u32 {
        self.context.packet_size_upper_bound()
    }

    fn read_packets(
        &mut self,
        start_packet: u64,
        max_packets: usize,
        buf: &mut PacketBuffer,
        descs: &mut Vec<PacketDescription>,
    ) -> Result<usize> {
        if start_packet >= self.context.packet_count() {
            return Err(Error::EndOfStream);
        }
        if max_packets == 0 {
            return Ok(0);
        }
        if !self.packets.is_empty() {
            return self.read_variable_packets(start_packet, max_packets, buf, descs);
        }

        let count = self
            .context
            .constant_read_count(start_packet, max_packets, buf.remaining())?;
        let stride = self.context.format().bytes_per_packet as u64;
        self.reader
            .seek(SeekFrom::Start(self.data_start + start_packet * stride))
            .map_err(|e| Error::format(format!("Failed to seek: {}", e)))?;
        let slot = buf.append_zeroed(count * stride as usize)?;
        self.reader
            .read_exact(slot)
            .map_err(|e| Error::format(format!("Failed to read audio data: {}", e)))?;

        Ok(count)
    }

    fn magic_cookie(&self) -> Option<Bytes> {
        self.context.magic_cookie()
    }

    fn channel_layout(&self) -> Option<ChannelLayout> {
        self.context.channel_layout()
    }

    fn packet_table_info(&self) -> Option<PacketTableInfo> {
        self.context.packet_table_info()
    }
}
