//! CAF file muxer implementation

use super::chunks::{CafDescription, PacketEntry, PacketTable};
use super::{ChunkHeader, CAFF_MAGIC, CAF_VERSION, CHAN_CHUNK, DATA_CHUNK, DESC_CHUNK, KUKI_CHUNK, PAKT_CHUNK};
use crate::error::{Error, Result};
use crate::format::{
    ChannelLayout, FileType, Muxer, MuxerContext, PacketBatch, PacketTableInfo, Property,
    StreamFormat,
};
use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

/// CAF file muxer.
///
/// The data chunk is written as packets arrive. Cookie, channel layout and
/// packet table are cached and appended after it on finalize, so setting a
/// property twice keeps only the last value.
pub struct CafMuxer {
    writer: BufWriter<File>,
    context: MuxerContext,
    data_size_position: u64,
    data_size: u64,
    entries: Vec<PacketEntry>,
    magic_cookie: Option<Bytes>,
    channel_layout: Option<ChannelLayout>,
    packet_table_info: Option<PacketTableInfo>,
}

impl CafMuxer {
    /// Whether CAF can hold packets of `format`
    pub fn supports(format: &StreamFormat) -> bool {
        format.validate().is_ok() && CafDescription::from_stream_format(format).is_ok()
    }

    /// Create the file and write the header, `desc` chunk and the start of
    /// the `data` chunk
    pub fn create(path: &Path, format: &StreamFormat) -> Result<Self> {
        format.validate()?;
        let description = CafDescription::from_stream_format(format)?;

        let file = File::create(path)
            .map_err(|e| Error::format(format!("Failed to create CAF file: {}", e)))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(CAFF_MAGIC)?;
        writer.write_u16::<BigEndian>(CAF_VERSION)?;
        writer.write_u16::<BigEndian>(0)?;

        let desc = description.to_bytes();
        ChunkHeader::new(DESC_CHUNK, desc.len() as i64).write(&mut writer)?;
        writer.write_all(&desc)?;

        // Size stays -1 until finalize patches it
        let data_size_position = writer.stream_position()? + 4;
        ChunkHeader::new(DATA_CHUNK, -1).write(&mut writer)?;
        writer.write_u32::<BigEndian>(0)?;

        debug!("Created CAF {}: {}", path.display(), format);

        Ok(CafMuxer {
            writer,
            context: MuxerContext::new(FileType::Caf, *format),
            data_size_position,
            data_size: 0,
            entries: Vec::new(),
            magic_cookie: None,
            channel_layout: None,
            packet_table_info: None,
        })
    }

    fn has_variable_packets(&self) -> bool {
        let format = self.context.format();
        format.bytes_per_packet == 0 || format.frames_per_packet == 0
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer
            .write_i64::<BigEndian>(4 + self.data_size as i64)?;
        self.writer.seek(SeekFrom::End(0))?;

        if let Some(cookie) = &self.magic_cookie {
            ChunkHeader::new(KUKI_CHUNK, cookie.len() as i64).write(&mut self.writer)?;
            self.writer.write_all(cookie)?;
        }

        if let Some(layout) = &self.channel_layout {
            ChunkHeader::new(CHAN_CHUNK, layout.len() as i64).write(&mut self.writer)?;
            self.writer.write_all(layout.as_bytes())?;
        }

        if self.has_variable_packets() || self.packet_table_info.is_some() {
            let format = self.context.format();
            let info = self.packet_table_info.unwrap_or_else(|| PacketTableInfo {
                valid_frames: self.context.frames_written() as i64,
                ..Default::default()
            });
            let table = PacketTable {
                number_packets: self.context.packets_written() as i64,
                info,
                entries: std::mem::take(&mut self.entries),
            };
            let body = table.to_bytes(format.bytes_per_packet, format.frames_per_packet);
            ChunkHeader::new(PAKT_CHUNK, body.len() as i64).write(&mut self.writer)?;
            self.writer.write_all(&body)?;
        }

        self.writer
            .flush()
            .map_err(|e| Error::format(format!("Failed to flush writer: {}", e)))?;
        Ok(())
    }
}

impl Muxer for CafMuxer {
    fn file_type(&self) -> FileType {
        FileType::Caf
    }

    fn data_format(&self) -> StreamFormat {
        self.context.format()
    }

    fn write_packets(&mut self, start_packet: u64, batch: &PacketBatch) -> Result<()> {
        self.context.check_write(start_packet, batch)?;

        let format = self.context.format();
        if self.has_variable_packets() {
            for (i, desc) in batch.descriptions().iter().enumerate() {
                let frames = if format.frames_per_packet == 0 {
                    desc.variable_frames
                } else {
                    format.frames_per_packet
                };
                if format.frames_per_packet == 0 && frames == 0 {
                    return Err(Error::invalid_input(format!(
                        "Packet {} has no frame count",
                        start_packet + i as u64
                    )));
                }
                self.entries.push(PacketEntry {
                    byte_size: desc.data_byte_size,
                    frames,
                });
            }
        }

        self.writer
            .write_all(batch.data().as_slice())
            .map_err(|e| Error::format(format!("Failed to write packet data: {}", e)))?;
        self.data_size += batch.data().len() as u64;
        self.context.record_write(batch);
        Ok(())
    }

    fn set_property(&mut self, property: &Property) -> Result<()> {
        if self.context.is_finalized() {
            return Err(Error::invalid_state("Muxer already finalized"));
        }
        match property {
            Property::MagicCookie(cookie) => self.magic_cookie = Some(cookie.clone()),
            Property::ChannelLayout(layout) => self.channel_layout = Some(layout.clone()),
            Property::PacketTableInfo(info) => {
                if info.valid_frames < 0 || info.priming_frames < 0 || info.remainder_frames < 0
                {
                    return Err(Error::invalid_input(format!(
                        "Negative frame counts in packet table info: {:?}",
                        info
                    )));
                }
                self.packet_table_info = Some(*info);
            }
        }
        Ok(())
    }

    fn packets_written(&self) -> u64 {
        self.context.packets_written()
    }

    fn finalize(&mut self) -> Result<()> {
        if self.context.is_finalized() {
            return Ok(());
        }
        self.context.set_finalized();
        self.write_trailer()
    }
}

impl Drop for CafMuxer {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            warn!("Failed to finalize CAF file on drop: {}", e);
        }
    }
}
