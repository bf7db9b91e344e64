//! WAV file demuxer implementation

use super::header::WavHeader;
use crate::error::{Error, Result};
use crate::format::{
    ChannelLayout, Demuxer, DemuxerContext, FileType, PacketDescription, PacketTableInfo,
    StreamFormat,
};
use crate::util::PacketBuffer;
use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// WAV demuxer. Every frame is one packet.
pub struct WavDemuxer {
    reader: BufReader<File>,
    context: DemuxerContext,
    header: WavHeader,
}

impl WavDemuxer {
    /// Open and parse a WAV file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::format(format!("Failed to open WAV file: {}", e)))?;

        let mut reader = BufReader::new(file);
        let header = WavHeader::read(&mut reader)?;
        let format = header.format.to_stream_format()?;

        let mut context = DemuxerContext::new(FileType::Wav, format);
        context.set_packet_count(header.num_frames());

        debug!(
            "Opened WAV {}: {}, {} frames",
            path.display(),
            format,
            header.num_frames()
        );

        Ok(WavDemuxer {
            reader,
            context,
            header,
        })
    }

    /// Get the parsed header
    pub fn header(&self) -> &WavHeader {
        &self.header
    }
}

impl Demuxer for WavDemuxer {
    fn file_type(&self) -> FileType {
        FileType::Wav
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
        _descs: &mut Vec<PacketDescription>,
    ) -> Result<usize> {
        let count = self
            .context
            .constant_read_count(start_packet, max_packets, buf.remaining())?;
        if count == 0 {
            return Ok(0);
        }

        let block_align = self.header.format.block_align as u64;
        let offset = self.header.data_start + start_packet * block_align;
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| Error::format(format!("Failed to seek: {}", e)))?;

        let slot = buf.append_zeroed(count * block_align as usize)?;
        self.reader
            .read_exact(slot)
            .map_err(|e| Error::format(format!("Failed to read audio data: {}", e)))?;

        Ok(count)
    }

    fn magic_cookie(&self) -> Option<Bytes> {
        None
    }

    fn channel_layout(&self) -> Option<ChannelLayout> {
        None
    }

    fn packet_table_info(&self) -> Option<PacketTableInfo> {
        None
    }
}
