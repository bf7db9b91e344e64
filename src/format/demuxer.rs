//! Demuxer for reading packets out of audio containers

use super::{ChannelLayout, FileType, PacketDescription, PacketTableInfo, StreamFormat};
use crate::error::{Error, Result};
use crate::util::PacketBuffer;
use bytes::Bytes;

/// Demuxer trait for reading audio containers with random packet access
pub trait Demuxer {
    /// Container type of the open file
    fn file_type(&self) -> FileType;

    /// Format of the stored packets
    fn data_format(&self) -> StreamFormat;

    /// Number of packets in the file
    fn packet_count(&self) -> u64;

    /// Size in bytes of the largest packet in the file
    fn packet_size_upper_bound(&self) -> u32;

    /// Read up to `max_packets` packets starting at `start_packet`.
    ///
    /// Packet bytes are appended to `buf`; for VBR formats one descriptor per
    /// packet is appended to `descs`, with offsets relative to the start of
    /// `buf`. Only whole packets that fit in the buffer are read. Returns
    /// `Error::EndOfStream` when `start_packet` is at or past the last packet.
    fn read_packets(
        &mut self,
        start_packet: u64,
        max_packets: usize,
        buf: &mut PacketBuffer,
        descs: &mut Vec<PacketDescription>,
    ) -> Result<usize>;

    /// Codec configuration stored with the file
    fn magic_cookie(&self) -> Option<Bytes>;

    /// Channel layout stored with the file
    fn channel_layout(&self) -> Option<ChannelLayout>;

    /// Priming and remainder frames stored with the file
    fn packet_table_info(&self) -> Option<PacketTableInfo>;
}

/// State shared by every demuxer once a file has been parsed
#[derive(Debug, Clone)]
pub struct DemuxerContext {
    file_type: FileType,
    format: StreamFormat,
    packet_count: u64,
    packet_size_upper_bound: u32,
    magic_cookie: Option<Bytes>,
    channel_layout: Option<ChannelLayout>,
    packet_table_info: Option<PacketTableInfo>,
}

impl DemuxerContext {
    /// Create a new demuxer context
    pub fn new(file_type: FileType, format: StreamFormat) -> Self {
        DemuxerContext {
            file_type,
            format,
            packet_count: 0,
            packet_size_upper_bound: format.bytes_per_packet,
            magic_cookie: None,
            channel_layout: None,
            packet_table_info: None,
        }
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn set_packet_count(&mut self, count: u64) {
        self.packet_count = count;
    }

    pub fn packet_size_upper_bound(&self) -> u32 {
        self.packet_size_upper_bound
    }

    pub fn set_packet_size_upper_bound(&mut self, size: u32) {
        self.packet_size_upper_bound = size;
    }

    pub fn magic_cookie(&self) -> Option<Bytes> {
        self.magic_cookie.clone()
    }

    pub fn set_magic_cookie(&mut self, cookie: Bytes) {
        self.magic_cookie = Some(cookie);
    }

    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        self.channel_layout.clone()
    }

    pub fn set_channel_layout(&mut self, layout: ChannelLayout) {
        self.channel_layout = Some(layout);
    }

    pub fn packet_table_info(&self) -> Option<PacketTableInfo> {
        self.packet_table_info
    }

    pub fn set_packet_table_info(&mut self, info: PacketTableInfo) {
        self.packet_table_info = Some(info);
    }

    /// Number of fixed-size packets a read may return.
    ///
    /// Fails with `EndOfStream` past the last packet and with `BufferTooSmall`
    /// when not even one packet fits in the space left.
    pub fn constant_read_count(
        &self,
        start_packet: u64,
        max_packets: usize,
        space: usize,
    ) -> Result<usize> {
        if start_packet >= self.packet_count {
            return Err(Error::EndOfStream);
        }
        let stride = self.format.bytes_per_packet as usize;
        if stride == 0 {
            return Err(Error::invalid_state(
                "Constant packet read on a variable-bit-rate stream",
            ));
        }
        if max_packets == 0 {
            return Ok(0);
        }

        let left = (self.packet_count - start_packet).min(usize::MAX as u64) as usize;
        let fit = space / stride;
        if fit == 0 {
            return Err(Error::BufferTooSmall {
                need: stride,
                have: space,
            });
        }

        Ok(max_packets.min(left).min(fit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::SampleFormat;

    fn context(packets: u64) -> DemuxerContext {
        let format = StreamFormat::linear_pcm(44100.0, 2, SampleFormat::I16, false);
        let mut ctx = DemuxerContext::new(FileType::Wav, format);
        ctx.set_packet_count(packets);
        ctx
    }

    #[test]
    fn test_constant_read_count() {
        let ctx = context(100);
        assert_eq!(ctx.packet_size_upper_bound(), 4);
        assert_eq!(ctx.constant_read_count(0, 10, 1024).unwrap(), 10);
        assert_eq!(ctx.constant_read_count(95, 10, 1024).unwrap(), 5);
        assert_eq!(ctx.constant_read_count(0, 10, 20).unwrap(), 5);
        assert_eq!(ctx.constant_read_count(0, 0, 20).unwrap(), 0);
    }

    #[test]
    fn test_constant_read_past_end() {
        let ctx = context(100);
        assert!(ctx
            .constant_read_count(100, 10, 1024)
            .unwrap_err()
            .is_end_of_stream());
    }

    #[test]
    fn test_constant_read_without_space() {
        let ctx = context(100);
        let err = ctx.constant_read_count(0, 10, 3).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { need: 4, have: 3 }));
    }
}
