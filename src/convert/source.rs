//! Packet reader over the input file

use crate::codec::PacketSource;
use crate::error::{Error, OperationContext, Result};
use crate::format::{ChannelLayout, Demuxer, PacketBatch, StreamFormat};
use crate::util::PacketBuffer;
use bytes::Bytes;
use tracing::debug;

/// Reads batches of packets from a demuxer into an owned buffer.
///
/// The read count is bounded by how many worst-case packets fit in the
/// buffer. End of stream is reported as an empty batch.
pub struct SourceReader {
    demuxer: Box<dyn Demuxer>,
    format: StreamFormat,
    buffer: PacketBuffer,
    worst_case_packet_size: usize,
    /// Next packet to read
    cursor: u64,
    ended: bool,
}

impl SourceReader {
    /// Wrap `demuxer` with a read buffer of `buffer_size` bytes, raised to at
    /// least one worst-case packet
    pub fn new(demuxer: Box<dyn Demuxer>, buffer_size: usize) -> Result<Self> {
        let format = demuxer.data_format();

        let worst_case_packet_size = if format.is_vbr() {
            let upper_bound = demuxer.packet_size_upper_bound() as usize;
            if upper_bound == 0 && demuxer.packet_count() > 0 {
                return Err(Error::format(
                    "Variable bit rate source declares no packet size upper bound",
                ))
                .during("AudioFileGetProperty");
            }
            upper_bound.max(1)
        } else {
            format.bytes_per_packet as usize
        };

        let capacity = buffer_size.max(worst_case_packet_size);
        debug!(
            "Source: {}, worst-case packet {} bytes, buffer {} bytes",
            format, worst_case_packet_size, capacity
        );

        Ok(SourceReader {
            demuxer,
            format,
            buffer: PacketBuffer::with_capacity(capacity),
            worst_case_packet_size,
            cursor: 0,
            ended: false,
        })
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn magic_cookie(&self) -> Option<Bytes> {
        self.demuxer.magic_cookie()
    }

    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        self.demuxer.channel_layout()
    }

    /// Packets read so far
    pub fn packet_cursor(&self) -> u64 {
        self.cursor
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Most packets a single read can return
    pub fn max_packets_per_read(&self) -> usize {
        self.buffer.capacity() / self.worst_case_packet_size
    }

    /// Read up to `max_packets` packets starting at the cursor.
    ///
    /// The count is clamped to what the buffer holds. Returns an empty batch
    /// once the input is exhausted.
    pub fn read_packets(&mut self, max_packets: usize) -> Result<PacketBatch> {
        let max_packets = max_packets.min(self.max_packets_per_read());
        if self.ended || max_packets == 0 {
            return Ok(PacketBatch::empty());
        }

        self.buffer.clear();
        let mut descriptions = Vec::new();
        let count = match self.demuxer.read_packets(
            self.cursor,
            max_packets,
            &mut self.buffer,
            &mut descriptions,
        ) {
            Ok(count) => count,
            Err(e) if e.is_end_of_stream() => {
                debug!("Source exhausted after {} packets", self.cursor);
                self.ended = true;
                return Ok(PacketBatch::empty());
            }
            Err(e) => return Err(e.during("AudioFileReadPackets")),
        };

        self.cursor += count as u64;
        let data = self.buffer.take();
        if self.format.is_vbr() {
            Ok(PacketBatch::variable(data, descriptions))
        } else {
            Ok(PacketBatch::constant(data, count))
        }
    }
}

impl PacketSource for SourceReader {
    fn request_packets(&mut self, max_packets: usize) -> Result<PacketBatch> {
        self.read_packets(max_packets)
    }
}
