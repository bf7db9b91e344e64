//! Muxer for writing packets into audio containers

use super::{FileType, PacketBatch, Property, StreamFormat};
use crate::error::{Error, Result};

/// Muxer trait for writing audio containers.
///
/// Packets are appended sequentially. Properties are best effort: containers
/// that cannot store one return `Error::PropertyUnsupported`. `finalize`
/// writes size fields and trailers; muxers also finalize on drop when it was
/// never called.
pub trait Muxer {
    /// Container type being written
    fn file_type(&self) -> FileType;

    /// Format of the packets being written
    fn data_format(&self) -> StreamFormat;

    /// Append a batch of packets whose first packet has index `start_packet`
    fn write_packets(&mut self, start_packet: u64, batch: &PacketBatch) -> Result<()>;

    /// Store a property next to the packets, replacing any earlier value
    fn set_property(&mut self, property: &Property) -> Result<()>;

    /// Number of packets written so far
    fn packets_written(&self) -> u64;

    /// Write trailers and size fields and flush the file
    fn finalize(&mut self) -> Result<()>;
}

/// Bookkeeping shared by every muxer
#[derive(Debug, Clone)]
pub struct MuxerContext {
    file_type: FileType,
    format: StreamFormat,
    packets_written: u64,
    frames_written: u64,
    finalized: bool,
}

impl MuxerContext {
    /// Create a new muxer context
    pub fn new(file_type: FileType, format: StreamFormat) -> Self {
        MuxerContext {
            file_type,
            format,
            packets_written: 0,
            frames_written: 0,
            finalized: false,
        }
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn set_finalized(&mut self) {
        self.finalized = true;
    }

    /// Check that a batch may be appended at `start_packet`
    pub fn check_write(&self, start_packet: u64, batch: &PacketBatch) -> Result<()> {
        if self.finalized {
            return Err(Error::invalid_state("Muxer already finalized"));
        }
        if start_packet != self.packets_written {
            return Err(Error::invalid_state(format!(
                "Packets must be written sequentially: got start {}, expected {}",
                start_packet, self.packets_written
            )));
        }
        batch.validate(self.format.bytes_per_packet)
    }

    /// Record an appended batch
    pub fn record_write(&mut self, batch: &PacketBatch) {
        self.packets_written += batch.packet_count() as u64;
        self.frames_written += batch.frame_count(self.format.frames_per_packet);
    }
}
