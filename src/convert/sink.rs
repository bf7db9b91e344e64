//! Packet writer over the output file

use crate::error::{Error, OperationContext, Result};
use crate::format::{
    create_muxer, FileType, Muxer, PacketBatch, PacketTableInfo, PrimeInfo, Property,
    StreamFormat,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Appends converted packets to the output file and stores side metadata
pub struct SinkWriter {
    muxer: Box<dyn Muxer>,
    path: PathBuf,
    format: StreamFormat,
    /// Next packet index to write
    cursor: u64,
    frames_written: u64,
}

impl SinkWriter {
    /// Create `dir/name` as a `file_type` container for `format`
    pub fn create(
        dir: &Path,
        name: &str,
        file_type: FileType,
        format: &StreamFormat,
    ) -> Result<Self> {
        let muxer = create_muxer(dir, name, file_type, format).during("AudioFileCreate")?;
        Ok(Self::from_muxer(muxer, dir.join(name)))
    }

    /// Write through an existing muxer
    pub fn from_muxer(muxer: Box<dyn Muxer>, path: PathBuf) -> Self {
        let format = muxer.data_format();
        SinkWriter {
            muxer,
            path,
            format,
            cursor: 0,
            frames_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn packets_written(&self) -> u64 {
        self.cursor
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Append `batch` at `at_packet_offset`, which must be the next packet
    pub fn write_packets(&mut self, batch: &PacketBatch, at_packet_offset: u64) -> Result<()> {
        if at_packet_offset != self.cursor {
            return Err(Error::invalid_state(format!(
                "Write at packet {} but the file ends at packet {}",
                at_packet_offset, self.cursor
            )))
            .during("AudioFileWritePackets");
        }

        self.muxer
            .write_packets(at_packet_offset, batch)
            .during("AudioFileWritePackets")?;
        self.cursor += batch.packet_count() as u64;
        self.frames_written += batch.frame_count(self.format.frames_per_packet);
        Ok(())
    }

    /// Store a property if the container supports it.
    ///
    /// Failures are logged and swallowed. Returns whether the property was
    /// stored.
    pub fn set_side_metadata(&mut self, property: &Property) -> bool {
        match self.muxer.set_property(property) {
            Ok(()) => {
                debug!("Stored {}", property);
                true
            }
            Err(e) if matches!(e.root(), Error::PropertyUnsupported(_)) => {
                debug!("{} not stored: {}", property.name(), e);
                false
            }
            Err(e) => {
                warn!("Failed to store {}: {}", property.name(), e);
                false
            }
        }
    }

    /// Record priming and remainder frames for compressed output.
    ///
    /// Returns the info that was stored, if any.
    pub fn write_packet_table(
        &mut self,
        prime: PrimeInfo,
        total_frames: u64,
    ) -> Option<PacketTableInfo> {
        if !self.format.is_compressed() {
            return None;
        }

        let info =
            PacketTableInfo::from_total(total_frames, prime.leading_frames, prime.trailing_frames);
        if self.set_side_metadata(&Property::PacketTableInfo(info)) {
            Some(info)
        } else {
            None
        }
    }

    /// Write trailers and close the file
    pub fn finish(&mut self) -> Result<()> {
        self.muxer.finalize().during("AudioFileClose")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ChannelLayout;
    use crate::util::{Buffer, SampleFormat};

    #[test]
    fn test_sequential_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let format = StreamFormat::linear_pcm(8000.0, 1, SampleFormat::I16, false);
        let mut sink = SinkWriter::create(dir.path(), "out.wav", FileType::Wav, &format).unwrap();

        let batch = PacketBatch::constant(Buffer::from_vec(vec![0; 8]), 4);
        sink.write_packets(&batch, 0).unwrap();
        let err = sink.write_packets(&batch, 0).unwrap_err();
        assert_eq!(err.operation(), Some("AudioFileWritePackets"));
        sink.write_packets(&batch, 4).unwrap();
        assert_eq!(sink.packets_written(), 8);
        assert_eq!(sink.frames_written(), 8);
        sink.finish().unwrap();
        assert!(sink.path().ends_with("out.wav"));
    }

    #[test]
    fn test_unsupported_metadata_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let format = StreamFormat::linear_pcm(8000.0, 6, SampleFormat::I16, false);
        let mut sink = SinkWriter::create(dir.path(), "out.wav", FileType::Wav, &format).unwrap();
        assert!(!sink.set_side_metadata(&Property::ChannelLayout(ChannelLayout::discrete(6))));
        // Linear PCM has no packet table
        assert!(sink.write_packet_table(PrimeInfo::default(), 0).is_none());
    }

    #[test]
    fn test_packet_table_for_compressed_output() {
        let dir = tempfile::tempdir().unwrap();
        let format = StreamFormat::ima4(44100.0, 1);
        let mut sink = SinkWriter::create(dir.path(), "out.caf", FileType::Caf, &format).unwrap();
        let prime = PrimeInfo {
            leading_frames: 0,
            trailing_frames: 24,
        };
        let info = sink.write_packet_table(prime, 1024).unwrap();
        assert_eq!(info.valid_frames, 1000);
        assert_eq!(info.remainder_frames, 24);
    }
}
