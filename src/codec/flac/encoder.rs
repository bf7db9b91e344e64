//! FLAC encoder using flacenc
//!
//! Every packet is encoded as its own single-frame stream with a fixed block
//! size; only the frame bytes are kept. The STREAMINFO cookie is maintained
//! here since each flacenc stream only describes its own frame.

use super::{channels_of, StreamInfo, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::codec::PacketEncoder;
use crate::error::{Error, Result};
use crate::format::StreamFormat;
use bytes::Bytes;
use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config::Encoder as FlacConfig;
use flacenc::error::{Verify, Verified};
use flacenc::source::MemSource;

/// FLAC encoder
pub struct FlacEncoder {
    /// Verified flacenc configuration
    flac_config: Verified<FlacConfig>,
    channels: usize,
    bits: u32,
    block_size: u32,
    sample_rate: u32,
    packets_encoded: u64,
    total_samples: u64,
    min_frame_size: u32,
    max_frame_size: u32,
    /// Input scaled down to the source bit depth
    scaled: Vec<i32>,
}

impl FlacEncoder {
    pub fn new(format: &StreamFormat) -> Result<Self> {
        let channels = channels_of(format)?;

        let bits = match format.flac_source_bits() {
            Some(bits @ (16 | 24)) => bits,
            other => {
                return Err(Error::unsupported(format!(
                    "FLAC encoding supports 16 and 24-bit sources, got {:?}",
                    other
                )))
            }
        };

        let block_size = format.frames_per_packet;
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(Error::codec(format!(
                "Invalid FLAC block size: {}",
                block_size
            )));
        }

        let info = StreamInfo::for_format(format, bits)?;

        let mut flac_config = FlacConfig::default();
        flac_config.block_size = block_size as usize;
        let flac_config = flac_config
            .into_verified()
            .map_err(|e| Error::codec(format!("Invalid FLAC encoder config: {:?}", e)))?;

        Ok(FlacEncoder {
            flac_config,
            channels,
            bits,
            block_size,
            sample_rate: info.sample_rate,
            packets_encoded: 0,
            total_samples: 0,
            min_frame_size: 0,
            max_frame_size: 0,
            scaled: Vec::with_capacity(block_size as usize * channels),
        })
    }

    /// STREAMINFO describing everything encoded so far
    pub fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            min_block_size: self.block_size as u16,
            max_block_size: self.block_size as u16,
            min_frame_size: self.min_frame_size,
            max_frame_size: self.max_frame_size,
            sample_rate: self.sample_rate,
            channels: self.channels as u32,
            bits_per_sample: self.bits,
            total_samples: self.total_samples,
            md5: [0; 16],
        }
    }

    /// Encode the scaled samples as a single frame
    fn encode_frame(&self) -> Result<Vec<u8>> {
        let source = MemSource::from_samples(
            &self.scaled,
            self.channels,
            self.bits as usize,
            self.sample_rate as usize,
        );

        let stream = flacenc::encode_with_fixed_block_size(
            &self.flac_config,
            source,
            self.block_size as usize,
        )
        .map_err(|e| Error::codec(format!("FLAC encoding failed: {:?}", e)))?;

        if stream.frame_count() != 1 {
            return Err(Error::codec(format!(
                "FLAC encoder produced {} frames for one packet",
                stream.frame_count()
            )));
        }
        let frame = stream
            .frame(0)
            .ok_or_else(|| Error::codec("FLAC encoder produced no frame"))?;

        let mut sink = ByteSink::new();
        frame
            .write(&mut sink)
            .map_err(|e| Error::codec(format!("FLAC frame serialization failed: {:?}", e)))?;
        Ok(sink.as_slice().to_vec())
    }
}

impl PacketEncoder for FlacEncoder {
    fn frames_per_packet(&self) -> u32 {
        self.block_size
    }

    /// Verbatim subframes, one extra bit for a side channel, plus the
    /// largest frame header and the CRC-16 footer
    fn max_packet_size(&self) -> u32 {
        18 + self.channels as u32 * (2 + self.block_size * (self.bits + 1) / 8)
    }

    fn encode(&mut self, samples: &[i32], out: &mut Vec<u8>) -> Result<()> {
        let frames = samples.len() / self.channels;
        if samples.len() % self.channels != 0
            || frames == 0
            || frames > self.block_size as usize
        {
            return Err(Error::codec(format!(
                "FLAC packet needs 1 to {} whole frames, got {} samples",
                self.block_size,
                samples.len()
            )));
        }

        let shift = 32 - self.bits;
        self.scaled.clear();
        self.scaled.extend(samples.iter().map(|s| s >> shift));
        let frame = self.encode_frame()?;

        let size = frame.len() as u32;
        self.min_frame_size = if self.packets_encoded == 0 {
            size
        } else {
            self.min_frame_size.min(size)
        };
        self.max_frame_size = self.max_frame_size.max(size);
        self.packets_encoded += 1;
        self.total_samples += frames as u64;

        out.extend_from_slice(&frame);
        Ok(())
    }

    fn magic_cookie(&self) -> Option<Bytes> {
        Some(Bytes::from(self.stream_info().to_cookie()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: usize) -> Vec<i32> {
        (0..frames * channels)
            .map(|i| (((i / channels) as i32 * 37) % 2000 - 1000) << 16)
            .collect()
    }

    #[test]
    fn test_rejects_unsupported_depths() {
        let format = StreamFormat::flac(44100.0, 2, 20, 4096);
        assert!(FlacEncoder::new(&format).is_err());

        let format = StreamFormat::flac(44100.5, 2, 16, 4096);
        assert!(FlacEncoder::new(&format).is_err());

        let format = StreamFormat::flac(44100.0, 2, 16, 8);
        assert!(FlacEncoder::new(&format).is_err());
    }

    #[test]
    fn test_one_frame_per_packet() {
        let format = StreamFormat::flac(44100.0, 2, 16, 4096);
        let mut encoder = FlacEncoder::new(&format).unwrap();
        let mut out = Vec::new();
        encoder.encode(&ramp(4096, 2), &mut out).unwrap();

        // Frame sync code with fixed blocking, no stream marker
        assert_eq!(&out[..2], &[0xFF, 0xF8]);
        assert!(out.len() <= encoder.max_packet_size() as usize);
    }

    #[test]
    fn test_silence_compresses_well() {
        let format = StreamFormat::flac(48000.0, 1, 24, 4096);
        let mut encoder = FlacEncoder::new(&format).unwrap();
        let mut out = Vec::new();
        encoder.encode(&vec![0; 4096], &mut out).unwrap();
        assert!(out.len() < 64, "{} bytes", out.len());
    }

    #[test]
    fn test_stream_info_tracks_progress() {
        let format = StreamFormat::flac(44100.0, 1, 16, 1024);
        let mut encoder = FlacEncoder::new(&format).unwrap();
        let empty = encoder.stream_info();
        assert_eq!(empty.total_samples, 0);
        assert_eq!(empty.max_frame_size, 0);

        let mut out = Vec::new();
        encoder.encode(&ramp(1024, 1), &mut out).unwrap();
        encoder.encode(&ramp(500, 1), &mut out).unwrap();

        let info = encoder.stream_info();
        assert_eq!(info.total_samples, 1524);
        assert_eq!(info.max_block_size, 1024);
        assert!(info.min_frame_size > 0);
        assert!(info.min_frame_size <= info.max_frame_size);

        let cookie = encoder.magic_cookie().unwrap();
        assert_eq!(StreamInfo::from_cookie(&cookie).unwrap(), info);
    }

    #[test]
    fn test_rejects_oversized_input() {
        let format = StreamFormat::flac(44100.0, 1, 16, 1024);
        let mut encoder = FlacEncoder::new(&format).unwrap();
        assert!(encoder.encode(&ramp(1025, 1), &mut Vec::new()).is_err());
        assert!(encoder.encode(&[], &mut Vec::new()).is_err());
    }
}
