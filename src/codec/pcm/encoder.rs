//! PCM encoder implementation

use super::PcmConfig;
use crate::codec::PacketEncoder;
use crate::error::{Error, Result};
use crate::format::StreamFormat;

/// PCM encoder. One frame per packet.
pub struct PcmEncoder {
    config: PcmConfig,
}

impl PcmEncoder {
    /// Create a new PCM encoder for a linear PCM stream
    pub fn new(format: &StreamFormat) -> Result<Self> {
        Ok(PcmEncoder {
            config: PcmConfig::from_stream_format(format)?,
        })
    }

    /// Encode any number of whole frames in one call
    pub fn encode_frames(&self, samples: &[i32], out: &mut Vec<u8>) -> Result<()> {
        let channels = self.config.channels as usize;
        if samples.len() % channels != 0 {
            return Err(Error::codec(format!(
                "{} samples is not a whole number of {}-channel frames",
                samples.len(),
                channels
            )));
        }

        let bytes_per_sample = self.config.bytes_per_sample();
        let start = out.len();
        out.resize(start + samples.len() * bytes_per_sample, 0);
        for (value, slot) in samples
            .iter()
            .zip(out[start..].chunks_exact_mut(bytes_per_sample))
        {
            self.config.write_sample(*value, slot);
        }
        Ok(())
    }
}

impl PacketEncoder for PcmEncoder {
    fn frames_per_packet(&self) -> u32 {
        1
    }

    fn max_packet_size(&self) -> u32 {
        self.config.bytes_per_frame() as u32
    }

    fn encode(&mut self, samples: &[i32], out: &mut Vec<u8>) -> Result<()> {
        self.encode_frames(samples, out)
    }
}
