//! PCM decoder implementation

use super::PcmConfig;
use crate::codec::PacketDecoder;
use crate::error::{Error, Result};
use crate::format::StreamFormat;

/// PCM decoder
pub struct PcmDecoder {
    config: PcmConfig,
}

impl PcmDecoder {
    /// Create a new PCM decoder for a linear PCM stream
    pub fn new(format: &StreamFormat) -> Result<Self> {
        Ok(PcmDecoder {
            config: PcmConfig::from_stream_format(format)?,
        })
    }

    pub fn config(&self) -> &PcmConfig {
        &self.config
    }
}

impl PacketDecoder for PcmDecoder {
    fn decode(&mut self, data: &[u8], out: &mut Vec<i32>) -> Result<usize> {
        let bytes_per_frame = self.config.bytes_per_frame();
        if data.len() % bytes_per_frame != 0 {
            return Err(Error::codec(format!(
                "PCM data of {} bytes is not a whole number of {}-byte frames",
                data.len(),
                bytes_per_frame
            )));
        }

        let bytes_per_sample = self.config.bytes_per_sample();
        out.reserve(data.len() / bytes_per_sample);
        for sample in data.chunks_exact(bytes_per_sample) {
            out.push(self.config.read_sample(sample));
        }

        Ok(self.config.frames_from_bytes(data.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::SampleFormat;

    #[test]
    fn test_pcm_decoder_u8() {
        let format = StreamFormat::linear_pcm(44100.0, 1, SampleFormat::U8, false);
        let mut decoder = PcmDecoder::new(&format).unwrap();

        let mut out = Vec::new();
        let frames = decoder.decode(&[128, 129, 127], &mut out).unwrap();
        assert_eq!(frames, 3);
        assert_eq!(out, vec![0, 1 << 24, -(1 << 24)]);
    }

    #[test]
    fn test_pcm_decoder_i16_stereo() {
        let format = StreamFormat::linear_pcm(44100.0, 2, SampleFormat::I16, false);
        let mut decoder = PcmDecoder::new(&format).unwrap();

        let mut out = Vec::new();
        let frames = decoder.decode(&[1, 0, 2, 0, 3, 0, 4, 0], &mut out).unwrap();
        assert_eq!(frames, 2);
        assert_eq!(out, vec![1 << 16, 2 << 16, 3 << 16, 4 << 16]);
    }

    #[test]
    fn test_pcm_decoder_partial_frame() {
        let format = StreamFormat::linear_pcm(44100.0, 2, SampleFormat::I16, false);
        let mut decoder = PcmDecoder::new(&format).unwrap();
        assert!(decoder.decode(&[0, 0, 0], &mut Vec::new()).is_err());
    }

    #[test]
    fn test_pcm_decoder_rejects_compressed_format() {
        assert!(PcmDecoder::new(&StreamFormat::ima4(44100.0, 1)).is_err());
    }
}
