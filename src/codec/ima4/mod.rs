//! Apple IMA 4:1 ADPCM ('ima4')
//!
//! Each packet holds 64 frames. Every channel gets its own 34-byte block:
//! a big-endian header with the 9 high bits of the predictor and a 7-bit step
//! index, then 32 bytes of 4-bit codes, low nibble first. Channel blocks
//! follow one another inside the packet.

pub mod decoder;
pub mod encoder;

pub use decoder::Ima4Decoder;
pub use encoder::Ima4Encoder;

use crate::error::{Error, Result};
use crate::format::{FormatId, StreamFormat};

/// Frames per packet
pub const FRAMES_PER_PACKET: usize = 64;
/// Bytes per channel per packet
pub const BLOCK_SIZE: usize = 34;

const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

const INDEX_TABLE: [i32; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

/// Predictor state of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub predictor: i32,
    pub step_index: i32,
}

impl ChannelState {
    /// State stored in a block header
    pub fn from_header(header: u16) -> Self {
        ChannelState {
            predictor: (header & 0xFF80) as i16 as i32,
            step_index: (header & 0x7F).min(88) as i32,
        }
    }

    /// Header for this state; the predictor loses its 7 low bits
    pub fn header(&self) -> u16 {
        ((self.predictor as i16 as u16) & 0xFF80) | (self.step_index as u16 & 0x7F)
    }

    /// Apply one 4-bit code and return the reconstructed sample
    pub fn expand(&mut self, code: u8) -> i16 {
        let step = STEP_TABLE[self.step_index as usize];
        let mut diff = step >> 3;
        if code & 4 != 0 {
            diff += step;
        }
        if code & 2 != 0 {
            diff += step >> 1;
        }
        if code & 1 != 0 {
            diff += step >> 2;
        }
        if code & 8 != 0 {
            self.predictor -= diff;
        } else {
            self.predictor += diff;
        }
        self.predictor = self.predictor.clamp(i16::MIN as i32, i16::MAX as i32);
        self.step_index = (self.step_index + INDEX_TABLE[code as usize & 0x0F]).clamp(0, 88);
        self.predictor as i16
    }

    /// Choose the code that best approximates `sample` and apply it
    pub fn compress(&mut self, sample: i16) -> u8 {
        let mut diff = sample as i32 - self.predictor;
        let mut code = 0u8;
        if diff < 0 {
            code = 8;
            diff = -diff;
        }

        let mut step = STEP_TABLE[self.step_index as usize];
        if diff >= step {
            code |= 4;
            diff -= step;
        }
        step >>= 1;
        if diff >= step {
            code |= 2;
            diff -= step;
        }
        step >>= 1;
        if diff >= step {
            code |= 1;
        }

        self.expand(code);
        code
    }
}

/// Check that `format` is IMA4 and return its channel count
fn channels_of(format: &StreamFormat) -> Result<usize> {
    if format.format_id != FormatId::AppleIma4 {
        return Err(Error::codec(format!(
            "Not an IMA4 format: {}",
            format.format_id
        )));
    }
    let channels = format.channels_per_frame as usize;
    if channels == 0
        || format.frames_per_packet as usize != FRAMES_PER_PACKET
        || format.bytes_per_packet as usize != BLOCK_SIZE * channels
    {
        return Err(Error::codec(format!("Invalid IMA4 framing: {}", format)));
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let state = ChannelState {
            predictor: -1234,
            step_index: 42,
        };
        let parsed = ChannelState::from_header(state.header());
        assert_eq!(parsed.step_index, 42);
        assert_eq!(parsed.predictor, -1280);
    }

    #[test]
    fn test_compress_tracks_expand() {
        let mut encoder = ChannelState::default();
        let mut decoder = ChannelState::default();
        for sample in [0i16, 500, 2000, 8000, -8000, 100] {
            let code = encoder.compress(sample);
            assert_eq!(decoder.expand(code) as i32, encoder.predictor);
        }
    }

    #[test]
    fn test_channels_of() {
        assert_eq!(channels_of(&StreamFormat::ima4(44100.0, 2)).unwrap(), 2);
        let mut bad = StreamFormat::ima4(44100.0, 2);
        bad.bytes_per_packet = 34;
        assert!(channels_of(&bad).is_err());
    }
}
