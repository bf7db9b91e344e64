//! IMA4 encoder

use super::{channels_of, ChannelState, BLOCK_SIZE, FRAMES_PER_PACKET};
use crate::codec::PacketEncoder;
use crate::error::{Error, Result};
use crate::format::StreamFormat;

/// IMA4 encoder. A short final packet is padded with silence.
pub struct Ima4Encoder {
    channels: usize,
    states: Vec<ChannelState>,
}

impl Ima4Encoder {
    pub fn new(format: &StreamFormat) -> Result<Self> {
        let channels = channels_of(format)?;
        Ok(Ima4Encoder {
            channels,
            states: vec![ChannelState::default(); channels],
        })
    }
}

impl PacketEncoder for Ima4Encoder {
    fn frames_per_packet(&self) -> u32 {
        FRAMES_PER_PACKET as u32
    }

    fn max_packet_size(&self) -> u32 {
        (BLOCK_SIZE * self.channels) as u32
    }

    fn encode(&mut self, samples: &[i32], out: &mut Vec<u8>) -> Result<()> {
        let frames = samples.len() / self.channels;
        if samples.len() % self.channels != 0 || frames == 0 || frames > FRAMES_PER_PACKET {
            return Err(Error::codec(format!(
                "IMA4 packet needs 1 to {} whole frames, got {} samples",
                FRAMES_PER_PACKET,
                samples.len()
            )));
        }

        let channels = self.channels;
        for (channel, state) in self.states.iter_mut().enumerate() {
            // The decoder only sees the truncated predictor
            *state = ChannelState::from_header(state.header());
            out.extend_from_slice(&state.header().to_be_bytes());

            let sample_at = |frame: usize| -> i16 {
                if frame < frames {
                    (samples[frame * channels + channel] >> 16) as i16
                } else {
                    0
                }
            };
            for pair in 0..FRAMES_PER_PACKET / 2 {
                let low = state.compress(sample_at(pair * 2));
                let high = state.compress(sample_at(pair * 2 + 1));
                out.push(low | (high << 4));
            }
        }

        Ok(())
    }
}
