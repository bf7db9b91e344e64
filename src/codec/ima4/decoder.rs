//! IMA4 decoder

use super::{channels_of, ChannelState, BLOCK_SIZE, FRAMES_PER_PACKET};
use crate::codec::PacketDecoder;
use crate::error::{Error, Result};
use crate::format::StreamFormat;

/// IMA4 decoder
pub struct Ima4Decoder {
    channels: usize,
    planes: Vec<[i16; FRAMES_PER_PACKET]>,
}

impl Ima4Decoder {
    pub fn new(format: &StreamFormat) -> Result<Self> {
        let channels = channels_of(format)?;
        Ok(Ima4Decoder {
            channels,
            planes: vec![[0; FRAMES_PER_PACKET]; channels],
        })
    }
}

impl PacketDecoder for Ima4Decoder {
    fn decode(&mut self, data: &[u8], out: &mut Vec<i32>) -> Result<usize> {
        let packet_size = BLOCK_SIZE * self.channels;
        if data.len() % packet_size != 0 {
            return Err(Error::codec(format!(
                "IMA4 data of {} bytes is not a whole number of {}-byte packets",
                data.len(),
                packet_size
            )));
        }

        for packet in data.chunks_exact(packet_size) {
            for (block, plane) in packet.chunks_exact(BLOCK_SIZE).zip(self.planes.iter_mut()) {
                // Every block restarts from its own header
                let mut state = ChannelState::from_header(u16::from_be_bytes([block[0], block[1]]));
                for (i, byte) in block[2..].iter().enumerate() {
                    plane[i * 2] = state.expand(byte & 0x0F);
                    plane[i * 2 + 1] = state.expand(byte >> 4);
                }
            }

            out.reserve(FRAMES_PER_PACKET * self.channels);
            for frame in 0..FRAMES_PER_PACKET {
                for plane in &self.planes {
                    out.push((plane[frame] as i32) << 16);
                }
            }
        }

        Ok(data.len() / packet_size * FRAMES_PER_PACKET)
    }
}
