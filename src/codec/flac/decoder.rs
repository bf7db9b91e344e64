//! FLAC decoder using Symphonia
//!
//! Symphonia's FLAC decoder is built from STREAMINFO: the magic cookie when
//! the file has one, otherwise a block synthesized from the stream format.
//! Frames are checked against their CRC-16 footer before decoding.

use super::{channels_of, StreamInfo};
use crate::codec::PacketDecoder;
use crate::error::{Error, Result};
use crate::format::StreamFormat;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::checksum::Crc16Ansi;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_FLAC};
use symphonia::core::formats::Packet as SymphoniaPacket;
use symphonia::core::io::Monitor;
use symphonia::default::get_codecs;
use tracing::debug;

/// Frame header, one subframe byte and the CRC-16 footer
const MIN_FRAME_SIZE: usize = 9;

/// Bit depth assumed when neither the format nor a cookie gives one
const FALLBACK_BITS_PER_SAMPLE: u32 = 16;

/// FLAC decoder. Every call decodes exactly one frame.
pub struct FlacDecoder {
    format: StreamFormat,
    channels: usize,
    stream_info: Option<StreamInfo>,
    /// Built lazily so a cookie can arrive before the first packet
    decoder: Option<Box<dyn Decoder>>,
    sample_buffer: Option<SampleBuffer<i32>>,
    /// Frames `sample_buffer` can hold
    buffer_frames: usize,
    frames_decoded: u64,
}

impl std::fmt::Debug for FlacDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlacDecoder")
            .field("channels", &self.channels)
            .field("stream_info", &self.stream_info)
            .field("frames_decoded", &self.frames_decoded)
            .finish_non_exhaustive()
    }
}

impl FlacDecoder {
    pub fn new(format: &StreamFormat) -> Result<Self> {
        let channels = channels_of(format)?;
        Ok(FlacDecoder {
            format: *format,
            channels,
            stream_info: None,
            decoder: None,
            sample_buffer: None,
            buffer_frames: 0,
            frames_decoded: 0,
        })
    }

    /// STREAMINFO from the magic cookie, once one has been set
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream_info.as_ref()
    }

    /// STREAMINFO the Symphonia decoder is configured with
    fn effective_stream_info(&self) -> Result<StreamInfo> {
        match self.stream_info {
            Some(info) => Ok(info),
            None => {
                let bits = self
                    .format
                    .flac_source_bits()
                    .unwrap_or(FALLBACK_BITS_PER_SAMPLE);
                StreamInfo::for_format(&self.format, bits)
            }
        }
    }
}

/// Create a Symphonia FLAC decoder configured by `info`
fn make_decoder(info: &StreamInfo) -> Result<Box<dyn Decoder>> {
    let mut codec_params = CodecParameters::new();
    codec_params
        .for_codec(CODEC_TYPE_FLAC)
        .with_sample_rate(info.sample_rate)
        .with_bits_per_sample(info.bits_per_sample)
        .with_extra_data(info.to_bytes().into_boxed_slice());

    get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::codec(format!("Failed to create FLAC decoder: {}", e)))
}

/// Reject frames whose CRC-16 footer does not match their contents
fn verify_frame_crc(data: &[u8]) -> Result<()> {
    if data.len() < MIN_FRAME_SIZE {
        return Err(Error::codec(format!(
            "FLAC frame too short: {} bytes",
            data.len()
        )));
    }

    let (frame, footer) = data.split_at(data.len() - 2);
    let mut crc = Crc16Ansi::new(0);
    crc.process_buf_bytes(frame);
    let expected = u16::from_be_bytes([footer[0], footer[1]]);
    if crc.crc() != expected {
        return Err(Error::codec(format!(
            "FLAC frame CRC mismatch: computed {:04x}, stored {:04x}",
            crc.crc(),
            expected
        )));
    }
    Ok(())
}

impl PacketDecoder for FlacDecoder {
    fn decode(&mut self, data: &[u8], out: &mut Vec<i32>) -> Result<usize> {
        verify_frame_crc(data)?;

        if self.decoder.is_none() {
            let info = self.effective_stream_info()?;
            self.decoder = Some(make_decoder(&info)?);
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Err(Error::invalid_state("FLAC decoder not configured"));
        };

        let packet = SymphoniaPacket::new_from_slice(0, self.frames_decoded, 0, data);
        let decoded = decoder
            .decode(&packet)
            .map_err(|e| Error::codec(format!("FLAC decode error: {}", e)))?;

        let spec = *decoded.spec();
        let frames = decoded.frames();
        if spec.channels.count() != self.channels {
            return Err(Error::codec(format!(
                "FLAC frame has {} channels, stream has {}",
                spec.channels.count(),
                self.channels
            )));
        }

        if self.sample_buffer.is_none() || self.buffer_frames < frames {
            self.sample_buffer = Some(SampleBuffer::new(frames as u64, spec));
            self.buffer_frames = frames;
        }
        let Some(buffer) = self.sample_buffer.as_mut() else {
            return Err(Error::invalid_state("FLAC sample buffer missing"));
        };

        // Symphonia hands out left-justified samples, the same full-scale
        // representation the rest of the pipeline uses
        buffer.copy_interleaved_ref(decoded);
        out.extend_from_slice(buffer.samples());

        self.frames_decoded += frames as u64;
        Ok(frames)
    }

    fn set_magic_cookie(&mut self, cookie: &[u8]) -> Result<()> {
        let info = StreamInfo::from_cookie(cookie)?;
        if info.channels as usize != self.channels {
            return Err(Error::codec(format!(
                "STREAMINFO has {} channels, stream has {}",
                info.channels, self.channels
            )));
        }
        debug!(
            "FLAC STREAMINFO: {} Hz, {} bits, {} samples",
            info.sample_rate, info.bits_per_sample, info.total_samples
        );
        self.decoder = Some(make_decoder(&info)?);
        self.stream_info = Some(info);
        Ok(())
    }
}
