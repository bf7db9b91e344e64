//! Codec implementations (packet decoders and encoders) and the converter
//!
//! Every decoder turns packets into interleaved full-scale `i32` samples and
//! every encoder turns such samples back into packets. The
//! [`AudioConverter`] strings a decoder, optional channel mapping and
//! resampling, and an encoder together behind a pull interface.

pub mod converter;
pub mod flac;
pub mod ima4;
pub mod pcm;

pub use converter::{AudioConverter, OutputFormatRequest, PacketSource};
pub use flac::{FlacDecoder, FlacEncoder};
pub use ima4::{Ima4Decoder, Ima4Encoder};
pub use pcm::{PcmDecoder, PcmEncoder};

use crate::error::{Error, Result};
use crate::format::{FormatId, StreamFormat};
use bytes::Bytes;

/// Decoder trait for turning packets into samples
pub trait PacketDecoder {
    /// Decode `data` and append interleaved full-scale samples to `out`.
    ///
    /// Constant-bit-rate decoders accept any whole number of packets at once;
    /// variable-bit-rate decoders are given exactly one packet. Returns the
    /// number of frames appended.
    fn decode(&mut self, data: &[u8], out: &mut Vec<i32>) -> Result<usize>;

    /// Configure the decoder from the codec configuration stored with the file
    fn set_magic_cookie(&mut self, _cookie: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Encoder trait for turning samples into packets
pub trait PacketEncoder {
    /// Frames in every packet except possibly the last
    fn frames_per_packet(&self) -> u32;

    /// Largest packet the encoder can produce
    fn max_packet_size(&self) -> u32;

    /// Encode one packet from `samples` (interleaved, full scale) and append
    /// it to `out`.
    ///
    /// `samples` holds exactly `frames_per_packet` frames, except for the
    /// final packet, which may be shorter.
    fn encode(&mut self, samples: &[i32], out: &mut Vec<u8>) -> Result<()>;

    /// Codec configuration for the container, if the codec has one
    fn magic_cookie(&self) -> Option<Bytes> {
        None
    }

    /// Frames of encoder delay at the start of the stream
    fn priming_frames(&self) -> u32 {
        0
    }
}

/// Codec capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecCapabilities {
    pub lossy: bool,
    pub lossless: bool,
    pub variable_packet_size: bool,
}

/// Codec information
#[derive(Debug, Clone)]
pub struct CodecInfo {
    pub format_id: FormatId,
    pub name: &'static str,
    pub long_name: &'static str,
    pub capabilities: CodecCapabilities,
}

/// Information about every supported codec
pub fn codec_infos() -> Vec<CodecInfo> {
    vec![
        CodecInfo {
            format_id: FormatId::LinearPcm,
            name: "lpcm",
            long_name: "Linear PCM (8/16/24/32-bit integer, 32/64-bit float)",
            capabilities: CodecCapabilities {
                lossy: false,
                lossless: true,
                variable_packet_size: false,
            },
        },
        CodecInfo {
            format_id: FormatId::AppleIma4,
            name: "ima4",
            long_name: "Apple IMA 4:1 ADPCM",
            capabilities: CodecCapabilities {
                lossy: true,
                lossless: false,
                variable_packet_size: false,
            },
        },
        CodecInfo {
            format_id: FormatId::Flac,
            name: "flac",
            long_name: "FLAC (Free Lossless Audio Codec), 16/24-bit",
            capabilities: CodecCapabilities {
                lossy: false,
                lossless: true,
                variable_packet_size: true,
            },
        },
    ]
}

/// Create a decoder for packets of `format`
pub fn create_decoder(format: &StreamFormat) -> Result<Box<dyn PacketDecoder>> {
    match format.format_id {
        FormatId::LinearPcm => Ok(Box::new(PcmDecoder::new(format)?)),
        FormatId::AppleIma4 => Ok(Box::new(Ima4Decoder::new(format)?)),
        FormatId::Flac => Ok(Box::new(FlacDecoder::new(format)?)),
        FormatId::Other(code) => Err(Error::unsupported(format!(
            "No decoder for format '{}'",
            code
        ))),
    }
}

/// Create an encoder producing packets of `format`
pub fn create_encoder(format: &StreamFormat) -> Result<Box<dyn PacketEncoder>> {
    match format.format_id {
        FormatId::LinearPcm => Ok(Box::new(PcmEncoder::new(format)?)),
        FormatId::AppleIma4 => Ok(Box::new(Ima4Encoder::new(format)?)),
        FormatId::Flac => Ok(Box::new(FlacEncoder::new(format)?)),
        FormatId::Other(code) => Err(Error::unsupported(format!(
            "No encoder for format '{}'",
            code
        ))),
    }
}
