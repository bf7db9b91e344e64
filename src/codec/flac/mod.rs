//! FLAC audio codec implementation
//!
//! FLAC (Free Lossless Audio Codec) is an open-source lossless audio codec.
//! Inside a CAF file every packet is one complete FLAC frame and the stream's
//! STREAMINFO block travels as the magic cookie.
//!
//! ## Features
//!
//! - **Encoding**: flacenc, one fixed-size frame per packet, 16 and 24-bit
//!   sources
//! - **Decoding**: Symphonia's FLAC decoder, configured from STREAMINFO
//! - **Channels**: 1-8 channels
//! - **Integrity**: every frame's CRC-16 footer is checked before decoding
//!
//! ## Usage
//!
//! ```rust,ignore
//! use afconv_lib::codec::{FlacEncoder, PacketEncoder};
//! use afconv_lib::format::StreamFormat;
//!
//! let format = StreamFormat::flac(44100.0, 2, 16, 4096);
//! let mut encoder = FlacEncoder::new(&format)?;
//!
//! let mut packet = Vec::new();
//! encoder.encode(&samples, &mut packet)?;
//! let cookie = encoder.magic_cookie();
//! ```

pub mod decoder;
pub mod encoder;

pub use decoder::FlacDecoder;
pub use encoder::FlacEncoder;

use crate::error::{Error, Result};
use crate::format::{FormatId, StreamFormat};
use byteorder::{BigEndian, ByteOrder};

/// Frames per packet used when encoding
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// Maximum channel count a FLAC frame can describe
pub const MAX_CHANNELS: u32 = 8;

/// Size of the STREAMINFO block body
pub const STREAM_INFO_SIZE: usize = 34;

/// Smallest and largest block sizes STREAMINFO can announce
pub const MIN_BLOCK_SIZE: u32 = 16;
pub const MAX_BLOCK_SIZE: u32 = 65535;

/// Metadata block type of STREAMINFO
const STREAM_INFO_BLOCK_TYPE: u8 = 0;

/// Stream marker at the start of a native FLAC file
const FLAC_MARKER: &[u8; 4] = b"fLaC";

/// Parsed STREAMINFO metadata block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    /// 0 when unknown
    pub min_frame_size: u32,
    /// 0 when unknown
    pub max_frame_size: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    /// 0 when unknown
    pub total_samples: u64,
    pub md5: [u8; 16],
}

impl StreamInfo {
    /// Parse the 34-byte STREAMINFO body
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < STREAM_INFO_SIZE {
            return Err(Error::codec(format!(
                "STREAMINFO too short: {} bytes",
                data.len()
            )));
        }

        let min_block_size = BigEndian::read_u16(&data[0..2]);
        let max_block_size = BigEndian::read_u16(&data[2..4]);
        let min_frame_size = BigEndian::read_u24(&data[4..7]);
        let max_frame_size = BigEndian::read_u24(&data[7..10]);
        // rate:20 channels-1:3 bits-1:5 total:36
        let packed = BigEndian::read_u64(&data[10..18]);
        let sample_rate = (packed >> 44) as u32;
        let channels = ((packed >> 41) & 0x7) as u32 + 1;
        let bits_per_sample = ((packed >> 36) & 0x1F) as u32 + 1;
        let total_samples = packed & 0xF_FFFF_FFFF;

        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&data[18..STREAM_INFO_SIZE]);

        if sample_rate == 0 {
            return Err(Error::codec("STREAMINFO has a zero sample rate"));
        }
        if bits_per_sample < 4 {
            return Err(Error::codec(format!(
                "STREAMINFO has an invalid bit depth: {}",
                bits_per_sample
            )));
        }

        Ok(StreamInfo {
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples,
            md5,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; STREAM_INFO_SIZE];
        BigEndian::write_u16(&mut bytes[0..2], self.min_block_size);
        BigEndian::write_u16(&mut bytes[2..4], self.max_block_size);
        BigEndian::write_u24(&mut bytes[4..7], self.min_frame_size & 0xFF_FFFF);
        BigEndian::write_u24(&mut bytes[7..10], self.max_frame_size & 0xFF_FFFF);
        let packed = (self.sample_rate as u64 & 0xF_FFFF) << 44
            | (self.channels.saturating_sub(1) as u64 & 0x7) << 41
            | (self.bits_per_sample.saturating_sub(1) as u64 & 0x1F) << 36
            | (self.total_samples & 0xF_FFFF_FFFF);
        BigEndian::write_u64(&mut bytes[10..18], packed);
        bytes[18..].copy_from_slice(&self.md5);
        bytes
    }

    /// STREAMINFO for a stream nothing is known about beyond its format
    pub fn for_format(format: &StreamFormat, bits_per_sample: u32) -> Result<Self> {
        let channels = channels_of(format)? as u32;
        let rate = format.sample_rate;
        if rate.fract() != 0.0 || !(1.0..=655_350.0).contains(&rate) {
            return Err(Error::unsupported(format!(
                "FLAC cannot store a sample rate of {} Hz",
                rate
            )));
        }
        let block_size = if format.frames_per_packet == 0 {
            MAX_BLOCK_SIZE
        } else {
            format.frames_per_packet.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)
        };

        Ok(StreamInfo {
            min_block_size: block_size as u16,
            max_block_size: block_size as u16,
            sample_rate: rate as u32,
            channels,
            bits_per_sample,
            ..Default::default()
        })
    }

    /// Magic cookie form: a last-block metadata header and the STREAMINFO body
    pub fn to_cookie(&self) -> Vec<u8> {
        let mut cookie = Vec::with_capacity(4 + STREAM_INFO_SIZE);
        cookie.push(0x80 | STREAM_INFO_BLOCK_TYPE);
        cookie.extend_from_slice(&(STREAM_INFO_SIZE as u32).to_be_bytes()[1..]);
        cookie.extend_from_slice(&self.to_bytes());
        cookie
    }

    /// Find STREAMINFO in a magic cookie.
    ///
    /// Accepts the bare block body, the body behind a metadata block header,
    /// and either of those behind a `fLaC` marker.
    pub fn from_cookie(cookie: &[u8]) -> Result<Self> {
        let mut data = cookie;
        if data.starts_with(FLAC_MARKER) {
            data = &data[FLAC_MARKER.len()..];
        }

        if data.len() >= 4 + STREAM_INFO_SIZE && data[0] & 0x7F == STREAM_INFO_BLOCK_TYPE {
            let length = u32::from_be_bytes([0, data[1], data[2], data[3]]) as usize;
            if length == STREAM_INFO_SIZE {
                return StreamInfo::from_bytes(&data[4..]);
            }
        }

        if data.len() == STREAM_INFO_SIZE {
            return StreamInfo::from_bytes(data);
        }

        Err(Error::codec(format!(
            "Magic cookie does not hold FLAC STREAMINFO ({} bytes)",
            cookie.len()
        )))
    }
}

/// Check a stream format describes FLAC and return its channel count
fn channels_of(format: &StreamFormat) -> Result<usize> {
    if format.format_id != FormatId::Flac {
        return Err(Error::codec(format!(
            "Not a FLAC format: {}",
            format.format_id
        )));
    }
    if format.channels_per_frame == 0 || format.channels_per_frame > MAX_CHANNELS {
        return Err(Error::codec(format!(
            "FLAC supports 1 to {} channels, got {}",
            MAX_CHANNELS, format.channels_per_frame
        )));
    }
    Ok(format.channels_per_frame as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> StreamInfo {
        StreamInfo {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: 14,
            max_frame_size: 16_400,
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            total_samples: 0x1_2345_6789,
            md5: [0; 16],
        }
    }

    #[test]
    fn test_stream_info_layout() {
        let bytes = sample_info().to_bytes();
        assert_eq!(bytes.len(), STREAM_INFO_SIZE);
        assert_eq!(&bytes[0..4], &[0x10, 0x00, 0x10, 0x00]);
        assert_eq!(StreamInfo::from_bytes(&bytes).unwrap(), sample_info());
    }

    #[test]
    fn test_cookie_variants() {
        let cookie = sample_info().to_cookie();
        assert_eq!(cookie.len(), 38);
        assert_eq!(&cookie[..4], &[0x80, 0x00, 0x00, 0x22]);
        assert_eq!(StreamInfo::from_cookie(&cookie).unwrap(), sample_info());

        let mut native = b"fLaC".to_vec();
        native.extend_from_slice(&cookie);
        assert_eq!(StreamInfo::from_cookie(&native).unwrap(), sample_info());

        let bare = sample_info().to_bytes();
        assert_eq!(StreamInfo::from_cookie(&bare).unwrap(), sample_info());

        assert!(StreamInfo::from_cookie(b"junk").is_err());
    }

    #[test]
    fn test_stream_info_for_format() {
        let info = StreamInfo::for_format(&StreamFormat::flac(48000.0, 2, 24, 1152), 24).unwrap();
        assert_eq!(info.sample_rate, 48000);
        assert_eq!(info.max_block_size, 1152);
        assert_eq!(info.channels, 2);
        assert_eq!(info.total_samples, 0);

        let unbounded = StreamInfo::for_format(&StreamFormat::flac(8000.0, 1, 16, 0), 16).unwrap();
        assert_eq!(unbounded.max_block_size, 65535);
        assert!(StreamInfo::for_format(&StreamFormat::flac(44100.5, 1, 16, 4096), 16).is_err());
    }

    #[test]
    fn test_format_checks() {
        assert!(channels_of(&StreamFormat::flac(44100.0, 2, 16, 4096)).is_ok());
        assert!(channels_of(&StreamFormat::flac(44100.0, 9, 16, 4096)).is_err());
        assert!(channels_of(&StreamFormat::ima4(44100.0, 2)).is_err());
    }
}
