//! Stream format description shared by containers and codecs

use crate::error::{Error, Result};
use crate::util::{FourCC, SampleFormat};
use std::fmt;

/// Sample values are IEEE floats
pub const FLAG_IS_FLOAT: u32 = 1 << 0;
/// Sample values are stored big endian
pub const FLAG_IS_BIG_ENDIAN: u32 = 1 << 1;
/// Integer samples are signed
pub const FLAG_IS_SIGNED_INTEGER: u32 = 1 << 2;
/// Sample bits occupy the whole channel slot
pub const FLAG_IS_PACKED: u32 = 1 << 3;

/// Largest channel count a stream may declare
pub const MAX_CHANNELS: u32 = 64;

/// FLAC flag values recording the bit depth of the encoded source
pub const FLAC_16_BIT_SOURCE: u32 = 1;
pub const FLAC_20_BIT_SOURCE: u32 = 2;
pub const FLAC_24_BIT_SOURCE: u32 = 3;
pub const FLAC_32_BIT_SOURCE: u32 = 4;

/// Audio data format identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    /// Uncompressed linear PCM ('lpcm')
    LinearPcm,
    /// Apple IMA 4:1 ADPCM ('ima4')
    AppleIma4,
    /// Free Lossless Audio Codec ('flac')
    Flac,
    /// Any other four-character code
    Other(FourCC),
}

impl FormatId {
    pub fn fourcc(self) -> FourCC {
        match self {
            FormatId::LinearPcm => FourCC::new(b"lpcm"),
            FormatId::AppleIma4 => FourCC::new(b"ima4"),
            FormatId::Flac => FourCC::new(b"flac"),
            FormatId::Other(code) => code,
        }
    }

    pub fn from_fourcc(code: FourCC) -> Self {
        match &code.to_bytes() {
            b"lpcm" => FormatId::LinearPcm,
            b"ima4" => FormatId::AppleIma4,
            b"flac" => FormatId::Flac,
            _ => FormatId::Other(code),
        }
    }

    /// Parse a user-facing codec name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lpcm" | "pcm" => Some(FormatId::LinearPcm),
            "ima4" | "ima" | "adpcm" => Some(FormatId::AppleIma4),
            "flac" => Some(FormatId::Flac),
            _ => None,
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.fourcc())
    }
}

/// Complete description of an audio stream's packet and frame layout.
///
/// A `bytes_per_packet` of zero marks variable-bit-rate framing, where every
/// packet needs a [`PacketDescription`](super::PacketDescription). A
/// `bits_per_channel` of zero marks a compressed format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub format_id: FormatId,
    pub format_flags: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl StreamFormat {
    /// Interleaved linear PCM
    pub fn linear_pcm(
        sample_rate: f64,
        channels: u32,
        sample_format: SampleFormat,
        big_endian: bool,
    ) -> Self {
        let bytes_per_frame = (sample_format.sample_size() as u32).saturating_mul(channels);
        let mut format_flags = FLAG_IS_PACKED;
        if sample_format.is_float() {
            format_flags |= FLAG_IS_FLOAT;
        } else if sample_format.is_signed() {
            format_flags |= FLAG_IS_SIGNED_INTEGER;
        }
        if big_endian && sample_format.sample_size() > 1 {
            format_flags |= FLAG_IS_BIG_ENDIAN;
        }

        StreamFormat {
            sample_rate,
            format_id: FormatId::LinearPcm,
            format_flags,
            bytes_per_packet: bytes_per_frame,
            frames_per_packet: 1,
            bytes_per_frame,
            channels_per_frame: channels,
            bits_per_channel: sample_format.bits(),
        }
    }

    /// Apple IMA4: 64 frames in 34 bytes per channel
    pub fn ima4(sample_rate: f64, channels: u32) -> Self {
        StreamFormat {
            sample_rate,
            format_id: FormatId::AppleIma4,
            format_flags: 0,
            bytes_per_packet: 34u32.saturating_mul(channels),
            frames_per_packet: 64,
            bytes_per_frame: 0,
            channels_per_frame: channels,
            bits_per_channel: 0,
        }
    }

    /// FLAC with fixed blocking of `block_size` frames per packet
    pub fn flac(sample_rate: f64, channels: u32, source_bits: u32, block_size: u32) -> Self {
        let format_flags = match source_bits {
            0..=16 => FLAC_16_BIT_SOURCE,
            17..=20 => FLAC_20_BIT_SOURCE,
            21..=24 => FLAC_24_BIT_SOURCE,
            _ => FLAC_32_BIT_SOURCE,
        };

        StreamFormat {
            sample_rate,
            format_id: FormatId::Flac,
            format_flags,
            bytes_per_packet: 0,
            frames_per_packet: block_size,
            bytes_per_frame: 0,
            channels_per_frame: channels,
            bits_per_channel: 0,
        }
    }

    /// Packets vary in size and need descriptors
    pub fn is_vbr(&self) -> bool {
        self.bytes_per_packet == 0
    }

    /// The format has no fixed bit depth
    pub fn is_compressed(&self) -> bool {
        self.bits_per_channel == 0
    }

    pub fn is_linear_pcm(&self) -> bool {
        self.format_id == FormatId::LinearPcm
    }

    pub fn is_float(&self) -> bool {
        self.format_flags & FLAG_IS_FLOAT != 0
    }

    pub fn is_big_endian(&self) -> bool {
        self.format_flags & FLAG_IS_BIG_ENDIAN != 0
    }

    /// Sample storage for linear PCM formats
    pub fn sample_format(&self) -> SampleFormat {
        if !self.is_linear_pcm() {
            return SampleFormat::Unknown;
        }
        let signed = self.format_flags & FLAG_IS_SIGNED_INTEGER != 0;
        SampleFormat::from_bits(self.bits_per_channel, self.is_float(), signed)
    }

    /// Bit depth of the audio a FLAC stream was encoded from
    pub fn flac_source_bits(&self) -> Option<u32> {
        match self.format_flags {
            FLAC_16_BIT_SOURCE => Some(16),
            FLAC_20_BIT_SOURCE => Some(20),
            FLAC_24_BIT_SOURCE => Some(24),
            FLAC_32_BIT_SOURCE => Some(32),
            _ => None,
        }
    }

    /// Check the fields for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate > 0.0) || !self.sample_rate.is_finite() {
            return Err(Error::format(format!(
                "Invalid sample rate: {}",
                self.sample_rate
            )));
        }

        if self.channels_per_frame == 0 || self.channels_per_frame > MAX_CHANNELS {
            return Err(Error::format(format!(
                "Invalid channel count: {}",
                self.channels_per_frame
            )));
        }

        if self.is_linear_pcm() {
            let sample_format = self.sample_format();
            if sample_format == SampleFormat::Unknown {
                return Err(Error::format(format!(
                    "Unsupported linear PCM layout: {} bits, flags 0x{:x}",
                    self.bits_per_channel, self.format_flags
                )));
            }
            let expected = sample_format.sample_size() as u32 * self.channels_per_frame;
            if self.bytes_per_frame != expected
                || self.bytes_per_packet != expected
                || self.frames_per_packet != 1
            {
                return Err(Error::format(format!(
                    "Linear PCM framing mismatch: expected {} bytes per frame and packet",
                    expected
                )));
            }
        } else if self.frames_per_packet == 0 && self.bytes_per_packet != 0 {
            return Err(Error::format(
                "Constant bit rate formats need a fixed frames-per-packet",
            ));
        }

        Ok(())
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch, {} Hz, {} (0x{:08X}) ",
            self.channels_per_frame, self.sample_rate, self.format_id, self.format_flags
        )?;

        if self.is_linear_pcm() {
            let endian = if self.is_big_endian() {
                "big-endian"
            } else {
                "little-endian"
            };
            let kind = if self.is_float() {
                "float"
            } else if self.sample_format().is_signed() {
                "signed integer"
            } else {
                "unsigned integer"
            };
            write!(f, "{}-bit {} {}", self.bits_per_channel, endian, kind)
        } else if self.is_vbr() {
            write!(
                f,
                "variable bytes/packet, {} frames/packet",
                self.frames_per_packet
            )
        } else {
            write!(
                f,
                "{} bytes/packet, {} frames/packet",
                self.bytes_per_packet, self.frames_per_packet
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_channel_counts_fail_validation() {
        let pcm = StreamFormat::linear_pcm(44100.0, 0x8000_0000, SampleFormat::I32, false);
        assert_eq!(pcm.bytes_per_frame, u32::MAX);
        assert!(matches!(pcm.validate(), Err(Error::Format(_))));

        let ima4 = StreamFormat::ima4(44100.0, u32::MAX);
        assert!(ima4.validate().is_err());

        let widest = StreamFormat::linear_pcm(44100.0, MAX_CHANNELS, SampleFormat::I16, false);
        assert!(widest.validate().is_ok());
    }

    #[test]
    fn test_linear_pcm_layout() {
        let format = StreamFormat::linear_pcm(44100.0, 2, SampleFormat::I16, false);
        assert_eq!(format.bytes_per_packet, 4);
        assert_eq!(format.bytes_per_frame, 4);
        assert_eq!(format.frames_per_packet, 1);
        assert_eq!(format.bits_per_channel, 16);
        assert_eq!(format.sample_format(), SampleFormat::I16);
        assert!(!format.is_vbr());
        assert!(!format.is_compressed());
        assert!(format.validate().is_ok());
    }

    #[test]
    fn test_u8_has_no_sign_or_endianness() {
        let format = StreamFormat::linear_pcm(8000.0, 1, SampleFormat::U8, true);
        assert!(!format.is_big_endian());
        assert_eq!(format.sample_format(), SampleFormat::U8);
    }

    #[test]
    fn test_compressed_formats() {
        let ima = StreamFormat::ima4(44100.0, 2);
        assert!(ima.is_compressed());
        assert!(!ima.is_vbr());
        assert_eq!(ima.bytes_per_packet, 68);

        let flac = StreamFormat::flac(48000.0, 2, 24, 4096);
        assert!(flac.is_compressed());
        assert!(flac.is_vbr());
        assert_eq!(flac.flac_source_bits(), Some(24));
        assert!(flac.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut format = StreamFormat::linear_pcm(44100.0, 2, SampleFormat::I16, false);
        format.channels_per_frame = 0;
        assert!(format.validate().is_err());

        let mut format = StreamFormat::linear_pcm(44100.0, 2, SampleFormat::I16, false);
        format.bytes_per_packet = 3;
        assert!(format.validate().is_err());

        let mut format = StreamFormat::linear_pcm(44100.0, 2, SampleFormat::I16, false);
        format.sample_rate = 0.0;
        assert!(format.validate().is_err());
    }

    #[test]
    fn test_display() {
        let format = StreamFormat::linear_pcm(44100.0, 1, SampleFormat::I16, false);
        let text = format.to_string();
        assert!(text.contains("'lpcm'"));
        assert!(text.contains("16-bit little-endian signed integer"));
    }

    #[test]
    fn test_format_id_names() {
        assert_eq!(FormatId::from_name("FLAC"), Some(FormatId::Flac));
        assert_eq!(FormatId::from_name("pcm"), Some(FormatId::LinearPcm));
        assert_eq!(FormatId::from_name("mp3"), None);
        assert_eq!(
            FormatId::from_fourcc(FourCC::new(b"ima4")),
            FormatId::AppleIma4
        );
    }
}
