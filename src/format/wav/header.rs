//! WAV file header structures and parsing

use crate::error::{Error, Result};
use crate::format::StreamFormat;
use crate::util::SampleFormat;
use std::io::{Read, Seek, SeekFrom};

/// WAV format tag identifying the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    /// PCM (uncompressed)
    Pcm,
    /// IEEE Float
    IeeeFloat,
    /// Extensible format, real tag in the sub-format GUID
    Extensible,
    /// Unknown format
    Unknown(u16),
}

impl From<u16> for FormatTag {
    fn from(val: u16) -> Self {
        match val {
            0x0001 => FormatTag::Pcm,
            0x0003 => FormatTag::IeeeFloat,
            0xFFFE => FormatTag::Extensible,
            other => FormatTag::Unknown(other),
        }
    }
}

impl From<FormatTag> for u16 {
    fn from(tag: FormatTag) -> Self {
        match tag {
            FormatTag::Pcm => 0x0001,
            FormatTag::IeeeFloat => 0x0003,
            FormatTag::Extensible => 0xFFFE,
            FormatTag::Unknown(val) => val,
        }
    }
}

/// WAV format chunk data
#[derive(Debug, Clone)]
pub struct WavFormat {
    /// Format tag (codec ID)
    pub format_tag: FormatTag,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Average bytes per second
    pub byte_rate: u32,
    /// Block alignment
    pub block_align: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Tag carried in the first two bytes of an extensible sub-format GUID
    pub sub_format: Option<FormatTag>,
}

impl WavFormat {
    /// Parse WAV format chunk from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(Error::format("WAV format chunk too small"));
        }

        let format_tag = u16::from_le_bytes([data[0], data[1]]).into();
        let channels = u16::from_le_bytes([data[2], data[3]]);
        let sample_rate = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let byte_rate = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        let block_align = u16::from_le_bytes([data[12], data[13]]);
        let bits_per_sample = u16::from_le_bytes([data[14], data[15]]);

        // cbSize(2) validBits(2) channelMask(4) subFormat GUID(16)
        let sub_format = if format_tag == FormatTag::Extensible {
            if data.len() < 40 {
                return Err(Error::format("WAVE_FORMAT_EXTENSIBLE chunk too small"));
            }
            Some(FormatTag::from(u16::from_le_bytes([data[24], data[25]])))
        } else {
            None
        };

        Ok(WavFormat {
            format_tag,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            sub_format,
        })
    }

    /// Build the plain format chunk for a linear PCM stream
    pub fn from_stream_format(format: &StreamFormat) -> Result<Self> {
        let sample_format = format.sample_format();
        let format_tag = match sample_format {
            SampleFormat::U8 | SampleFormat::I16 | SampleFormat::I24 | SampleFormat::I32 => {
                FormatTag::Pcm
            }
            SampleFormat::F32 | SampleFormat::F64 => FormatTag::IeeeFloat,
            _ => {
                return Err(Error::unsupported(format!(
                    "Sample format not supported for WAV: {}",
                    sample_format
                )))
            }
        };

        let channels = u16::try_from(format.channels_per_frame)
            .map_err(|_| Error::format("Too many channels for WAV"))?;
        let sample_rate = format.sample_rate.round() as u32;
        let block_align = format.bytes_per_frame as u16;

        Ok(WavFormat {
            format_tag,
            channels,
            sample_rate,
            byte_rate: sample_rate * block_align as u32,
            block_align,
            bits_per_sample: format.bits_per_channel as u16,
            sub_format: None,
        })
    }

    /// Convert to bytes for writing
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16);

        bytes.extend_from_slice(&u16::from(self.format_tag).to_le_bytes());
        bytes.extend_from_slice(&self.channels.to_le_bytes());
        bytes.extend_from_slice(&self.sample_rate.to_le_bytes());
        bytes.extend_from_slice(&self.byte_rate.to_le_bytes());
        bytes.extend_from_slice(&self.block_align.to_le_bytes());
        bytes.extend_from_slice(&self.bits_per_sample.to_le_bytes());

        bytes
    }

    /// Tag that decides how samples are stored
    pub fn effective_tag(&self) -> FormatTag {
        self.sub_format.unwrap_or(self.format_tag)
    }

    /// Get the internal sample format
    pub fn sample_format(&self) -> SampleFormat {
        match (self.effective_tag(), self.bits_per_sample) {
            (FormatTag::Pcm, 8) => SampleFormat::U8,
            (FormatTag::Pcm, 16) => SampleFormat::I16,
            (FormatTag::Pcm, 24) => SampleFormat::I24,
            (FormatTag::Pcm, 32) => SampleFormat::I32,
            (FormatTag::IeeeFloat, 32) => SampleFormat::F32,
            (FormatTag::IeeeFloat, 64) => SampleFormat::F64,
            _ => SampleFormat::Unknown,
        }
    }

    /// Describe the stored samples as a stream format
    pub fn to_stream_format(&self) -> Result<StreamFormat> {
        let sample_format = self.sample_format();
        if sample_format == SampleFormat::Unknown {
            return Err(Error::unsupported(format!(
                "Unsupported WAV format: {:?}, {} bits",
                self.effective_tag(),
                self.bits_per_sample
            )));
        }
        Ok(StreamFormat::linear_pcm(
            self.sample_rate as f64,
            self.channels as u32,
            sample_format,
            false,
        ))
    }

    /// Calculate expected block alignment
    pub fn calculate_block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    /// Validate format parameters
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(Error::format("Invalid channel count: 0"));
        }

        if self.sample_rate == 0 {
            return Err(Error::format("Invalid sample rate: 0"));
        }

        if self.bits_per_sample == 0 || self.bits_per_sample % 8 != 0 {
            return Err(Error::format(format!(
                "Invalid bits per sample: {}",
                self.bits_per_sample
            )));
        }

        let expected_block_align = self.calculate_block_align();
        if self.block_align != expected_block_align {
            return Err(Error::format(format!(
                "Block align mismatch: expected {}, got {}",
                expected_block_align, self.block_align
            )));
        }

        Ok(())
    }
}

/// Complete WAV file header
#[derive(Debug, Clone)]
pub struct WavHeader {
    /// WAV format information
    pub format: WavFormat,
    /// Data chunk size in bytes
    pub data_size: u64,
    /// Data chunk start position in file
    pub data_start: u64,
}

impl WavHeader {
    /// Read and parse WAV header from a reader
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let mut riff_header = [0u8; 12];
        reader
            .read_exact(&mut riff_header)
            .map_err(|e| Error::format(format!("Failed to read RIFF header: {}", e)))?;

        if &riff_header[0..4] != super::RIFF_MAGIC {
            return Err(Error::format("Not a valid RIFF file"));
        }

        if &riff_header[8..12] != super::WAVE_MAGIC {
            return Err(Error::format("Not a valid WAVE file"));
        }

        let mut format = None;
        loop {
            let mut chunk_header = [0u8; 8];
            if reader.read_exact(&mut chunk_header).is_err() {
                return Err(Error::format(if format.is_none() {
                    "fmt chunk not found"
                } else {
                    "data chunk not found"
                }));
            }

            let chunk = super::ChunkHeader::from_bytes(&chunk_header)
                .ok_or_else(|| Error::format("Truncated chunk header"))?;

            if &chunk.id == super::FMT_CHUNK {
                let mut fmt_data = vec![0u8; chunk.size as usize];
                reader
                    .read_exact(&mut fmt_data)
                    .map_err(|e| Error::format(format!("Failed to read fmt chunk: {}", e)))?;

                let parsed = WavFormat::from_bytes(&fmt_data)?;
                parsed.validate()?;
                format = Some(parsed);

                // WAV chunks are word-aligned
                if chunk.size % 2 != 0 {
                    reader.seek(SeekFrom::Current(1))?;
                }
            } else if &chunk.id == super::DATA_CHUNK {
                let format = format.ok_or_else(|| Error::format("data chunk before fmt chunk"))?;
                let data_start = reader
                    .stream_position()
                    .map_err(|e| Error::format(format!("Failed to get data position: {}", e)))?;

                // Trust the file length over a placeholder or oversized size field
                let file_end = reader.seek(SeekFrom::End(0))?;
                let data_size = (chunk.size as u64).min(file_end.saturating_sub(data_start));

                return Ok(WavHeader {
                    format,
                    data_size,
                    data_start,
                });
            } else {
                let skip = chunk.size as i64 + (chunk.size % 2) as i64;
                reader
                    .seek(SeekFrom::Current(skip))
                    .map_err(|e| Error::format(format!("Failed to skip chunk: {}", e)))?;
            }
        }
    }

    /// Get total number of frames (per channel)
    pub fn num_frames(&self) -> u64 {
        self.data_size / self.format.block_align as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pcm16_stereo() -> WavFormat {
        WavFormat {
            format_tag: FormatTag::Pcm,
            channels: 2,
            sample_rate: 44100,
            byte_rate: 176400,
            block_align: 4,
            bits_per_sample: 16,
            sub_format: None,
        }
    }

    #[test]
    fn test_format_tag_conversion() {
        assert_eq!(u16::from(FormatTag::Pcm), 0x0001);
        assert_eq!(FormatTag::from(0x0001), FormatTag::Pcm);
        assert_eq!(FormatTag::from(0x0055), FormatTag::Unknown(0x0055));
    }

    #[test]
    fn test_wav_format_validation() {
        let mut format = pcm16_stereo();
        assert!(format.validate().is_ok());
        assert_eq!(format.sample_format(), SampleFormat::I16);

        format.channels = 0;
        assert!(format.validate().is_err());
        format.channels = 2;

        format.block_align = 3;
        assert!(format.validate().is_err());
    }

    #[test]
    fn test_extensible_sub_format() {
        let mut data = vec![0u8; 40];
        data[0..2].copy_from_slice(&0xFFFEu16.to_le_bytes());
        data[2..4].copy_from_slice(&2u16.to_le_bytes());
        data[4..8].copy_from_slice(&48000u32.to_le_bytes());
        data[12..14].copy_from_slice(&8u16.to_le_bytes());
        data[14..16].copy_from_slice(&32u16.to_le_bytes());
        data[24..26].copy_from_slice(&3u16.to_le_bytes());

        let format = WavFormat::from_bytes(&data).unwrap();
        assert_eq!(format.format_tag, FormatTag::Extensible);
        assert_eq!(format.sample_format(), SampleFormat::F32);
        assert!(format.to_stream_format().unwrap().is_float());
    }

    #[test]
    fn test_header_skips_unknown_chunks() {
        let mut file = Vec::new();
        file.extend_from_slice(b"RIFF");
        file.extend_from_slice(&0u32.to_le_bytes());
        file.extend_from_slice(b"WAVE");
        file.extend_from_slice(b"fmt ");
        file.extend_from_slice(&16u32.to_le_bytes());
        file.extend_from_slice(&pcm16_stereo().to_bytes());
        file.extend_from_slice(b"LIST");
        file.extend_from_slice(&3u32.to_le_bytes());
        file.extend_from_slice(&[0, 0, 0, 0]);
        file.extend_from_slice(b"data");
        file.extend_from_slice(&8u32.to_le_bytes());
        file.extend_from_slice(&[0u8; 8]);

        let header = WavHeader::read(&mut Cursor::new(file)).unwrap();
        assert_eq!(header.data_size, 8);
        assert_eq!(header.num_frames(), 2);
        assert_eq!(header.data_start, 56);
    }
}
