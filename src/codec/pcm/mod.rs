//! PCM (Pulse Code Modulation) codec
//!
//! PCM is uncompressed audio, the simplest codec. This module converts
//! between stored PCM bytes and interleaved full-scale `i32` samples.

pub mod decoder;
pub mod encoder;

pub use decoder::PcmDecoder;
pub use encoder::PcmEncoder;

use crate::error::{Error, Result};
use crate::format::StreamFormat;
use crate::util::SampleFormat;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

const FULL_SCALE: f64 = 2147483648.0;

/// PCM codec configuration
#[derive(Debug, Clone)]
pub struct PcmConfig {
    /// Sample format
    pub sample_format: SampleFormat,
    /// Number of channels
    pub channels: u32,
    /// Samples are stored big endian
    pub big_endian: bool,
}

impl PcmConfig {
    /// Create a new PCM configuration
    pub fn new(sample_format: SampleFormat, channels: u32, big_endian: bool) -> Self {
        PcmConfig {
            sample_format,
            channels,
            big_endian,
        }
    }

    /// Configuration for a linear PCM stream format
    pub fn from_stream_format(format: &StreamFormat) -> Result<Self> {
        if !format.is_linear_pcm() {
            return Err(Error::codec(format!(
                "Not a linear PCM format: {}",
                format.format_id
            )));
        }
        format.validate()?;
        Ok(PcmConfig::new(
            format.sample_format(),
            format.channels_per_frame,
            format.is_big_endian(),
        ))
    }

    /// Get bytes per sample for a single channel
    pub fn bytes_per_sample(&self) -> usize {
        self.sample_format.sample_size()
    }

    /// Get bytes per frame (all channels)
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Calculate number of frames from byte count
    pub fn frames_from_bytes(&self, bytes: usize) -> usize {
        bytes / self.bytes_per_frame()
    }

    /// Read one stored sample as a full-scale value
    pub fn read_sample(&self, bytes: &[u8]) -> i32 {
        let be = self.big_endian;
        match self.sample_format {
            SampleFormat::U8 => (bytes[0] as i32 - 128) << 24,
            SampleFormat::I8 => (bytes[0] as i8 as i32) << 24,
            SampleFormat::I16 => {
                let v = if be {
                    BigEndian::read_i16(bytes)
                } else {
                    LittleEndian::read_i16(bytes)
                };
                (v as i32) << 16
            }
            SampleFormat::I24 => {
                let v = if be {
                    BigEndian::read_i24(bytes)
                } else {
                    LittleEndian::read_i24(bytes)
                };
                v << 8
            }
            SampleFormat::I32 => {
                if be {
                    BigEndian::read_i32(bytes)
                } else {
                    LittleEndian::read_i32(bytes)
                }
            }
            SampleFormat::F32 => {
                let v = if be {
                    BigEndian::read_f32(bytes)
                } else {
                    LittleEndian::read_f32(bytes)
                };
                float_to_full_scale(v as f64)
            }
            SampleFormat::F64 => {
                let v = if be {
                    BigEndian::read_f64(bytes)
                } else {
                    LittleEndian::read_f64(bytes)
                };
                float_to_full_scale(v)
            }
            SampleFormat::Unknown => 0,
        }
    }

    /// Store one full-scale value in `slot`
    pub fn write_sample(&self, value: i32, slot: &mut [u8]) {
        let be = self.big_endian;
        match self.sample_format {
            SampleFormat::U8 => slot[0] = ((value >> 24) + 128) as u8,
            SampleFormat::I8 => slot[0] = (value >> 24) as i8 as u8,
            SampleFormat::I16 => {
                let v = (value >> 16) as i16;
                if be {
                    BigEndian::write_i16(slot, v)
                } else {
                    LittleEndian::write_i16(slot, v)
                }
            }
            SampleFormat::I24 => {
                let v = value >> 8;
                if be {
                    BigEndian::write_i24(slot, v)
                } else {
                    LittleEndian::write_i24(slot, v)
                }
            }
            SampleFormat::I32 => {
                if be {
                    BigEndian::write_i32(slot, value)
                } else {
                    LittleEndian::write_i32(slot, value)
                }
            }
            SampleFormat::F32 => {
                let v = (value as f64 / FULL_SCALE) as f32;
                if be {
                    BigEndian::write_f32(slot, v)
                } else {
                    LittleEndian::write_f32(slot, v)
                }
            }
            SampleFormat::F64 => {
                let v = value as f64 / FULL_SCALE;
                if be {
                    BigEndian::write_f64(slot, v)
                } else {
                    LittleEndian::write_f64(slot, v)
                }
            }
            SampleFormat::Unknown => {}
        }
    }
}

/// Scale a float sample in [-1.0, 1.0] to the full `i32` range
fn float_to_full_scale(v: f64) -> i32 {
    if v.is_nan() {
        return 0;
    }
    // `as` saturates at the i32 bounds
    (v.clamp(-1.0, 1.0) * FULL_SCALE) as i32
}
