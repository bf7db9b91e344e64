//! Linear PCM sample format definitions

use std::fmt;

/// Storage format of one linear PCM sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    /// Unsigned 8-bit, centred on 128
    U8,
    /// Signed 8-bit
    I8,
    /// Signed 16-bit
    I16,
    /// Signed 24-bit, packed in 3 bytes
    I24,
    /// Signed 32-bit
    I32,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Unknown format
    #[default]
    Unknown,
}

impl SampleFormat {
    /// Resolve a sample format from its bit depth and numeric kind
    pub fn from_bits(bits: u32, float: bool, signed: bool) -> Self {
        match (bits, float, signed) {
            (8, false, false) => SampleFormat::U8,
            (8, false, true) => SampleFormat::I8,
            (16, false, _) => SampleFormat::I16,
            (24, false, _) => SampleFormat::I24,
            (32, false, _) => SampleFormat::I32,
            (32, true, _) => SampleFormat::F32,
            (64, true, _) => SampleFormat::F64,
            _ => SampleFormat::Unknown,
        }
    }

    /// Get the size in bytes of one sample
    pub fn sample_size(&self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::I8 => 1,
            SampleFormat::I16 => 2,
            SampleFormat::I24 => 3,
            SampleFormat::I32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
            SampleFormat::Unknown => 0,
        }
    }

    /// Bits per sample
    pub fn bits(&self) -> u32 {
        self.sample_size() as u32 * 8
    }

    /// Check if this is a floating point format
    pub fn is_float(&self) -> bool {
        matches!(self, SampleFormat::F32 | SampleFormat::F64)
    }

    /// Check if samples are signed
    pub fn is_signed(&self) -> bool {
        !matches!(self, SampleFormat::U8 | SampleFormat::Unknown)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::U8 => "u8",
            SampleFormat::I8 => "s8",
            SampleFormat::I16 => "s16",
            SampleFormat::I24 => "s24",
            SampleFormat::I32 => "s32",
            SampleFormat::F32 => "f32",
            SampleFormat::F64 => "f64",
            SampleFormat::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}
