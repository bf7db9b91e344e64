//! Container format handling (demuxing and muxing)
//!
//! This module provides the packet-level containers the converter reads from
//! and writes to, together with the stream format description and the side
//! metadata that travels next to the packets.

pub mod caf;
pub mod demuxer;
pub mod metadata;
pub mod muxer;
pub mod packet;
pub mod stream;
pub mod wav;

pub use demuxer::{Demuxer, DemuxerContext};
pub use metadata::{ChannelLayout, PacketTableInfo, PrimeInfo, Property};
pub use muxer::{Muxer, MuxerContext};
pub use packet::{PacketBatch, PacketDescription};
pub use stream::{FormatId, StreamFormat};

use crate::error::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Audio container types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// RIFF/WAVE
    Wav,
    /// Core Audio Format
    Caf,
}

impl FileType {
    pub fn name(&self) -> &'static str {
        match self {
            FileType::Wav => "wav",
            FileType::Caf => "caf",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.name()
    }

    /// Parse a container name or file extension
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(FileType::Wav),
            "caf" | "caff" => Some(FileType::Caf),
            _ => None,
        }
    }

    /// Guess the container from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(FileType::from_name)
    }

    /// Whether the container can store packets of `format`
    pub fn supports(&self, format: &StreamFormat) -> bool {
        match self {
            FileType::Wav => wav::WavMuxer::supports(format),
            FileType::Caf => caf::CafMuxer::supports(format),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Container capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCapabilities {
    /// Container stores a codec magic cookie
    pub magic_cookie: bool,
    /// Container stores a channel layout
    pub channel_layout: bool,
    /// Container stores priming and remainder frames
    pub packet_table: bool,
    /// Container stores variable-bit-rate packets
    pub variable_packets: bool,
}

/// Container format information
#[derive(Debug, Clone)]
pub struct FormatInfo {
    pub file_type: FileType,
    /// Long/descriptive name
    pub long_name: &'static str,
    /// File extensions
    pub extensions: &'static [&'static str],
    pub capabilities: FormatCapabilities,
}

/// Information about every supported container
pub fn format_infos() -> Vec<FormatInfo> {
    vec![
        FormatInfo {
            file_type: FileType::Wav,
            long_name: "WAV / WAVE (Waveform Audio)",
            extensions: &["wav", "wave"],
            capabilities: FormatCapabilities {
                magic_cookie: false,
                channel_layout: false,
                packet_table: false,
                variable_packets: false,
            },
        },
        FormatInfo {
            file_type: FileType::Caf,
            long_name: "CAF (Core Audio Format)",
            extensions: &["caf"],
            capabilities: FormatCapabilities {
                magic_cookie: true,
                channel_layout: true,
                packet_table: true,
                variable_packets: true,
            },
        },
    ]
}

/// Detect the container from the file's leading magic bytes, falling back
/// to its extension
pub fn detect_file_type(path: &Path) -> Result<FileType> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path)?;
    let read = file.read(&mut magic)?;
    if read == 4 {
        match &magic {
            wav::RIFF_MAGIC => return Ok(FileType::Wav),
            caf::CAFF_MAGIC => return Ok(FileType::Caf),
            _ => {}
        }
    }

    FileType::from_path(path).ok_or_else(|| {
        Error::unsupported(format!(
            "Unrecognized audio file type: {}",
            path.display()
        ))
    })
}

/// Open a demuxer for the given file
pub fn create_demuxer(path: &Path) -> Result<Box<dyn Demuxer>> {
    match detect_file_type(path)? {
        FileType::Wav => Ok(Box::new(wav::WavDemuxer::open(path)?)),
        FileType::Caf => Ok(Box::new(caf::CafDemuxer::open(path)?)),
    }
}

/// Create (or truncate) `dir/name` and return a muxer writing `format` into it
pub fn create_muxer(
    dir: &Path,
    name: &str,
    file_type: FileType,
    format: &StreamFormat,
) -> Result<Box<dyn Muxer>> {
    if name.is_empty() {
        return Err(Error::invalid_input("Empty output file name"));
    }
    if !dir.is_dir() {
        return Err(Error::invalid_input(format!(
            "Output directory does not exist: {}",
            dir.display()
        )));
    }
    if !file_type.supports(format) {
        return Err(Error::unsupported(format!(
            "{} files cannot store {}",
            file_type, format
        )));
    }

    let path = dir.join(name);
    match file_type {
        FileType::Wav => Ok(Box::new(wav::WavMuxer::create(&path, format)?)),
        FileType::Caf => Ok(Box::new(caf::CafMuxer::create(&path, format)?)),
    }
}
