//! File-to-file conversion
//!
//! A conversion is split into three parts that share nothing but packets:
//!
//! - [`SourceReader`]: reads packet batches from the input file
//! - [`ConversionEngine`]: pulls from the reader and produces output packets
//! - [`SinkWriter`]: appends output packets and side metadata to the output
//!
//! [`ConversionSession`] drives them until the converter reports no more
//! output.
//!
//! ## Usage
//!
//! ```no_run
//! use afconv_lib::codec::OutputFormatRequest;
//! use afconv_lib::convert::{convert_file, ConvertOptions};
//! use afconv_lib::format::FormatId;
//! use std::path::Path;
//!
//! let request = OutputFormatRequest::new(FormatId::Flac);
//! let report = convert_file(
//!     Path::new("input.wav"),
//!     Path::new("output.caf"),
//!     None,
//!     &request,
//!     &ConvertOptions::default(),
//! )?;
//! println!("{} frames", report.output_frames);
//! # Ok::<(), afconv_lib::Error>(())
//! ```

pub mod engine;
pub mod session;
pub mod sink;
pub mod source;

pub use engine::ConversionEngine;
pub use session::{ConversionReport, ConversionSession};
pub use sink::SinkWriter;
pub use source::SourceReader;

use crate::codec::OutputFormatRequest;
use crate::error::{Error, Result};
use crate::format::{ChannelLayout, FileType};
use std::path::Path;

/// Default size of the input and output packet buffers in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 32768;

/// Buffer sizing and output overrides for a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Bytes read from the input per request
    pub source_buffer_size: usize,
    /// Bytes of converted packets written per fill
    pub output_buffer_size: usize,
    /// Channel layout to store in the output instead of the derived one
    pub output_channel_layout: Option<ChannelLayout>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            source_buffer_size: DEFAULT_BUFFER_SIZE,
            output_buffer_size: DEFAULT_BUFFER_SIZE,
            output_channel_layout: None,
        }
    }
}

impl ConvertOptions {
    pub fn validate(&self) -> Result<()> {
        if self.source_buffer_size == 0 {
            return Err(Error::config("Source buffer size must be positive"));
        }
        if self.output_buffer_size == 0 {
            return Err(Error::config("Output buffer size must be positive"));
        }
        Ok(())
    }
}

/// Convert `input` into `output`.
///
/// The container type is taken from `output`'s extension unless given.
pub fn convert_file(
    input: &Path,
    output: &Path,
    file_type: Option<FileType>,
    request: &OutputFormatRequest,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    options.validate()?;

    let file_type = match file_type {
        Some(file_type) => file_type,
        None => FileType::from_path(output).ok_or_else(|| {
            Error::invalid_input(format!(
                "Cannot tell the file type of {}, pass it explicitly",
                output.display()
            ))
        })?,
    };

    let name = output
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::invalid_input(format!("Invalid output path: {}", output.display()))
        })?;
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    ConversionSession::open(input, dir, name, file_type, request, options)?.run()
}
