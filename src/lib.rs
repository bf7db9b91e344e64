//! afconv - A streaming audio file converter written in Rust
//!
//! afconv reads packets from an audio file, converts them to a requested
//! output format and writes them to a new file, carrying codec
//! configuration, channel layout and priming information across.
//!
//! # Architecture
//!
//! afconv is organized into several key modules:
//!
//! - `format`: Container handling (WAV, CAF) and stream descriptions
//! - `codec`: Packet codecs (PCM, IMA4, FLAC) and the packet converter
//! - `convert`: Source reader, conversion engine, sink writer and session
//! - `swresample`: Sample rate conversion
//! - `util`: Buffers, FourCC codes and sample formats

pub mod codec;
pub mod convert;
pub mod error;
pub mod format;
pub mod swresample;
pub mod util;

pub use error::{Error, Result};

/// afconv version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Configuration for the afconv library
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Enable verbose logging
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
}

/// Initialize the afconv library with the given configuration
pub fn init(config: Config) -> Result<()> {
    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(level)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))?;
    }

    Ok(())
}
