//! Common utilities and data structures

pub mod buffer;
pub mod fourcc;
pub mod samplefmt;

pub use buffer::{Buffer, PacketBuffer};
pub use fourcc::FourCC;
pub use samplefmt::SampleFormat;
