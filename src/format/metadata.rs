//! Side metadata carried next to the audio packets
//!
//! - **Magic cookie**: codec-private configuration bytes, opaque to containers
//! - **Channel layout**: Core Audio channel layout, stored big endian
//! - **Packet table info**: priming and remainder frames around the valid audio
//! - **Prime info**: the converter's view of leading and trailing frames

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// Layout tag: channels are described one by one
pub const LAYOUT_TAG_USE_CHANNEL_DESCRIPTIONS: u32 = 0;
/// Layout tag: channels are given by the bitmap field
pub const LAYOUT_TAG_USE_CHANNEL_BITMAP: u32 = 1 << 16;
/// Layout tag: discrete channels in file order, count in the low 16 bits
pub const LAYOUT_TAG_DISCRETE_IN_ORDER: u32 = 147 << 16;

const LAYOUT_HEADER_SIZE: usize = 12;
const CHANNEL_DESCRIPTION_SIZE: usize = 20;

/// An opaque Core Audio channel layout.
///
/// The bytes are kept exactly as stored; only the channel count is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    data: Bytes,
}

impl ChannelLayout {
    /// Wrap stored layout bytes, checking that they are well formed
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        if data.len() < LAYOUT_HEADER_SIZE {
            return Err(Error::format(format!(
                "Channel layout too short: {} bytes",
                data.len()
            )));
        }

        let descriptions = BigEndian::read_u32(&data[8..12]) as usize;
        let needed = LAYOUT_HEADER_SIZE + descriptions * CHANNEL_DESCRIPTION_SIZE;
        if data.len() < needed {
            return Err(Error::format(format!(
                "Channel layout declares {} descriptions but holds {} bytes",
                descriptions,
                data.len()
            )));
        }

        Ok(ChannelLayout { data })
    }

    /// Layout of `channels` discrete channels in file order
    pub fn discrete(channels: u32) -> Self {
        let mut data = vec![0u8; LAYOUT_HEADER_SIZE];
        BigEndian::write_u32(
            &mut data[0..4],
            LAYOUT_TAG_DISCRETE_IN_ORDER | (channels & 0xFFFF),
        );
        ChannelLayout {
            data: Bytes::from(data),
        }
    }

    pub fn tag(&self) -> u32 {
        BigEndian::read_u32(&self.data[0..4])
    }

    pub fn bitmap(&self) -> u32 {
        BigEndian::read_u32(&self.data[4..8])
    }

    /// Number of channels the layout describes
    pub fn channel_count(&self) -> u32 {
        match self.tag() {
            LAYOUT_TAG_USE_CHANNEL_DESCRIPTIONS => BigEndian::read_u32(&self.data[8..12]),
            LAYOUT_TAG_USE_CHANNEL_BITMAP => self.bitmap().count_ones(),
            tag => tag & 0xFFFF,
        }
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Frames trimmed from the start and end of a packetized stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PacketTableInfo {
    pub valid_frames: i64,
    pub priming_frames: i32,
    pub remainder_frames: i32,
}

impl PacketTableInfo {
    /// Derive the valid frame count from a total and the trimmed edges
    pub fn from_total(total_frames: u64, priming_frames: u32, remainder_frames: u32) -> Self {
        let valid = total_frames as i64 - priming_frames as i64 - remainder_frames as i64;
        PacketTableInfo {
            valid_frames: valid.max(0),
            priming_frames: priming_frames as i32,
            remainder_frames: remainder_frames as i32,
        }
    }
}

/// Leading and trailing frames the converter adds around the real audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PrimeInfo {
    pub leading_frames: u32,
    pub trailing_frames: u32,
}

/// A container property that can be written next to the packets
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    MagicCookie(Bytes),
    ChannelLayout(ChannelLayout),
    PacketTableInfo(PacketTableInfo),
}

impl Property {
    pub fn name(&self) -> &'static str {
        match self {
            Property::MagicCookie(_) => "magic cookie",
            Property::ChannelLayout(_) => "channel layout",
            Property::PacketTableInfo(_) => "packet table info",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::MagicCookie(cookie) => write!(f, "magic cookie ({} bytes)", cookie.len()),
            Property::ChannelLayout(layout) => {
                write!(f, "channel layout ({} channels)", layout.channel_count())
            }
            Property::PacketTableInfo(info) => write!(
                f,
                "packet table info (valid={}, priming={}, remainder={})",
                info.valid_frames, info.priming_frames, info.remainder_frames
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discrete_layout() {
        let layout = ChannelLayout::discrete(6);
        assert_eq!(layout.len(), 12);
        assert_eq!(layout.channel_count(), 6);
    }

    #[test]
    fn test_bitmap_and_description_layouts() {
        let mut data = vec![0u8; 12];
        BigEndian::write_u32(&mut data[0..4], LAYOUT_TAG_USE_CHANNEL_BITMAP);
        BigEndian::write_u32(&mut data[4..8], 0b111);
        let layout = ChannelLayout::from_bytes(Bytes::from(data)).unwrap();
        assert_eq!(layout.channel_count(), 3);

        let mut data = vec![0u8; 12 + 2 * 20];
        BigEndian::write_u32(&mut data[8..12], 2);
        let layout = ChannelLayout::from_bytes(Bytes::from(data)).unwrap();
        assert_eq!(layout.channel_count(), 2);
    }

    #[test]
    fn test_malformed_layout() {
        assert!(ChannelLayout::from_bytes(Bytes::from_static(&[0; 8])).is_err());

        let mut data = vec![0u8; 12];
        BigEndian::write_u32(&mut data[8..12], 1);
        assert!(ChannelLayout::from_bytes(Bytes::from(data)).is_err());
    }

    #[test]
    fn test_packet_table_from_total() {
        let info = PacketTableInfo::from_total(4096, 0, 96);
        assert_eq!(info.valid_frames, 4000);
        assert_eq!(info.remainder_frames, 96);

        let info = PacketTableInfo::from_total(10, 20, 0);
        assert_eq!(info.valid_frames, 0);
    }
}
