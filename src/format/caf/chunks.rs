//! CAF chunk bodies: audio description and packet table

use super::{read_varint, write_varint};
use crate::error::{Error, Result};
use crate::format::stream::MAX_CHANNELS;
use crate::format::{FormatId, PacketTableInfo, StreamFormat};
use crate::util::{FourCC, SampleFormat};
use byteorder::{BigEndian, ByteOrder};

/// CAF linear PCM flag: samples are floats
pub const CAF_LPCM_FLAG_IS_FLOAT: u32 = 1 << 0;
/// CAF linear PCM flag: samples are little endian
pub const CAF_LPCM_FLAG_IS_LITTLE_ENDIAN: u32 = 1 << 1;

/// Body of the `desc` chunk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CafDescription {
    pub sample_rate: f64,
    pub format_id: FourCC,
    pub format_flags: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl CafDescription {
    pub const SIZE: usize = 32;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::format(format!(
                "CAF desc chunk too small: {} bytes",
                data.len()
            )));
        }
        Ok(CafDescription {
            sample_rate: BigEndian::read_f64(&data[0..8]),
            format_id: FourCC(BigEndian::read_u32(&data[8..12])),
            format_flags: BigEndian::read_u32(&data[12..16]),
            bytes_per_packet: BigEndian::read_u32(&data[16..20]),
            frames_per_packet: BigEndian::read_u32(&data[20..24]),
            channels_per_frame: BigEndian::read_u32(&data[24..28]),
            bits_per_channel: BigEndian::read_u32(&data[28..32]),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; Self::SIZE];
        BigEndian::write_f64(&mut bytes[0..8], self.sample_rate);
        BigEndian::write_u32(&mut bytes[8..12], self.format_id.0);
        BigEndian::write_u32(&mut bytes[12..16], self.format_flags);
        BigEndian::write_u32(&mut bytes[16..20], self.bytes_per_packet);
        BigEndian::write_u32(&mut bytes[20..24], self.frames_per_packet);
        BigEndian::write_u32(&mut bytes[24..28], self.channels_per_frame);
        BigEndian::write_u32(&mut bytes[28..32], self.bits_per_channel);
        bytes
    }

    /// Describe a stream for storage. CAF integer PCM is always signed, so
    /// unsigned 8-bit samples cannot be stored.
    pub fn from_stream_format(format: &StreamFormat) -> Result<Self> {
        let format_flags = if format.is_linear_pcm() {
            if format.sample_format() == SampleFormat::U8 {
                return Err(Error::unsupported(
                    "CAF stores 8-bit linear PCM as signed samples only",
                ));
            }
            let mut flags = 0;
            if format.is_float() {
                flags |= CAF_LPCM_FLAG_IS_FLOAT;
            }
            if !format.is_big_endian() {
                flags |= CAF_LPCM_FLAG_IS_LITTLE_ENDIAN;
            }
            flags
        } else {
            format.format_flags
        };

        Ok(CafDescription {
            sample_rate: format.sample_rate,
            format_id: format.format_id.fourcc(),
            format_flags,
            bytes_per_packet: format.bytes_per_packet,
            frames_per_packet: format.frames_per_packet,
            channels_per_frame: format.channels_per_frame,
            bits_per_channel: format.bits_per_channel,
        })
    }

    /// The stream format this description stores
    pub fn to_stream_format(&self) -> Result<StreamFormat> {
        if self.channels_per_frame == 0 || self.channels_per_frame > MAX_CHANNELS {
            return Err(Error::format(format!(
                "Invalid CAF channel count: {}",
                self.channels_per_frame
            )));
        }
        let format_id = FormatId::from_fourcc(self.format_id);

        let format = if format_id == FormatId::LinearPcm {
            let float = self.format_flags & CAF_LPCM_FLAG_IS_FLOAT != 0;
            let big_endian = self.format_flags & CAF_LPCM_FLAG_IS_LITTLE_ENDIAN == 0;
            let sample_format = SampleFormat::from_bits(self.bits_per_channel, float, true);
            let format = StreamFormat::linear_pcm(
                self.sample_rate,
                self.channels_per_frame,
                sample_format,
                big_endian,
            );
            if sample_format == SampleFormat::Unknown
                || format.bytes_per_packet != self.bytes_per_packet
                || self.frames_per_packet != 1
            {
                return Err(Error::unsupported(format!(
                    "Unsupported CAF linear PCM layout: {} bits in {} bytes per packet",
                    self.bits_per_channel, self.bytes_per_packet
                )));
            }
            format
        } else {
            StreamFormat {
                sample_rate: self.sample_rate,
                format_id,
                format_flags: self.format_flags,
                bytes_per_packet: self.bytes_per_packet,
                frames_per_packet: self.frames_per_packet,
                bytes_per_frame: 0,
                channels_per_frame: self.channels_per_frame,
                bits_per_channel: self.bits_per_channel,
            }
        };

        format.validate()?;
        Ok(format)
    }
}

/// One packet table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketEntry {
    pub byte_size: u32,
    pub frames: u32,
}

/// Body of the `pakt` chunk
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PacketTable {
    pub number_packets: i64,
    pub info: PacketTableInfo,
    /// Per-packet sizes and frame counts; a field is only stored when the
    /// description leaves it variable
    pub entries: Vec<PacketEntry>,
}

impl PacketTable {
    const HEADER_SIZE: usize = 24;

    /// Parse a packet table, reading sizes when `bytes_per_packet` is zero and
    /// frame counts when `frames_per_packet` is zero
    pub fn from_bytes(data: &[u8], bytes_per_packet: u32, frames_per_packet: u32) -> Result<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::format("CAF pakt chunk too small"));
        }

        let number_packets = BigEndian::read_i64(&data[0..8]);
        let info = PacketTableInfo {
            valid_frames: BigEndian::read_i64(&data[8..16]),
            priming_frames: BigEndian::read_i32(&data[16..20]),
            remainder_frames: BigEndian::read_i32(&data[20..24]),
        };
        if number_packets < 0 {
            return Err(Error::format(format!(
                "Negative packet count in pakt chunk: {}",
                number_packets
            )));
        }

        let mut entries = Vec::new();
        if bytes_per_packet == 0 || frames_per_packet == 0 {
            // Each entry takes at least one byte per stored field
            let body = data.len() - Self::HEADER_SIZE;
            if number_packets as u64 > body as u64 {
                return Err(Error::format(format!(
                    "pakt chunk declares {} packets in {} bytes",
                    number_packets, body
                )));
            }
            entries.reserve(number_packets as usize);

            let mut pos = Self::HEADER_SIZE;
            for _ in 0..number_packets {
                let byte_size = if bytes_per_packet == 0 {
                    varint_u32(data, &mut pos)?
                } else {
                    bytes_per_packet
                };
                let frames = if frames_per_packet == 0 {
                    varint_u32(data, &mut pos)?
                } else {
                    frames_per_packet
                };
                entries.push(PacketEntry { byte_size, frames });
            }
        }

        Ok(PacketTable {
            number_packets,
            info,
            entries,
        })
    }

    pub fn to_bytes(&self, bytes_per_packet: u32, frames_per_packet: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_SIZE + self.entries.len() * 3);
        out.extend_from_slice(&self.number_packets.to_be_bytes());
        out.extend_from_slice(&self.info.valid_frames.to_be_bytes());
        out.extend_from_slice(&self.info.priming_frames.to_be_bytes());
        out.extend_from_slice(&self.info.remainder_frames.to_be_bytes());

        if bytes_per_packet == 0 || frames_per_packet == 0 {
            for entry in &self.entries {
                if bytes_per_packet == 0 {
                    write_varint(&mut out, entry.byte_size as u64);
                }
                if frames_per_packet == 0 {
                    write_varint(&mut out, entry.frames as u64);
                }
            }
        }
        out
    }
}

fn varint_u32(data: &[u8], pos: &mut usize) -> Result<u32> {
    let value = read_varint(data, pos)?;
    u32::try_from(value)
        .map_err(|_| Error::format(format!("Packet table entry too large: {}", value)))
}
