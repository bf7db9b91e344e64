//! Packet batches and variable-bit-rate packet descriptors

use crate::error::{Error, Result};
use crate::util::Buffer;
use std::fmt;

/// Location and duration of one packet inside a batch buffer.
///
/// Only variable-bit-rate streams carry descriptors. `variable_frames` is
/// zero when the stream has a fixed frames-per-packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketDescription {
    /// Byte offset of the packet from the start of the batch buffer
    pub start_offset: u64,
    /// Size of the packet in bytes
    pub data_byte_size: u32,
    /// Frames in the packet, when the format does not fix it
    pub variable_frames: u32,
}

impl PacketDescription {
    pub fn new(start_offset: u64, data_byte_size: u32, variable_frames: u32) -> Self {
        PacketDescription {
            start_offset,
            data_byte_size,
            variable_frames,
        }
    }

    /// Byte offset just past the end of the packet
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.data_byte_size as u64
    }
}

/// A contiguous run of packets and, for VBR streams, their descriptors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketBatch {
    data: Buffer,
    descriptions: Vec<PacketDescription>,
    packet_count: usize,
}

impl PacketBatch {
    /// A batch with no packets, used to signal end of stream
    pub fn empty() -> Self {
        PacketBatch::default()
    }

    /// Constant-bit-rate packets laid out with a uniform stride
    pub fn constant(data: Buffer, packet_count: usize) -> Self {
        PacketBatch {
            data,
            descriptions: Vec::new(),
            packet_count,
        }
    }

    /// Variable-bit-rate packets, one descriptor each
    pub fn variable(data: Buffer, descriptions: Vec<PacketDescription>) -> Self {
        let packet_count = descriptions.len();
        PacketBatch {
            data,
            descriptions,
            packet_count,
        }
    }

    pub fn packet_count(&self) -> usize {
        self.packet_count
    }

    pub fn is_empty(&self) -> bool {
        self.packet_count == 0
    }

    pub fn data(&self) -> &Buffer {
        &self.data
    }

    /// Descriptors for VBR batches; empty for CBR batches
    pub fn descriptions(&self) -> &[PacketDescription] {
        &self.descriptions
    }

    pub fn has_descriptions(&self) -> bool {
        !self.descriptions.is_empty()
    }

    /// Frames carried by the batch.
    ///
    /// With a fixed `frames_per_packet` every packet counts the same; with zero
    /// the descriptors' `variable_frames` are summed.
    pub fn frame_count(&self, frames_per_packet: u32) -> u64 {
        if frames_per_packet > 0 {
            self.packet_count as u64 * frames_per_packet as u64
        } else {
            self.descriptions
                .iter()
                .map(|d| d.variable_frames as u64)
                .sum()
        }
    }

    /// Bytes of the packet at `index`
    pub fn packet(&self, index: usize, bytes_per_packet: u32) -> Option<&[u8]> {
        if index >= self.packet_count {
            return None;
        }
        let (start, end) = match self.descriptions.get(index) {
            Some(desc) => (desc.start_offset as usize, desc.end_offset() as usize),
            None => {
                let stride = bytes_per_packet as usize;
                (index * stride, (index + 1) * stride)
            }
        };
        self.data.get(start..end)
    }

    /// Check the batch layout against the stream's bytes-per-packet.
    ///
    /// CBR batches must hold exactly `packet_count` strides. VBR batches need
    /// one descriptor per packet, each inside the buffer, contiguous and in
    /// ascending order.
    pub fn validate(&self, bytes_per_packet: u32) -> Result<()> {
        if bytes_per_packet > 0 {
            if self.has_descriptions() && self.descriptions.len() != self.packet_count {
                return Err(Error::invalid_input(format!(
                    "{} descriptors for {} packets",
                    self.descriptions.len(),
                    self.packet_count
                )));
            }
            let expected = self.packet_count * bytes_per_packet as usize;
            if self.data.len() != expected {
                return Err(Error::invalid_input(format!(
                    "CBR batch holds {} bytes, expected {}",
                    self.data.len(),
                    expected
                )));
            }
            return Ok(());
        }

        if self.descriptions.len() != self.packet_count {
            return Err(Error::invalid_input(format!(
                "VBR batch has {} descriptors for {} packets",
                self.descriptions.len(),
                self.packet_count
            )));
        }

        let mut expected_offset = 0u64;
        for (i, desc) in self.descriptions.iter().enumerate() {
            if desc.start_offset != expected_offset {
                return Err(Error::invalid_input(format!(
                    "Packet {} starts at {}, expected {}",
                    i, desc.start_offset, expected_offset
                )));
            }
            if desc.end_offset() > self.data.len() as u64 {
                return Err(Error::invalid_input(format!(
                    "Packet {} ends at {}, past the {}-byte buffer",
                    i,
                    desc.end_offset(),
                    self.data.len()
                )));
            }
            expected_offset = desc.end_offset();
        }

        Ok(())
    }
}

impl fmt::Display for PacketBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PacketBatch(packets={}, bytes={}, descriptors={})",
            self.packet_count,
            self.data.len(),
            self.descriptions.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_batch() {
        let batch = PacketBatch::constant(Buffer::from_vec(vec![0u8; 40]), 10);
        assert_eq!(batch.packet_count(), 10);
        assert!(!batch.has_descriptions());
        assert!(batch.validate(4).is_ok());
        assert!(batch.validate(3).is_err());
        assert_eq!(batch.frame_count(1), 10);
        assert_eq!(batch.packet(2, 4).map(|p| p.len()), Some(4));
        assert_eq!(batch.packet(10, 4), None);
    }

    #[test]
    fn test_variable_batch() {
        let descs = vec![
            PacketDescription::new(0, 3, 10),
            PacketDescription::new(3, 5, 12),
        ];
        let batch = PacketBatch::variable(Buffer::from_vec(vec![1, 1, 1, 2, 2, 2, 2, 2]), descs);
        assert!(batch.validate(0).is_ok());
        assert_eq!(batch.frame_count(0), 22);
        assert_eq!(batch.frame_count(4), 8);
        assert_eq!(batch.packet(1, 0), Some(&[2u8, 2, 2, 2, 2][..]));
    }

    #[test]
    fn test_variable_batch_rejects_gaps_and_overruns() {
        let gap = PacketBatch::variable(
            Buffer::from_vec(vec![0; 10]),
            vec![
                PacketDescription::new(0, 3, 0),
                PacketDescription::new(4, 3, 0),
            ],
        );
        assert!(gap.validate(0).is_err());

        let overrun = PacketBatch::variable(
            Buffer::from_vec(vec![0; 4]),
            vec![PacketDescription::new(0, 5, 0)],
        );
        assert!(overrun.validate(0).is_err());
    }

    #[test]
    fn test_empty_batch() {
        let batch = PacketBatch::empty();
        assert!(batch.is_empty());
        assert!(batch.validate(0).is_ok());
        assert!(batch.validate(4).is_ok());
        assert_eq!(batch.frame_count(0), 0);
    }
}
