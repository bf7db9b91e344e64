//! Common test utilities for afconv integration tests
//!
//! This module provides helpers for generating test audio files, reading
//! converted files back as samples, and mock packet sources, demuxers and
//! muxers.

#![allow(dead_code)]

use afconv_lib::codec::{create_decoder, PacketDecoder, PacketSource};
use afconv_lib::error::{Error, Result};
use afconv_lib::format::{
    create_demuxer, create_muxer, ChannelLayout, Demuxer, FileType, Muxer, MuxerContext,
    PacketBatch, PacketDescription, PacketTableInfo, Property, StreamFormat,
};
use afconv_lib::util::{Buffer, PacketBuffer, SampleFormat};
use bytes::Bytes;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

// ============================================================================
// Sample Generation
// ============================================================================

/// Interleaved 16-bit sine wave, a different frequency per channel
pub fn sine_i16(frames: usize, channels: u32, sample_rate: f64) -> Vec<i16> {
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let t = i as f64 / sample_rate;
        for ch in 0..channels {
            let freq = 440.0 * (ch + 1) as f64;
            let value = (2.0 * std::f64::consts::PI * freq * t).sin() * 0.5;
            samples.push((value * i16::MAX as f64) as i16);
        }
    }
    samples
}

/// Little endian bytes of 16-bit samples
pub fn i16_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

// ============================================================================
// File Generation
// ============================================================================

/// Write a 16-bit little endian WAV file and return its path
pub fn write_wav_i16(
    dir: &Path,
    name: &str,
    samples: &[i16],
    channels: u32,
    sample_rate: f64,
) -> PathBuf {
    let format = StreamFormat::linear_pcm(sample_rate, channels, SampleFormat::I16, false);
    let frames = samples.len() / channels as usize;
    let mut muxer = create_muxer(dir, name, FileType::Wav, &format).unwrap();
    if frames > 0 {
        muxer
            .write_packets(
                0,
                &PacketBatch::constant(Buffer::from_vec(i16_bytes(samples)), frames),
            )
            .unwrap();
    }
    muxer.finalize().unwrap();
    dir.join(name)
}

/// Write a 16-bit big endian CAF file, optionally with a channel layout
pub fn write_caf_i16(
    dir: &Path,
    name: &str,
    samples: &[i16],
    channels: u32,
    sample_rate: f64,
    layout: Option<ChannelLayout>,
) -> PathBuf {
    let format = StreamFormat::linear_pcm(sample_rate, channels, SampleFormat::I16, true);
    let frames = samples.len() / channels as usize;
    let data: Vec<u8> = samples.iter().flat_map(|s| s.to_be_bytes()).collect();
    let mut muxer = create_muxer(dir, name, FileType::Caf, &format).unwrap();
    if let Some(layout) = layout {
        muxer.set_property(&Property::ChannelLayout(layout)).unwrap();
    }
    muxer
        .write_packets(0, &PacketBatch::constant(Buffer::from_vec(data), frames))
        .unwrap();
    muxer.finalize().unwrap();
    dir.join(name)
}

// ============================================================================
// Reading Back
// ============================================================================

/// Decoded contents of an audio file
pub struct DecodedFile {
    pub format: StreamFormat,
    /// Interleaved full-scale samples, including any padding
    pub samples: Vec<i32>,
    pub packet_count: u64,
    pub magic_cookie: Option<Bytes>,
    pub channel_layout: Option<ChannelLayout>,
    pub packet_table: Option<PacketTableInfo>,
}

impl DecodedFile {
    /// Samples scaled back down to 16 bits
    pub fn samples_i16(&self) -> Vec<i16> {
        self.samples.iter().map(|&s| (s >> 16) as i16).collect()
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels_per_frame as usize
    }
}

/// Decode every packet of `path`
pub fn decode_file(path: &Path) -> DecodedFile {
    let mut demuxer = create_demuxer(path).unwrap();
    let format = demuxer.data_format();
    let mut decoder = create_decoder(&format).unwrap();
    let magic_cookie = demuxer.magic_cookie();
    if let Some(cookie) = &magic_cookie {
        decoder.set_magic_cookie(cookie).unwrap();
    }

    let capacity = (demuxer.packet_size_upper_bound() as usize).max(4096) * 4;
    let mut buf = PacketBuffer::with_capacity(capacity);
    let mut descs = Vec::new();
    let mut samples = Vec::new();
    let mut cursor = 0u64;
    loop {
        buf.clear();
        descs.clear();
        let count = match demuxer.read_packets(cursor, 64, &mut buf, &mut descs) {
            Ok(count) => count,
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => panic!("read failed: {}", e),
        };
        if descs.is_empty() {
            decoder.decode(buf.as_slice(), &mut samples).unwrap();
        } else {
            for desc in &descs {
                let start = desc.start_offset as usize;
                let end = start + desc.data_byte_size as usize;
                decoder.decode(&buf.as_slice()[start..end], &mut samples).unwrap();
            }
        }
        cursor += count as u64;
    }

    DecodedFile {
        format,
        samples,
        packet_count: demuxer.packet_count(),
        magic_cookie,
        channel_layout: demuxer.channel_layout(),
        packet_table: demuxer.packet_table_info(),
    }
}

// ============================================================================
// Mocks
// ============================================================================

/// Packet source over a list of pre-cut batches.
///
/// Each request returns the next batch truncated to the requested count;
/// once the list is exhausted every request returns an empty batch.
pub struct ScriptedSource {
    bytes_per_packet: usize,
    remaining: Vec<usize>,
    pub requests: Vec<usize>,
}

impl ScriptedSource {
    /// A constant-bit-rate source returning `counts[i]` silent packets on
    /// the i-th request
    pub fn new(bytes_per_packet: usize, counts: &[usize]) -> Self {
        let mut remaining = counts.to_vec();
        remaining.reverse();
        ScriptedSource {
            bytes_per_packet,
            remaining,
            requests: Vec::new(),
        }
    }
}

impl PacketSource for ScriptedSource {
    fn request_packets(&mut self, max_packets: usize) -> Result<PacketBatch> {
        self.requests.push(max_packets);
        let count = self.remaining.pop().unwrap_or(0).min(max_packets);
        Ok(PacketBatch::constant(
            Buffer::from_vec(vec![0; count * self.bytes_per_packet]),
            count,
        ))
    }
}

/// In-memory demuxer over a list of packets
pub struct MemoryDemuxer {
    pub format: StreamFormat,
    pub packets: Vec<Vec<u8>>,
    pub upper_bound: u32,
    pub cookie: Option<Bytes>,
    pub layout: Option<ChannelLayout>,
}

impl MemoryDemuxer {
    pub fn new(format: StreamFormat, packets: Vec<Vec<u8>>) -> Self {
        let upper_bound = packets.iter().map(|p| p.len()).max().unwrap_or(0) as u32;
        MemoryDemuxer {
            format,
            packets,
            upper_bound,
            cookie: None,
            layout: None,
        }
    }
}

impl Demuxer for MemoryDemuxer {
    fn file_type(&self) -> FileType {
        FileType::Caf
    }

    fn data_format(&self) -> StreamFormat {
        self.format
    }

    fn packet_count(&self) -> u64 {
        self.packets.len() as u64
    }

    fn packet_size_upper_bound(&self) -> u32 {
        self.upper_bound
    }

    fn read_packets(
        &mut self,
        start_packet: u64,
        max_packets: usize,
        buf: &mut PacketBuffer,
        descs: &mut Vec<PacketDescription>,
    ) -> Result<usize> {
        let start = start_packet as usize;
        if start >= self.packets.len() {
            return Err(Error::EndOfStream);
        }

        let mut count = 0;
        for packet in self.packets[start..].iter().take(max_packets) {
            if packet.len() > buf.remaining() {
                break;
            }
            let offset = buf.len() as u64;
            buf.extend_from_slice(packet)?;
            if self.format.is_vbr() {
                descs.push(PacketDescription::new(offset, packet.len() as u32, 0));
            }
            count += 1;
        }
        Ok(count)
    }

    fn magic_cookie(&self) -> Option<Bytes> {
        self.cookie.clone()
    }

    fn channel_layout(&self) -> Option<ChannelLayout> {
        self.layout.clone()
    }

    fn packet_table_info(&self) -> Option<PacketTableInfo> {
        None
    }
}

/// What a [`MemoryMuxer`] has received
#[derive(Debug, Default)]
pub struct MemoryOutput {
    pub packets: Vec<Vec<u8>>,
    pub properties: Vec<Property>,
    pub finalized: bool,
}

/// In-memory muxer; the output stays readable through a shared handle
pub struct MemoryMuxer {
    context: MuxerContext,
    output: Rc<RefCell<MemoryOutput>>,
    /// Properties rejected with `PropertyUnsupported`
    pub unsupported: Vec<&'static str>,
    /// Properties rejected with a format error
    pub failing: Vec<&'static str>,
}

impl MemoryMuxer {
    pub fn new(format: StreamFormat) -> (Self, Rc<RefCell<MemoryOutput>>) {
        let output = Rc::new(RefCell::new(MemoryOutput::default()));
        let muxer = MemoryMuxer {
            context: MuxerContext::new(FileType::Caf, format),
            output: Rc::clone(&output),
            unsupported: Vec::new(),
            failing: Vec::new(),
        };
        (muxer, output)
    }
}

impl Muxer for MemoryMuxer {
    fn file_type(&self) -> FileType {
        self.context.file_type()
    }

    fn data_format(&self) -> StreamFormat {
        self.context.format()
    }

    fn write_packets(&mut self, start_packet: u64, batch: &PacketBatch) -> Result<()> {
        self.context.check_write(start_packet, batch)?;
        let bytes_per_packet = self.context.format().bytes_per_packet;
        let mut output = self.output.borrow_mut();
        for index in 0..batch.packet_count() {
            let packet = batch
                .packet(index, bytes_per_packet)
                .ok_or_else(|| Error::invalid_input("Packet outside the batch"))?;
            output.packets.push(packet.to_vec());
        }
        self.context.record_write(batch);
        Ok(())
    }

    fn set_property(&mut self, property: &Property) -> Result<()> {
        if self.unsupported.contains(&property.name()) {
            return Err(Error::PropertyUnsupported(property.name()));
        }
        if self.failing.contains(&property.name()) {
            return Err(Error::format("disk full"));
        }
        self.output.borrow_mut().properties.push(property.clone());
        Ok(())
    }

    fn packets_written(&self) -> u64 {
        self.context.packets_written()
    }

    fn finalize(&mut self) -> Result<()> {
        self.context.set_finalized();
        self.output.borrow_mut().finalized = true;
        Ok(())
    }
}
