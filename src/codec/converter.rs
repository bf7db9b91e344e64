//! Pull-driven audio converter
//!
//! [`AudioConverter`] decodes input packets, maps channels, resamples and
//! re-encodes into the output format. Input is never pushed: each call to
//! [`AudioConverter::fill`] asks a [`PacketSource`] for packets only while its
//! reservoir of converted samples cannot cover the requested output.

use super::flac::DEFAULT_BLOCK_SIZE;
use super::{create_decoder, create_encoder, PacketDecoder, PacketEncoder};
use crate::error::{Error, Result};
use crate::format::{
    ChannelLayout, FormatId, PacketBatch, PacketDescription, PrimeInfo, StreamFormat,
};
use crate::swresample::Resampler;
use crate::util::{PacketBuffer, SampleFormat};
use bytes::Bytes;
use tracing::{debug, trace};

/// Supplier of input packets for [`AudioConverter::fill`]
pub trait PacketSource {
    /// Return at most `max_packets` packets, with descriptors for VBR input.
    ///
    /// Fewer packets than requested is valid. An empty batch means the input
    /// has ended.
    fn request_packets(&mut self, max_packets: usize) -> Result<PacketBatch>;
}

/// Desired output format. Unset fields follow the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputFormatRequest {
    pub format_id: FormatId,
    pub sample_rate: Option<f64>,
    pub channels: Option<u32>,
    pub bits_per_channel: Option<u32>,
    /// Linear PCM only: store IEEE floats
    pub float: bool,
    /// Linear PCM only: store big endian samples
    pub big_endian: bool,
}

impl OutputFormatRequest {
    pub fn new(format_id: FormatId) -> Self {
        OutputFormatRequest {
            format_id,
            sample_rate: None,
            channels: None,
            bits_per_channel: None,
            float: false,
            big_endian: false,
        }
    }

    /// Turn the request into a complete stream format for `input`
    pub fn resolve(&self, input: &StreamFormat) -> Result<StreamFormat> {
        let sample_rate = self.sample_rate.unwrap_or(input.sample_rate);
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(Error::invalid_input(format!(
                "Invalid output sample rate: {}",
                sample_rate
            )));
        }

        let channels = self.channels.unwrap_or(input.channels_per_frame);
        if channels == 0 {
            return Err(Error::invalid_input("Output channel count must be positive"));
        }
        if channels != input.channels_per_frame
            && !matches!((input.channels_per_frame, channels), (1, 2) | (2, 1))
        {
            return Err(Error::unsupported(format!(
                "Cannot convert {} channels to {}",
                input.channels_per_frame, channels
            )));
        }

        let format = match self.format_id {
            FormatId::LinearPcm => StreamFormat::linear_pcm(
                sample_rate,
                channels,
                self.pcm_sample_format(input)?,
                self.big_endian,
            ),
            FormatId::AppleIma4 => StreamFormat::ima4(sample_rate, channels),
            FormatId::Flac => {
                let bits = match self.bits_per_channel {
                    Some(bits @ (16 | 24)) => bits,
                    Some(bits) => {
                        return Err(Error::unsupported(format!(
                            "FLAC output supports 16 or 24 bits, not {}",
                            bits
                        )))
                    }
                    None => match source_bits(input) {
                        0..=16 => 16,
                        _ => 24,
                    },
                };
                StreamFormat::flac(sample_rate, channels, bits, DEFAULT_BLOCK_SIZE)
            }
            FormatId::Other(code) => {
                return Err(Error::unsupported(format!(
                    "No encoder for format '{}'",
                    code
                )))
            }
        };

        format.validate()?;
        Ok(format)
    }

    fn pcm_sample_format(&self, input: &StreamFormat) -> Result<SampleFormat> {
        if self.bits_per_channel.is_none() && !self.float && input.is_linear_pcm() {
            return Ok(input.sample_format());
        }

        let bits = self
            .bits_per_channel
            .unwrap_or(if self.float { 32 } else { 16 });
        let sample_format = match (self.float, bits) {
            (false, 8) => SampleFormat::U8,
            (false, 16) => SampleFormat::I16,
            (false, 24) => SampleFormat::I24,
            (false, 32) => SampleFormat::I32,
            (true, 32) => SampleFormat::F32,
            (true, 64) => SampleFormat::F64,
            _ => {
                return Err(Error::unsupported(format!(
                    "Linear PCM with {} {} bits",
                    bits,
                    if self.float { "float" } else { "integer" }
                )))
            }
        };
        Ok(sample_format)
    }
}

/// Bit depth of the audio carried by `format`, 0 when unknown
fn source_bits(format: &StreamFormat) -> u32 {
    if format.is_linear_pcm() {
        format.bits_per_channel
    } else {
        format.flac_source_bits().unwrap_or(16)
    }
}

/// Converts packets of one stream format into packets of another
pub struct AudioConverter {
    input: StreamFormat,
    output: StreamFormat,
    decoder: Box<dyn PacketDecoder>,
    encoder: Box<dyn PacketEncoder>,
    resampler: Option<Resampler>,
    input_layout: Option<ChannelLayout>,
    output_layout: Option<ChannelLayout>,
    /// Converted samples waiting to be encoded (interleaved, output channels)
    reservoir: Vec<i32>,
    decoded: Vec<i32>,
    mapped: Vec<i32>,
    packet: Vec<u8>,
    input_exhausted: bool,
    finished: bool,
    trailing_frames: u32,
    input_packets: u64,
    output_packets: u64,
}

impl AudioConverter {
    /// Create a converter from `input` to the format `request` resolves to
    pub fn new(input: &StreamFormat, request: &OutputFormatRequest) -> Result<Self> {
        input.validate()?;
        let output = request.resolve(input)?;
        let decoder = create_decoder(input)?;
        let encoder = create_encoder(&output)?;

        let resampler = if input.sample_rate != output.sample_rate {
            Some(Resampler::new(
                input.sample_rate,
                output.sample_rate,
                output.channels_per_frame as usize,
            )?)
        } else {
            None
        };

        debug!("Converter: {} -> {}", input, output);

        Ok(AudioConverter {
            input: *input,
            output,
            decoder,
            encoder,
            resampler,
            input_layout: None,
            output_layout: None,
            reservoir: Vec::new(),
            decoded: Vec::new(),
            mapped: Vec::new(),
            packet: Vec::new(),
            input_exhausted: false,
            finished: false,
            trailing_frames: 0,
            input_packets: 0,
            output_packets: 0,
        })
    }

    pub fn input_format(&self) -> &StreamFormat {
        &self.input
    }

    pub fn output_format(&self) -> &StreamFormat {
        &self.output
    }

    /// Largest packet `fill` can produce
    pub fn maximum_output_packet_size(&self) -> u32 {
        self.encoder.max_packet_size()
    }

    /// Current codec configuration of the output, if the codec has one.
    ///
    /// FLAC's cookie only reaches its final state once all packets have been
    /// produced.
    pub fn magic_cookie(&self) -> Result<Option<Bytes>> {
        Ok(self.encoder.magic_cookie())
    }

    /// Hand the input file's codec configuration to the decoder
    pub fn set_decompression_magic_cookie(&mut self, cookie: &[u8]) -> Result<()> {
        self.decoder.set_magic_cookie(cookie)
    }

    pub fn prime_info(&self) -> PrimeInfo {
        PrimeInfo {
            leading_frames: self.encoder.priming_frames(),
            trailing_frames: self.trailing_frames,
        }
    }

    pub fn set_input_channel_layout(&mut self, layout: ChannelLayout) -> Result<()> {
        check_layout(&layout, self.input.channels_per_frame)?;
        self.input_layout = Some(layout);
        Ok(())
    }

    pub fn set_output_channel_layout(&mut self, layout: ChannelLayout) -> Result<()> {
        check_layout(&layout, self.output.channels_per_frame)?;
        self.output_layout = Some(layout);
        Ok(())
    }

    /// The explicit output layout, or the input layout when the channel count
    /// is unchanged
    pub fn output_channel_layout(&self) -> Option<ChannelLayout> {
        if let Some(layout) = &self.output_layout {
            return Some(layout.clone());
        }
        if self.input.channels_per_frame == self.output.channels_per_frame {
            return self.input_layout.clone();
        }
        None
    }

    /// Whether `fill` has reported the end of the output
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Produce up to `max_packets` output packets into `buf`, pulling input
    /// from `source` as needed.
    ///
    /// Descriptors are appended to `descs` for VBR output, with offsets
    /// relative to the start of `buf`. Returns the number of packets
    /// produced; zero means the conversion is complete, and every later call
    /// returns zero without touching `source`.
    pub fn fill(
        &mut self,
        source: &mut dyn PacketSource,
        max_packets: usize,
        buf: &mut PacketBuffer,
        descs: &mut Vec<PacketDescription>,
    ) -> Result<usize> {
        if self.finished || max_packets == 0 {
            return Ok(0);
        }

        let max_size = self.encoder.max_packet_size() as usize;
        let fits = buf.remaining() / max_size.max(1);
        if fits == 0 {
            return Err(Error::BufferTooSmall {
                need: buf.len() + max_size,
                have: buf.capacity(),
            });
        }

        let target = max_packets.min(fits);
        let channels = self.output.channels_per_frame as usize;
        let frames_per_packet = self.encoder.frames_per_packet() as usize;
        let packet_samples = frames_per_packet * channels;
        let mut produced = 0;

        while produced < target {
            let ready = (self.reservoir.len() / packet_samples).min(target - produced);
            if ready > 0 {
                for samples in self.reservoir[..ready * packet_samples].chunks_exact(packet_samples) {
                    emit_packet(
                        self.encoder.as_mut(),
                        &self.output,
                        &mut self.packet,
                        samples,
                        buf,
                        descs,
                    )?;
                }
                self.reservoir.drain(..ready * packet_samples);
                produced += ready;
                continue;
            }

            if !self.input_exhausted {
                let frames_wanted =
                    (target - produced) * frames_per_packet - self.reservoir.len() / channels;
                self.pull(source, frames_wanted)?;
                continue;
            }

            if !self.reservoir.is_empty() {
                let frames = self.reservoir.len() / channels;
                emit_packet(
                    self.encoder.as_mut(),
                    &self.output,
                    &mut self.packet,
                    &self.reservoir,
                    buf,
                    descs,
                )?;
                self.reservoir.clear();
                self.trailing_frames = (frames_per_packet - frames) as u32;
                produced += 1;
                debug!(
                    "Final packet holds {} of {} frames",
                    frames, frames_per_packet
                );
            }
            self.finished = true;
            break;
        }

        self.output_packets += produced as u64;
        trace!(
            "fill: {} packets, {} bytes ({} in / {} out so far)",
            produced,
            buf.len(),
            self.input_packets,
            self.output_packets
        );
        Ok(produced)
    }

    /// Ask `source` for enough input to cover `frames_wanted` output frames
    fn pull(&mut self, source: &mut dyn PacketSource, frames_wanted: usize) -> Result<()> {
        let input_frames = match &self.resampler {
            Some(resampler) => resampler.input_frames_for(frames_wanted),
            None => frames_wanted,
        };
        let frames_per_packet = self.input.frames_per_packet.max(1) as usize;
        let packets = input_frames.div_ceil(frames_per_packet).max(1);

        let batch = source.request_packets(packets)?;
        if batch.is_empty() {
            debug!("Input ended after {} packets", self.input_packets);
            self.input_exhausted = true;
            if let Some(resampler) = self.resampler.as_mut() {
                let tail = resampler.flush(&mut self.reservoir);
                debug!("Resampler tail: {} frames", tail);
            }
            return Ok(());
        }

        batch.validate(self.input.bytes_per_packet)?;
        self.input_packets += batch.packet_count() as u64;

        self.decoded.clear();
        if self.input.is_vbr() {
            for index in 0..batch.packet_count() {
                let data = batch.packet(index, 0).ok_or_else(|| {
                    Error::invalid_input(format!("Packet {} lies outside its batch", index))
                })?;
                self.decoder.decode(data, &mut self.decoded)?;
            }
        } else {
            self.decoder.decode(batch.data(), &mut self.decoded)?;
        }

        let input_channels = self.input.channels_per_frame as usize;
        let output_channels = self.output.channels_per_frame as usize;
        let mapped = if input_channels == output_channels {
            &self.decoded
        } else {
            self.mapped.clear();
            map_channels(&self.decoded, input_channels, output_channels, &mut self.mapped);
            &self.mapped
        };

        match self.resampler.as_mut() {
            Some(resampler) => {
                resampler.process(mapped, &mut self.reservoir)?;
            }
            None => self.reservoir.extend_from_slice(mapped),
        }
        Ok(())
    }
}

/// Encode one packet and append it, with a descriptor for VBR output
fn emit_packet(
    encoder: &mut dyn PacketEncoder,
    output: &StreamFormat,
    scratch: &mut Vec<u8>,
    samples: &[i32],
    buf: &mut PacketBuffer,
    descs: &mut Vec<PacketDescription>,
) -> Result<()> {
    scratch.clear();
    encoder.encode(samples, scratch)?;

    let offset = buf.len() as u64;
    buf.extend_from_slice(scratch)?;
    if output.is_vbr() {
        let variable_frames = if output.frames_per_packet == 0 {
            (samples.len() / output.channels_per_frame as usize) as u32
        } else {
            0
        };
        descs.push(PacketDescription::new(
            offset,
            scratch.len() as u32,
            variable_frames,
        ));
    }
    Ok(())
}

/// Duplicate mono into stereo or average stereo into mono
fn map_channels(input: &[i32], from: usize, to: usize, out: &mut Vec<i32>) {
    match (from, to) {
        (1, 2) => {
            out.reserve(input.len() * 2);
            for sample in input {
                out.push(*sample);
                out.push(*sample);
            }
        }
        (2, 1) => {
            out.reserve(input.len() / 2);
            for frame in input.chunks_exact(2) {
                out.push(((frame[0] as i64 + frame[1] as i64) / 2) as i32);
            }
        }
        _ => out.extend_from_slice(input),
    }
}

fn check_layout(layout: &ChannelLayout, channels: u32) -> Result<()> {
    let count = layout.channel_count();
    if count != 0 && count != channels {
        return Err(Error::invalid_input(format!(
            "Channel layout describes {} channels, stream has {}",
            count, channels
        )));
    }
    Ok(())
}
