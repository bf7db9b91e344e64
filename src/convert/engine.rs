//! Conversion engine: the converter plus its output buffer

use super::source::SourceReader;
use crate::codec::{AudioConverter, OutputFormatRequest, PacketSource};
use crate::error::{OperationContext, Result};
use crate::format::{ChannelLayout, PacketBatch, PrimeInfo, StreamFormat};
use crate::util::PacketBuffer;
use bytes::Bytes;
use tracing::{debug, warn};

/// Owns the converter and fills output batches on demand
pub struct ConversionEngine {
    converter: AudioConverter,
    buffer: PacketBuffer,
    output_packet_size: usize,
    target_packet_count: usize,
    /// Layout read from the input file, kept for inputs with more than two
    /// channels
    source_layout: Option<ChannelLayout>,
    /// Layout requested for the output
    output_layout: Option<ChannelLayout>,
}

impl ConversionEngine {
    /// Build the converter for the reader's format and size the output buffer.
    ///
    /// The codec configuration and channel layout stored with the input are
    /// handed to the converter.
    pub fn new(
        source: &SourceReader,
        request: &OutputFormatRequest,
        buffer_size: usize,
    ) -> Result<Self> {
        let input = *source.format();
        let mut converter = AudioConverter::new(&input, request).during("AudioConverterNew")?;

        if let Some(cookie) = source.magic_cookie() {
            converter
                .set_decompression_magic_cookie(&cookie)
                .during("AudioConverterSetProperty")?;
        }

        let mut source_layout = None;
        if input.channels_per_frame > 2 {
            if let Some(layout) = source.channel_layout() {
                if let Err(e) = converter.set_input_channel_layout(layout.clone()) {
                    warn!("Ignoring input channel layout: {}", e);
                }
                source_layout = Some(layout);
            }
        }

        Self::with_converter(converter, source_layout, buffer_size)
    }

    /// Wrap an already configured converter
    pub fn with_converter(
        converter: AudioConverter,
        source_layout: Option<ChannelLayout>,
        buffer_size: usize,
    ) -> Result<Self> {
        let output = *converter.output_format();
        let packet_size = if output.is_vbr() {
            converter.maximum_output_packet_size()
        } else {
            output.bytes_per_packet
        };
        let output_packet_size = (packet_size as usize).max(1);

        let capacity = buffer_size.max(output_packet_size);
        let target_packet_count = capacity / output_packet_size;
        debug!(
            "Output: {}, packet size {} bytes, {} packets per fill",
            output, output_packet_size, target_packet_count
        );

        Ok(ConversionEngine {
            converter,
            buffer: PacketBuffer::with_capacity(capacity),
            output_packet_size,
            target_packet_count,
            source_layout,
            output_layout: None,
        })
    }

    pub fn input_format(&self) -> &StreamFormat {
        self.converter.input_format()
    }

    /// The concrete output format the converter settled on
    pub fn output_format(&self) -> &StreamFormat {
        self.converter.output_format()
    }

    /// Fixed packet size for CBR output, the maximum for VBR output
    pub fn output_packet_size(&self) -> usize {
        self.output_packet_size
    }

    /// Packets one fill of the output buffer can hold
    pub fn target_packet_count(&self) -> usize {
        self.target_packet_count
    }

    /// Convert up to `target_packet_count` packets, pulling from `source`.
    ///
    /// An empty batch ends the conversion; later calls keep returning empty
    /// batches.
    pub fn fill(
        &mut self,
        target_packet_count: usize,
        source: &mut dyn PacketSource,
    ) -> Result<PacketBatch> {
        if self.converter.is_finished() {
            return Ok(PacketBatch::empty());
        }

        self.buffer.clear();
        let mut descriptions = Vec::new();
        let count = self
            .converter
            .fill(
                source,
                target_packet_count.min(self.target_packet_count),
                &mut self.buffer,
                &mut descriptions,
            )
            .during("AudioConverterFillComplexBuffer")?;

        if count == 0 {
            debug!("Converter drained");
            return Ok(PacketBatch::empty());
        }

        let data = self.buffer.take();
        if self.output_format().is_vbr() {
            Ok(PacketBatch::variable(data, descriptions))
        } else {
            Ok(PacketBatch::constant(data, count))
        }
    }

    /// Frames carried by an output batch
    pub fn frame_count(&self, batch: &PacketBatch) -> u64 {
        batch.frame_count(self.output_format().frames_per_packet)
    }

    /// Codec configuration for the output file. `Ok(None)` when the output
    /// codec has none.
    pub fn magic_cookie(&self) -> Result<Option<Bytes>> {
        self.converter.magic_cookie()
    }

    /// Tag the output with `layout`, which must match the output channel count
    pub fn set_output_channel_layout(&mut self, layout: ChannelLayout) -> Result<()> {
        self.converter
            .set_output_channel_layout(layout.clone())
            .during("AudioConverterSetProperty")?;
        self.output_layout = Some(layout);
        Ok(())
    }

    /// Output channel layout: the requested one, otherwise the input's for
    /// inputs with more than two channels
    pub fn channel_layout_if_applicable(&self) -> Option<ChannelLayout> {
        if let Some(layout) = &self.output_layout {
            return Some(layout.clone());
        }
        if self.input_format().channels_per_frame <= 2 {
            return None;
        }
        self.converter.output_channel_layout().or_else(|| {
            let same_count =
                self.input_format().channels_per_frame == self.output_format().channels_per_frame;
            if same_count {
                self.source_layout.clone()
            } else {
                None
            }
        })
    }

    pub fn prime_info(&self) -> PrimeInfo {
        self.converter.prime_info()
    }
}
