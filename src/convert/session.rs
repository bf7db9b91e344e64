//! Conversion driver

use super::engine::ConversionEngine;
use super::sink::SinkWriter;
use super::source::SourceReader;
use super::ConvertOptions;
use crate::codec::OutputFormatRequest;
use crate::error::{OperationContext, Result};
use crate::format::{create_demuxer, FileType, PacketTableInfo, PrimeInfo, Property};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Summary of a finished conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub destination: PathBuf,
    pub source_format: String,
    pub destination_format: String,
    pub input_packets: u64,
    pub output_packets: u64,
    pub output_frames: u64,
    pub fills: u64,
    pub prime_info: PrimeInfo,
    pub packet_table: Option<PacketTableInfo>,
    pub elapsed_ms: u128,
}

/// One file conversion: reader, engine and writer plus the output cursor
pub struct ConversionSession {
    source: SourceReader,
    engine: ConversionEngine,
    sink: SinkWriter,
    /// Next output packet index
    output_cursor: u64,
    total_output_frames: u64,
    fills: u64,
}

impl ConversionSession {
    /// Assemble a session from its parts and store the initial metadata
    pub fn new(source: SourceReader, engine: ConversionEngine, sink: SinkWriter) -> Result<Self> {
        let mut session = ConversionSession {
            source,
            engine,
            sink,
            output_cursor: 0,
            total_output_frames: 0,
            fills: 0,
        };
        session.write_side_metadata()?;
        Ok(session)
    }

    /// Open `input`, negotiate the output format and create `dir/name`
    pub fn open(
        input: &Path,
        dir: &Path,
        name: &str,
        file_type: FileType,
        request: &OutputFormatRequest,
        options: &ConvertOptions,
    ) -> Result<Self> {
        let demuxer = create_demuxer(input).during("AudioFileOpen")?;
        let source = SourceReader::new(demuxer, options.source_buffer_size)?;
        let mut engine = ConversionEngine::new(&source, request, options.output_buffer_size)?;
        if let Some(layout) = &options.output_channel_layout {
            engine.set_output_channel_layout(layout.clone())?;
        }

        // Requested and negotiated formats may differ
        let output_format = *engine.output_format();
        let sink = SinkWriter::create(dir, name, file_type, &output_format)?;

        info!("Source: {}", source.format());
        info!("Destination: {}", output_format);
        Self::new(source, engine, sink)
    }

    pub fn source(&self) -> &SourceReader {
        &self.source
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }

    pub fn sink(&self) -> &SinkWriter {
        &self.sink
    }

    pub fn total_output_frames(&self) -> u64 {
        self.total_output_frames
    }

    /// Copy the converter's cookie and channel layout to the output.
    ///
    /// A missing cookie is skipped. Container failures are logged by the
    /// sink and do not stop the conversion.
    pub fn write_side_metadata(&mut self) -> Result<()> {
        match self.engine.magic_cookie().during("AudioConverterGetProperty")? {
            Some(cookie) => {
                self.sink.set_side_metadata(&Property::MagicCookie(cookie));
            }
            None => debug!("Converter has no magic cookie"),
        }

        if let Some(layout) = self.engine.channel_layout_if_applicable() {
            self.sink.set_side_metadata(&Property::ChannelLayout(layout));
        }
        Ok(())
    }

    /// Convert one output buffer's worth of packets and write them.
    ///
    /// Returns the number of packets written; zero ends the transfer.
    pub fn step(&mut self) -> Result<usize> {
        let target = self.engine.target_packet_count();
        let batch = self.engine.fill(target, &mut self.source)?;
        if batch.is_empty() {
            return Ok(0);
        }

        self.sink.write_packets(&batch, self.output_cursor)?;
        let frames = self.engine.frame_count(&batch);
        self.output_cursor += batch.packet_count() as u64;
        self.total_output_frames += frames;
        self.fills += 1;
        debug!(
            "Wrote {} packets ({} frames), {} packets total",
            batch.packet_count(),
            frames,
            self.output_cursor
        );
        Ok(batch.packet_count())
    }

    /// Run the transfer loop to the end, store final metadata and close the
    /// output file
    pub fn run(mut self) -> Result<ConversionReport> {
        let started = Instant::now();
        while self.step()? > 0 {}

        // Some codecs finish their cookie only after the last packet
        self.write_side_metadata()?;

        let prime_info = self.engine.prime_info();
        let packet_table = self
            .sink
            .write_packet_table(prime_info, self.total_output_frames);
        self.sink.finish()?;

        let report = ConversionReport {
            destination: self.sink.path().to_path_buf(),
            source_format: self.source.format().to_string(),
            destination_format: self.engine.output_format().to_string(),
            input_packets: self.source.packet_cursor(),
            output_packets: self.output_cursor,
            output_frames: self.total_output_frames,
            fills: self.fills,
            prime_info,
            packet_table,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            "Converted {} packets into {} packets ({} frames) in {} ms",
            report.input_packets, report.output_packets, report.output_frames, report.elapsed_ms
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{create_muxer, FormatId, PacketBatch, StreamFormat};
    use crate::util::{Buffer, SampleFormat};

    fn write_input(dir: &Path, frames: usize, channels: u32) -> PathBuf {
        let format = StreamFormat::linear_pcm(44100.0, channels, SampleFormat::I16, false);
        let mut muxer = create_muxer(dir, "in.wav", FileType::Wav, &format).unwrap();
        let data: Vec<u8> = (0..frames * channels as usize)
            .flat_map(|i| ((i % 500) as i16 * 40).to_le_bytes())
            .collect();
        muxer
            .write_packets(0, &PacketBatch::constant(Buffer::from_vec(data), frames))
            .unwrap();
        muxer.finalize().unwrap();
        dir.join("in.wav")
    }

    #[test]
    fn test_identity_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), 100, 1);
        let session = ConversionSession::open(
            &input,
            dir.path(),
            "out.caf",
            FileType::Caf,
            &OutputFormatRequest::new(FormatId::LinearPcm),
            &ConvertOptions::default(),
        )
        .unwrap();

        let report = session.run().unwrap();
        assert_eq!(report.output_packets, 100);
        assert_eq!(report.output_frames, 100);
        assert_eq!(report.prime_info, PrimeInfo::default());
        // Uncompressed output stores no packet table
        assert!(report.packet_table.is_none());
    }

    #[test]
    fn test_step_stops_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), 300, 2);
        let options = ConvertOptions {
            source_buffer_size: 64,
            output_buffer_size: 136,
            ..Default::default()
        };
        let mut session = ConversionSession::open(
            &input,
            dir.path(),
            "out.caf",
            FileType::Caf,
            &OutputFormatRequest::new(FormatId::AppleIma4),
            &options,
        )
        .unwrap();

        let mut steps = Vec::new();
        loop {
            let written = session.step().unwrap();
            if written == 0 {
                break;
            }
            steps.push(written);
        }
        assert_eq!(steps, vec![2, 2, 1]);
        assert_eq!(session.total_output_frames(), 320);
        assert_eq!(session.step().unwrap(), 0);
    }
}
