//! WAV file muxer implementation

use super::header::WavFormat;
use super::{DATA_CHUNK, FMT_CHUNK, RIFF_MAGIC, WAVE_MAGIC};
use crate::error::{Error, Result};
use crate::format::{FileType, Muxer, MuxerContext, PacketBatch, Property, StreamFormat};
use crate::util::SampleFormat;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

/// WAV file muxer
pub struct WavMuxer {
    writer: BufWriter<File>,
    context: MuxerContext,
    format: WavFormat,
    data_size_position: u64,
    riff_size_position: u64,
    data_size: u64,
}

impl WavMuxer {
    /// Whether WAV can hold packets of `format`
    pub fn supports(format: &StreamFormat) -> bool {
        if !format.is_linear_pcm() || format.validate().is_err() {
            return false;
        }
        match format.sample_format() {
            SampleFormat::U8 => true,
            SampleFormat::I16 | SampleFormat::I24 | SampleFormat::I32 => !format.is_big_endian(),
            SampleFormat::F32 | SampleFormat::F64 => !format.is_big_endian(),
            _ => false,
        }
    }

    /// Create the file and write the RIFF and fmt headers
    pub fn create(path: &Path, format: &StreamFormat) -> Result<Self> {
        if !Self::supports(format) {
            return Err(Error::unsupported(format!(
                "WAV cannot store {}",
                format
            )));
        }
        let wav_format = WavFormat::from_stream_format(format)?;

        let file = File::create(path)
            .map_err(|e| Error::format(format!("Failed to create WAV file: {}", e)))?;
        let mut writer = BufWriter::new(file);

        writer
            .write_all(RIFF_MAGIC)
            .map_err(|e| Error::format(format!("Failed to write RIFF magic: {}", e)))?;

        // Placeholder sizes are patched in finalize
        let riff_size_position = writer.stream_position()?;
        writer
            .write_all(&0u32.to_le_bytes())
            .map_err(|e| Error::format(format!("Failed to write RIFF size: {}", e)))?;
        writer
            .write_all(WAVE_MAGIC)
            .map_err(|e| Error::format(format!("Failed to write WAVE magic: {}", e)))?;

        let fmt_data = wav_format.to_bytes();
        writer
            .write_all(FMT_CHUNK)
            .map_err(|e| Error::format(format!("Failed to write fmt chunk ID: {}", e)))?;
        writer
            .write_all(&(fmt_data.len() as u32).to_le_bytes())
            .map_err(|e| Error::format(format!("Failed to write fmt chunk size: {}", e)))?;
        writer
            .write_all(&fmt_data)
            .map_err(|e| Error::format(format!("Failed to write fmt chunk data: {}", e)))?;

        writer
            .write_all(DATA_CHUNK)
            .map_err(|e| Error::format(format!("Failed to write data chunk ID: {}", e)))?;
        let data_size_position = writer.stream_position()?;
        writer
            .write_all(&0u32.to_le_bytes())
            .map_err(|e| Error::format(format!("Failed to write data size: {}", e)))?;

        debug!("Created WAV {}: {}", path.display(), format);

        Ok(WavMuxer {
            writer,
            context: MuxerContext::new(FileType::Wav, *format),
            format: wav_format,
            data_size_position,
            riff_size_position,
            data_size: 0,
        })
    }

    fn write_trailer(&mut self) -> Result<()> {
        let data_size = u32::try_from(self.data_size)
            .map_err(|_| Error::format("WAV data chunk exceeds 4 GiB"))?;

        self.writer
            .seek(SeekFrom::Start(self.data_size_position))
            .map_err(|e| Error::format(format!("Failed to seek to data size: {}", e)))?;
        self.writer
            .write_all(&data_size.to_le_bytes())
            .map_err(|e| Error::format(format!("Failed to write data size: {}", e)))?;

        // RIFF size = 4 (WAVE) + 8 (fmt header) + fmt_data_size + 8 (data header) + data_size
        let fmt_data_size = self.format.to_bytes().len() as u32;
        let riff_size = (4 + 8 + fmt_data_size + 8).saturating_add(data_size);
        self.writer
            .seek(SeekFrom::Start(self.riff_size_position))
            .map_err(|e| Error::format(format!("Failed to seek to RIFF size: {}", e)))?;
        self.writer
            .write_all(&riff_size.to_le_bytes())
            .map_err(|e| Error::format(format!("Failed to write RIFF size: {}", e)))?;

        self.writer.seek(SeekFrom::End(0))?;
        self.writer
            .flush()
            .map_err(|e| Error::format(format!("Failed to flush writer: {}", e)))?;

        Ok(())
    }
}

impl Muxer for WavMuxer {
    fn file_type(&self) -> FileType {
        FileType::Wav
    }

    fn data_format(&self) -> StreamFormat {
        self.context.format()
    }

    fn write_packets(&mut self, start_packet: u64, batch: &PacketBatch) -> Result<()> {
        self.context.check_write(start_packet, batch)?;

        self.writer
            .write_all(batch.data().as_slice())
            .map_err(|e| Error::format(format!("Failed to write packet data: {}", e)))?;

        self.data_size += batch.data().len() as u64;
        self.context.record_write(batch);
        Ok(())
    }

    fn set_property(&mut self, property: &Property) -> Result<()> {
        Err(Error::PropertyUnsupported(property.name()))
    }

    fn packets_written(&self) -> u64 {
        self.context.packets_written()
    }

    fn finalize(&mut self) -> Result<()> {
        if self.context.is_finalized() {
            return Ok(());
        }
        self.context.set_finalized();
        self.write_trailer()
    }
}

impl Drop for WavMuxer {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            warn!("Failed to finalize WAV file on drop: {}", e);
        }
    }
}
