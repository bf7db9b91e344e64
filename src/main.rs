//! afconv CLI - streaming audio file converter
//!
//! A command-line tool for converting audio files between formats

use afconv_lib::codec::{codec_infos, OutputFormatRequest};
use afconv_lib::convert::{convert_file, ConvertOptions, DEFAULT_BUFFER_SIZE};
use afconv_lib::format::{create_demuxer, format_infos, ChannelLayout, FileType, FormatId};
use afconv_lib::{init, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "afconv")]
#[command(about = "afconv - streaming audio file converter", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an audio file to another format
    Convert {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Output codec (lpcm, ima4, flac)
        #[arg(short, long, default_value = "lpcm")]
        format: String,

        /// Output sample rate in Hz (defaults to the input rate)
        #[arg(long)]
        rate: Option<f64>,

        /// Output channel count (defaults to the input count)
        #[arg(long)]
        channels: Option<u32>,

        /// Output bits per channel
        #[arg(long)]
        bits: Option<u32>,

        /// Store floating point samples (lpcm only)
        #[arg(long)]
        float: bool,

        /// Store big endian samples (lpcm only)
        #[arg(long)]
        big_endian: bool,

        /// Output container (wav, caf), detected from the extension if omitted
        #[arg(long)]
        file_type: Option<String>,

        /// Store a discrete layout with this many channels in the output
        #[arg(long, value_name = "CHANNELS")]
        discrete_layout: Option<u32>,

        /// Input buffer size in bytes
        #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
        source_buffer: usize,

        /// Output buffer size in bytes
        #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
        output_buffer: usize,

        /// Print the conversion report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show information about an audio file
    Info {
        /// Input file path
        input: PathBuf,
    },

    /// List supported containers and codecs
    Formats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config {
        verbose: cli.verbose,
        debug: cli.debug,
    };
    init(config)?;

    match cli.command {
        Commands::Convert {
            input,
            output,
            format,
            rate,
            channels,
            bits,
            float,
            big_endian,
            file_type,
            discrete_layout,
            source_buffer,
            output_buffer,
            json,
        } => {
            let format_id = FormatId::from_name(&format)
                .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", format))?;
            let request = OutputFormatRequest {
                format_id,
                sample_rate: rate,
                channels,
                bits_per_channel: bits,
                float,
                big_endian,
            };
            let file_type = file_type
                .map(|name| {
                    FileType::from_name(&name)
                        .ok_or_else(|| anyhow::anyhow!("Unknown file type: {}", name))
                })
                .transpose()?;
            let options = ConvertOptions {
                source_buffer_size: source_buffer,
                output_buffer_size: output_buffer,
                output_channel_layout: discrete_layout.map(ChannelLayout::discrete),
            };
            cmd_convert(&input, &output, file_type, &request, &options, json)?;
        }
        Commands::Info { input } => {
            cmd_info(&input)?;
        }
        Commands::Formats => {
            cmd_formats()?;
        }
    }

    Ok(())
}

fn cmd_convert(
    input: &PathBuf,
    output: &PathBuf,
    file_type: Option<FileType>,
    request: &OutputFormatRequest,
    options: &ConvertOptions,
    json: bool,
) -> anyhow::Result<()> {
    info!("Converting {} to {}", input.display(), output.display());

    let report = convert_file(input, output, file_type, request, options)
        .map_err(|e| anyhow::anyhow!("{} (status {})", e, e.status_code()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Source format: {}", report.source_format);
    println!("Destination format: {}", report.destination_format);
    println!(
        "Packets: {} in, {} out ({} frames)",
        report.input_packets, report.output_packets, report.output_frames
    );
    if let Some(table) = report.packet_table {
        println!(
            "Packet table: {} valid, {} priming, {} remainder frames",
            table.valid_frames, table.priming_frames, table.remainder_frames
        );
    }
    println!("done: {}", report.destination.display());
    Ok(())
}

fn cmd_info(input: &PathBuf) -> anyhow::Result<()> {
    let demuxer = create_demuxer(input)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", input.display(), e))?;
    let format = demuxer.data_format();

    println!("File: {}", input.display());
    println!("  Type: {}", demuxer.file_type());
    println!("  Format: {}", format);
    println!("  Packets: {}", demuxer.packet_count());
    println!(
        "  Packet Size Upper Bound: {} bytes",
        demuxer.packet_size_upper_bound()
    );

    if let Some(cookie) = demuxer.magic_cookie() {
        println!("  Magic Cookie: {} bytes", cookie.len());
    }
    if let Some(layout) = demuxer.channel_layout() {
        println!(
            "  Channel Layout: tag 0x{:08X}, {} channels",
            layout.tag(),
            layout.channel_count()
        );
    }
    if let Some(table) = demuxer.packet_table_info() {
        println!(
            "  Packet Table: {} valid, {} priming, {} remainder frames",
            table.valid_frames, table.priming_frames, table.remainder_frames
        );
    }
    Ok(())
}

fn cmd_formats() -> anyhow::Result<()> {
    println!("Containers:");
    println!("─────────────────────────────────────────────────────────");
    for info in format_infos() {
        let mut features = Vec::new();
        if info.capabilities.magic_cookie {
            features.push("cookie");
        }
        if info.capabilities.channel_layout {
            features.push("layout");
        }
        if info.capabilities.packet_table {
            features.push("packet-table");
        }
        if info.capabilities.variable_packets {
            features.push("vbr");
        }
        println!(
            "{:<6} {:<36} [{}]",
            info.file_type.name(),
            info.long_name,
            features.join(", ")
        );
    }

    println!();
    println!("Codecs:");
    println!("─────────────────────────────────────────────────────────");
    for info in codec_infos() {
        let kind = if info.capabilities.lossy {
            "lossy"
        } else {
            "lossless"
        };
        let rate = if info.capabilities.variable_packet_size {
            "vbr"
        } else {
            "cbr"
        };
        println!("{:<6} {:<54} {} {}", info.name, info.long_name, kind, rate);
    }
    Ok(())
}
