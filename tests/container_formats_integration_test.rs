//! Container format integration tests
//!
//! Writes WAV and CAF files through the muxers and reads them back through
//! the demuxers, including real FLAC and IMA4 packets.

use afconv_lib::codec::{FlacEncoder, Ima4Encoder, PacketEncoder};
use afconv_lib::error::Error;
use afconv_lib::format::{
    create_demuxer, create_muxer, detect_file_type, format_infos, ChannelLayout, FileType,
    PacketBatch, PacketDescription, PacketTableInfo, Property, StreamFormat,
};
use afconv_lib::util::{Buffer, PacketBuffer, SampleFormat};
use bytes::Bytes;

#[path = "common/mod.rs"]
mod common;

use common::*;

// ============================================================================
// WAV
// ============================================================================

#[test]
fn test_wav_24_bit_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let format = StreamFormat::linear_pcm(96000.0, 2, SampleFormat::I24, false);
    let data: Vec<u8> = (0..60u8).collect();

    let mut muxer = create_muxer(dir.path(), "hi.wav", FileType::Wav, &format).unwrap();
    muxer
        .write_packets(0, &PacketBatch::constant(Buffer::from_vec(data.clone()), 10))
        .unwrap();
    muxer.finalize().unwrap();

    let mut demuxer = create_demuxer(&dir.path().join("hi.wav")).unwrap();
    assert_eq!(demuxer.file_type(), FileType::Wav);
    assert_eq!(demuxer.data_format(), format);
    assert_eq!(demuxer.packet_count(), 10);
    assert_eq!(demuxer.packet_size_upper_bound(), 6);

    let mut buf = PacketBuffer::with_capacity(1024);
    let mut descs = Vec::new();
    assert_eq!(demuxer.read_packets(0, 100, &mut buf, &mut descs).unwrap(), 10);
    assert_eq!(buf.as_slice(), &data[..]);
    assert!(descs.is_empty());
}

#[test]
fn test_wav_stores_no_side_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let format = StreamFormat::linear_pcm(44100.0, 6, SampleFormat::I16, false);
    let mut muxer = create_muxer(dir.path(), "out.wav", FileType::Wav, &format).unwrap();

    let properties = [
        Property::MagicCookie(Bytes::from_static(b"cookie")),
        Property::ChannelLayout(ChannelLayout::discrete(6)),
        Property::PacketTableInfo(PacketTableInfo::default()),
    ];
    for property in &properties {
        let err = muxer.set_property(property).unwrap_err();
        assert!(matches!(err, Error::PropertyUnsupported(_)));
    }
}

#[test]
fn test_wav_rejects_compressed_packets() {
    let dir = tempfile::tempdir().unwrap();
    let result = create_muxer(
        dir.path(),
        "out.wav",
        FileType::Wav,
        &StreamFormat::ima4(44100.0, 1),
    );
    assert!(matches!(result, Err(Error::Unsupported(_))));
    assert!(!dir.path().join("out.wav").exists());
}

// ============================================================================
// CAF
// ============================================================================

#[test]
fn test_caf_flac_packets_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let format = StreamFormat::flac(44100.0, 2, 16, 4096);
    let mut encoder = FlacEncoder::new(&format).unwrap();

    let pcm: Vec<i32> = sine_i16(5000, 2, 44100.0)
        .iter()
        .map(|&s| (s as i32) << 16)
        .collect();
    let mut data = Vec::new();
    let mut descs = Vec::new();
    for chunk in pcm.chunks(4096 * 2) {
        let mut packet = Vec::new();
        encoder.encode(chunk, &mut packet).unwrap();
        descs.push(PacketDescription::new(data.len() as u64, packet.len() as u32, 0));
        data.extend_from_slice(&packet);
    }
    let sizes: Vec<u32> = descs.iter().map(|d| d.data_byte_size).collect();

    let mut muxer = create_muxer(dir.path(), "out.caf", FileType::Caf, &format).unwrap();
    muxer
        .set_property(&Property::MagicCookie(Bytes::from_static(b"early")))
        .unwrap();
    muxer
        .write_packets(0, &PacketBatch::variable(Buffer::from_vec(data), descs))
        .unwrap();
    let cookie = encoder.magic_cookie().unwrap();
    muxer
        .set_property(&Property::MagicCookie(cookie.clone()))
        .unwrap();
    muxer
        .set_property(&Property::PacketTableInfo(PacketTableInfo::from_total(
            8192, 0, 3192,
        )))
        .unwrap();
    muxer.finalize().unwrap();

    let path = dir.path().join("out.caf");
    let decoded = decode_file(&path);
    assert_eq!(decoded.format, format);
    assert_eq!(decoded.packet_count, 2);
    assert_eq!(decoded.magic_cookie, Some(cookie));
    let table = decoded.packet_table.unwrap();
    assert_eq!(table.valid_frames, 5000);
    assert_eq!(table.remainder_frames, 3192);
    assert_eq!(decoded.samples, pcm);

    let demuxer = create_demuxer(&path).unwrap();
    assert_eq!(
        demuxer.packet_size_upper_bound(),
        sizes.iter().copied().max().unwrap()
    );
}

#[test]
fn test_caf_ima4_with_channel_layout() {
    let dir = tempfile::tempdir().unwrap();
    let format = StreamFormat::ima4(48000.0, 3);
    let mut encoder = Ima4Encoder::new(&format).unwrap();
    let mut data = Vec::new();
    encoder.encode(&vec![0i32; 64 * 3], &mut data).unwrap();
    encoder.encode(&vec![0i32; 64 * 3], &mut data).unwrap();

    let mut muxer = create_muxer(dir.path(), "out.caf", FileType::Caf, &format).unwrap();
    muxer
        .write_packets(0, &PacketBatch::constant(Buffer::from_vec(data), 2))
        .unwrap();
    muxer
        .set_property(&Property::ChannelLayout(ChannelLayout::discrete(3)))
        .unwrap();
    muxer.finalize().unwrap();

    let decoded = decode_file(&dir.path().join("out.caf"));
    assert_eq!(decoded.packet_count, 2);
    assert_eq!(decoded.frames(), 128);
    assert!(decoded.samples.iter().all(|&s| s == 0));
    assert_eq!(decoded.channel_layout, Some(ChannelLayout::discrete(3)));
}

#[test]
fn test_caf_read_past_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_caf_i16(dir.path(), "in.caf", &[1, 2, 3, 4], 1, 8000.0, None);
    let mut demuxer = create_demuxer(&path).unwrap();
    let mut buf = PacketBuffer::with_capacity(64);
    let mut descs = Vec::new();

    assert_eq!(demuxer.read_packets(2, 10, &mut buf, &mut descs).unwrap(), 2);
    let err = demuxer
        .read_packets(4, 10, &mut buf, &mut descs)
        .unwrap_err();
    assert!(err.is_end_of_stream());
}

#[test]
fn test_caf_with_absurd_channel_count_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_caf_i16(dir.path(), "wide.caf", &[1, 2, 3, 4], 2, 8000.0, None);

    // File header (8 bytes), desc chunk header (12), then channels at +24
    let mut bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[8..12], b"desc");
    bytes[44..48].copy_from_slice(&0x8000_0000u32.to_be_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let err = create_demuxer(&path).err().unwrap();
    assert!(matches!(err.root(), Error::Format(_)), "{}", err);
}

// ============================================================================
// Detection
// ============================================================================

#[test]
fn test_detection_prefers_magic_over_extension() {
    let dir = tempfile::tempdir().unwrap();
    let samples = sine_i16(10, 1, 8000.0);
    let path = write_wav_i16(dir.path(), "misnamed.caf", &samples, 1, 8000.0);
    assert_eq!(detect_file_type(&path).unwrap(), FileType::Wav);
    assert_eq!(decode_file(&path).samples_i16(), samples);
}

#[test]
fn test_format_infos_cover_every_file_type() {
    let infos = format_infos();
    assert_eq!(infos.len(), 2);
    let caf = infos.iter().find(|i| i.file_type == FileType::Caf).unwrap();
    assert!(caf.capabilities.magic_cookie);
    assert!(caf.capabilities.packet_table);
    let wav = infos.iter().find(|i| i.file_type == FileType::Wav).unwrap();
    assert!(!wav.capabilities.channel_layout);
}
