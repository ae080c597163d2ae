#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_window::framed::{CompressionSettings, DecompressionSettings, FrameReader};
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    let mut output = Vec::new();

    CompressionSettings::default()
        .content_checksum(true)
        .independent_blocks(true)
        .block_size(64 * 1024)
        .compress(data, &mut output)
        .expect("Could not compress input data");

    let mut settings = DecompressionSettings::default();
    settings.verify_checksum(true);
    let mut roundtripped = Vec::new();
    FrameReader::new(&output[..], &settings)
        .read_to_end(&mut roundtripped)
        .expect("Could not read decompressed data");
    assert!(roundtripped.iter().eq(data));

    let one_shot = CompressionSettings::default().compress_to_vec(data).expect("Could not compress input data");
    assert!(settings.decompress(&one_shot).expect("Could not decompress").iter().eq(data));
});
