#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_window::framed::{CompressionSettings, DecompressionSettings};
use std::io::{Read, Write};

fuzz_target!(|data: &[u8]| {
    // the reference implementation compresses, we decompress
    if let Ok(compressed) = reference_compress(data) {
        let mut settings = DecompressionSettings::default();
        settings.verify_checksum(true);
        let decompressed = settings
            .decompress(&compressed)
            .expect("Failed to decompress data compressed by C implementation");
        assert!(data == decompressed.as_slice(), "Decompression result did not match the original input");
    }

    // and the other way around
    let ours = CompressionSettings::default()
        .content_checksum(true)
        .compress_to_vec(data)
        .expect("Could not compress input data");
    let mut decoder = lz4::Decoder::new(&ours[..]).expect("C implementation rejected our header");
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed).expect("C implementation failed to decompress our frame");
    assert!(data == decompressed.as_slice(), "C implementation decompressed our frame to something else");
});

// compress data using the reference lz4 implementation
fn reference_compress(data: &[u8]) -> Result<Vec<u8>, ()> {
    let output = Vec::new();
    let mut encoder = lz4::EncoderBuilder::new().level(4).build(output).map_err(|_| ())?;
    encoder.write_all(data).map_err(|_| ())?;
    let (output, result) = encoder.finish();
    result.map(|_| output).map_err(|_| ())
}
