#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_window::framed::{CompressionSettings, DecompressionSettings, FrameDecoder};

// the first byte picks the chunk size, the rest is compressed and then fed to the decoder in pieces
fuzz_target!(|data: &[u8]| {
    let (piece, payload) = match data.split_first() {
        Some((&piece, payload)) => (usize::from(piece) + 1, payload),
        None => return,
    };

    let frame = CompressionSettings::default()
        .block_size(64 * 1024)
        .block_checksums(true)
        .compress_to_vec(payload)
        .expect("Could not compress input data");

    let mut settings = DecompressionSettings::default();
    settings.verify_checksum(true);
    let mut decoder = FrameDecoder::new(&settings);
    let mut output = Vec::new();
    for chunk in frame.chunks(piece) {
        output.extend(decoder.update(chunk).expect("Could not decode a valid frame"));
    }
    decoder.finish().expect("Frame was complete");
    assert!(output == payload);

    // arbitrary bytes in arbitrary pieces must only ever fail cleanly
    let mut decoder = FrameDecoder::new(&settings);
    for chunk in payload.chunks(piece) {
        if decoder.update(chunk).is_err() {
            break;
        }
    }
});
