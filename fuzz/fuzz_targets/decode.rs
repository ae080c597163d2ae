#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_window::framed::DecompressionSettings;
use lz4_window::raw;

fuzz_target!(|data: &[u8]| {
    // we deliberately ignore errors here because random bytes from fuzzer
    // are not valid LZ4 data and so are expected to trigger non-fatal errors
    let mut settings = DecompressionSettings::default();
    settings.verify_checksum(true);
    let _ = settings.decompress(data);

    let mut output = vec![0; 4096];
    let _ = raw::decompress_block(data, &mut output, 0, b"some dictionary bytes");
});
