//! Pure Rust LZ4: the raw block format, the frame format around it, dictionaries and incremental streaming.
//!
//! ```
//! let compressed = lz4_window::compress(b"Hello World Hello World Hello World").unwrap();
//! assert_eq!(lz4_window::decompress(&compressed).unwrap(), b"Hello World Hello World Hello World");
//! ```
//!
//! For non-default options build a [`CompressionSettings`] or [`DecompressionSettings`].
//! Data that arrives in pieces goes through [`create_compress_stream`] / [`create_decompress_stream`],
//! or the [`FrameWriter`] / [`FrameReader`] adapters.

#![forbid(unsafe_code)]

pub mod convenience;
pub mod dictionary;
pub mod framed;
pub mod raw;
pub mod xxhash;

pub use convenience::{compress_object, compress_string, decompress_object, decompress_string, ConvenienceError};
pub use dictionary::Dictionary;
pub use framed::{
    CompressionError, CompressionSettings, DecompressionError, DecompressionSettings, FrameDecoder, FrameEncoder,
    FrameReader, FrameWriter,
};

/// Compress `input` into one frame: 4 MiB dependent blocks, content size in the header, no checksums.
pub fn compress(input: &[u8]) -> Result<Vec<u8>, CompressionError> {
    CompressionSettings::default().compress_to_vec(input)
}

/// Decompress every frame in `input`, without a dictionary and without verifying checksums.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DecompressionError> {
    DecompressionSettings::default().decompress(input)
}

pub fn create_compress_stream<'a>(settings: &CompressionSettings<'a>) -> FrameEncoder<'a> {
    FrameEncoder::new(settings)
}

pub fn create_decompress_stream<'a>(settings: &DecompressionSettings<'a>) -> FrameDecoder<'a> {
    FrameDecoder::new(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str;

    /// Test that the compressed string decompresses to the original string.
    fn inverse(s: &str) {
        let compressed = compress(s.as_bytes()).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(str::from_utf8(&decompressed).unwrap(), s);
    }

    #[test]
    fn shakespear() {
        inverse("to live or not to live");
        inverse("Love is a wonderful terrible thing");
        inverse("There is nothing either good or bad, but thinking makes it so.");
        inverse("I burn, I pine, I perish.");
    }

    #[test]
    fn save_the_pandas() {
        inverse("To cute to die! Save the red panda!");
        inverse("You are 60% water. Save 60% of yourself!");
        inverse("Save water, it doesn't grow on trees.");
        inverse("The panda bear has an amazing black-and-white fur.");
        inverse("The average panda eats as much as 9 to 14 kg of bamboo shoots a day.");
        inverse("The Empress Dowager Bo was buried with a panda skull in her vault");
    }

    #[test]
    fn short() {
        inverse("ahhd");
        inverse("x");
        inverse("");
        inverse("\0\0\0\0\0\0\0\0\0\0\0\0\0");
    }

    #[test]
    fn streams_match_one_shot() {
        let text = "The Read trait allows for reading bytes from a source. ".repeat(3000);
        let mut settings = CompressionSettings::default();
        settings.block_size(64 * 1024).content_checksum(true);

        let mut encoder = create_compress_stream(&settings);
        let mut frame = Vec::new();
        for chunk in text.as_bytes().chunks(5000) {
            frame.extend(encoder.add(chunk).unwrap());
        }
        frame.extend(encoder.finish().unwrap());

        let mut decoder = create_decompress_stream(&DecompressionSettings::default());
        let mut streamed = Vec::new();
        for chunk in frame.chunks(777) {
            streamed.extend(decoder.update(chunk).unwrap());
        }
        decoder.finish().unwrap();

        assert_eq!(streamed, text.as_bytes());
        assert_eq!(decompress(&frame).unwrap(), text.as_bytes());
        assert_eq!(decompress(&settings.compress_to_vec(text.as_bytes()).unwrap()).unwrap(), text.as_bytes());
    }
}
