//! The LZ4 frame format: header, blocks, end mark and checksums.
//!
//! One-shot functions work on whole buffers ([`CompressionSettings::compress_to_vec`],
//! [`DecompressionSettings::decompress`]). For data that arrives in pieces use the
//! streaming [`FrameEncoder`] / [`FrameDecoder`], or the [`FrameWriter`] / [`FrameReader`]
//! adapters on top of them.

mod compress;
mod decoder;
mod decompress;
mod encoder;
pub mod header;
mod io;
mod parser;
mod window;

/// The four magic bytes at the start of every LZ4 frame.
const MAGIC: u32 = 0x184D2204;
/// Skippable frames use the sixteen magic numbers `0x184D2A50..=0x184D2A5F`.
const SKIPPABLE_MAGIC: u32 = 0x184D2A50;
const SKIPPABLE_MAGIC_MASK: u32 = 0xFFFFFFF0;
/// The frame format sets the high bit of every length field to indicate that the data was not compressed.
const INCOMPRESSIBLE: u32 = 1 << 31;
/// The LZ4 raw format maintains a lookback window of exactly 64KiB.
pub const WINDOW_SIZE: usize = 64 * 1024;

fn is_skippable(magic: u32) -> bool {
    magic & SKIPPABLE_MAGIC_MASK == SKIPPABLE_MAGIC
}

pub use compress::*;
pub use decoder::*;
pub use decompress::*;
pub use encoder::*;
pub use header::{BlockDescriptor, Flags, FrameDescriptor};
pub use io::*;
pub use parser::*;
pub use window::HistoryWindow;
