use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};
use std::convert::TryFrom;
use std::io::{self, ErrorKind};
use thiserror::Error;
use tracing::{debug, trace};

use super::header::{self, descriptor_len, FrameDescriptor};
use super::window::HistoryWindow;
use super::{is_skippable, INCOMPRESSIBLE, MAGIC, WINDOW_SIZE};
use crate::raw::{self, DecodeError};
use crate::xxhash::{xxh32, XxHash32};

/// Errors when decompressing an LZ4 frame.
#[derive(Error, Debug)]
pub enum DecompressionError {
    #[error("error reading from the input you gave me")]
    InputError(#[from] io::Error),
    #[error("the raw LZ4 decompression failed (data corruption?)")]
    CodecError(#[from] DecodeError),
    #[error("invalid header")]
    HeaderParseError(#[from] header::ParseError),
    #[error("wrong magic number in frame header: {0:08x}")]
    InvalidMagicNumber(u32),
    #[error("unexpected end of input")]
    TruncatedInput,
    #[error("the header checksum was invalid")]
    HeaderChecksumFail,
    #[error("a block checksum was invalid")]
    BlockChecksumFail,
    #[error("the content checksum was invalid")]
    ContentChecksumFail,
    #[error("a block is larger than the frame's maximum block size")]
    BlockSizeOverflow,
    #[error("frame declared {expected} bytes of content but decoded to {actual}")]
    ContentSizeMismatch { expected: u64, actual: u64 },
}
type Error = DecompressionError; // do it this way for better docs

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::InputError(e) => e,
            e => io::Error::new(ErrorKind::Other, e),
        }
    }
}

/// Decoding into a buffer of exactly one block: running out of room means the block was too big.
pub(crate) fn block_overflow(e: DecodeError) -> Error {
    match e {
        DecodeError::OutputBufferTooSmall => Error::BlockSizeOverflow,
        e => Error::CodecError(e),
    }
}

/// Cursor over the input that turns every short read into [`DecompressionError::TruncatedInput`].
struct ByteReader<'i> {
    input: &'i [u8],
}

impl<'i> ByteReader<'i> {
    fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    fn remaining(&self) -> usize {
        self.input.len()
    }

    #[throws]
    fn take(&mut self, n: usize) -> &'i [u8] {
        if n > self.input.len() {
            throw!(Error::TruncatedInput);
        }
        let (head, tail) = self.input.split_at(n);
        self.input = tail;
        head
    }

    #[throws]
    fn peek_u8(&self) -> u8 {
        match self.input.first() {
            Some(&b) => b,
            None => throw!(Error::TruncatedInput),
        }
    }

    #[throws]
    fn read_u32(&mut self) -> u32 {
        LE::read_u32(self.take(4)?)
    }
}

struct Block<'i> {
    data: &'i [u8],
    compressed: bool,
}

/// Reads the next block of the current frame, or `None` at the end mark.
#[throws]
fn read_block<'i>(reader: &mut ByteReader<'i>, descriptor: &FrameDescriptor, verify_checksum: bool) -> Option<Block<'i>> {
    let block_length = reader.read_u32()?;
    if block_length == 0 {
        return None;
    }

    let compressed = block_length & INCOMPRESSIBLE == 0;
    let block_length = (block_length & !INCOMPRESSIBLE) as usize;
    if block_length > descriptor.block_maxsize {
        throw!(Error::BlockSizeOverflow);
    }

    let data = reader.take(block_length)?;

    if descriptor.block_checksums() {
        // always consumed, only compared on request
        let checksum = reader.read_u32()?;
        if verify_checksum && xxh32(data, 0) != checksum {
            throw!(Error::BlockChecksumFail);
        }
    }

    trace!(block_length, compressed, "read block");
    Some(Block { data, compressed })
}

#[throws]
fn check_content_checksum<F: FnOnce() -> u32>(
    reader: &mut ByteReader<'_>,
    descriptor: &FrameDescriptor,
    verify_checksum: bool,
    actual: F,
) {
    if descriptor.content_checksum() {
        let checksum = reader.read_u32()?;
        if verify_checksum && actual() != checksum {
            throw!(Error::ContentChecksumFail);
        }
    }
}

/// A builder-style struct that configures decompression.
///
/// Create it using `Default::default()`.
#[derive(Clone, Debug, Default)]
pub struct DecompressionSettings<'a> {
    dictionary: Option<&'a [u8]>,
    verify_checksum: bool,
}

impl<'a> DecompressionSettings<'a> {
    /// The dictionary the frames were compressed with. Only its last 64 KiB matter.
    pub fn dictionary(&mut self, dict: &'a [u8]) -> &mut Self {
        self.dictionary = Some(dict);
        self
    }

    /// Verify block and content checksums (when the frame has them).
    /// The header checksum is always verified.
    ///
    /// Verification is disabled by default.
    pub fn verify_checksum(&mut self, v: bool) -> &mut Self {
        self.verify_checksum = v;
        self
    }

    pub(crate) fn dictionary_window(&self) -> &'a [u8] {
        match self.dictionary {
            Some(dict) => &dict[dict.len().saturating_sub(WINDOW_SIZE)..],
            None => &[],
        }
    }

    pub(crate) fn verifies_checksum(&self) -> bool {
        self.verify_checksum
    }

    /// Decompress every frame in `input` and return the concatenated contents.
    ///
    /// Skippable frames are skipped. Anything that is neither a frame nor a skippable frame is an error.
    #[throws]
    pub fn decompress(&self, input: &[u8]) -> Vec<u8> {
        let mut reader = ByteReader { input };
        if reader.is_empty() {
            throw!(Error::TruncatedInput);
        }

        let mut output = Vec::new();
        while !reader.is_empty() {
            let magic = reader.read_u32()?;
            if is_skippable(magic) {
                let skip = reader.read_u32()?;
                debug!(magic, skip, "skipping skippable frame");
                reader.take(skip as usize)?;
                continue;
            }
            if magic != MAGIC {
                throw!(Error::InvalidMagicNumber(magic));
            }

            let flg = reader.peek_u8()?;
            let descriptor = FrameDescriptor::parse(reader.take(descriptor_len(flg) + 1)?)?;
            debug!(
                block_maxsize = descriptor.block_maxsize,
                content_size = ?descriptor.content_size,
                flags = ?descriptor.flags,
                "parsed frame header"
            );

            // a declared size is only trusted if the remaining input could plausibly expand to it
            let direct_size = descriptor
                .content_size
                .filter(|&size| size > 0 && size <= (reader.remaining() as u64).saturating_mul(255))
                .and_then(|size| usize::try_from(size).ok());

            match direct_size {
                Some(size) => self.decode_direct(&mut reader, &descriptor, size, &mut output)?,
                None => self.decode_accumulating(&mut reader, &descriptor, &mut output)?,
            }
        }
        output
    }

    /// Decode straight into the final buffer, whose size the header told us.
    #[throws]
    fn decode_direct(&self, reader: &mut ByteReader<'_>, descriptor: &FrameDescriptor, size: usize, output: &mut Vec<u8>) {
        let dictionary = self.dictionary_window();
        let start = output.len();
        output.resize(start + size, 0);
        let frame_output = &mut output[start..];

        let mut position = 0;
        while let Some(block) = read_block(reader, descriptor, self.verify_checksum)? {
            let written = if !block.compressed {
                let target = match frame_output.get_mut(position..position + block.data.len()) {
                    Some(target) => target,
                    None => throw!(DecodeError::OutputBufferTooSmall),
                };
                target.copy_from_slice(block.data);
                block.data.len()
            } else if descriptor.independent_blocks() {
                raw::decompress_block(block.data, &mut frame_output[position..], 0, dictionary)?
            } else {
                raw::decompress_block(block.data, frame_output, position, dictionary)?
            };
            if written > descriptor.block_maxsize {
                throw!(Error::BlockSizeOverflow);
            }
            position += written;
        }

        if position != size {
            throw!(Error::ContentSizeMismatch { expected: size as u64, actual: position as u64 });
        }
        check_content_checksum(reader, descriptor, self.verify_checksum, || xxh32(frame_output, 0))?;
    }

    /// Decode block by block into a workspace, carrying a 64 KiB window between blocks.
    #[throws]
    fn decode_accumulating(&self, reader: &mut ByteReader<'_>, descriptor: &FrameDescriptor, output: &mut Vec<u8>) {
        let dictionary = self.dictionary_window();
        let mut window = HistoryWindow::seeded(dictionary);
        let mut workspace = Vec::new();
        let mut content_hasher = XxHash32::with_seed(0);
        let start = output.len();

        while let Some(block) = read_block(reader, descriptor, self.verify_checksum)? {
            let produced = if block.compressed {
                if workspace.is_empty() {
                    workspace.resize(descriptor.block_maxsize, 0);
                }
                let history = if descriptor.independent_blocks() { dictionary } else { window.as_slice() };
                let written = raw::decompress_block(block.data, &mut workspace, 0, history).map_err(block_overflow)?;
                &workspace[..written]
            } else {
                block.data
            };

            if descriptor.content_checksum() {
                content_hasher.update(produced);
            }
            if !descriptor.independent_blocks() {
                window.push(produced);
            }
            output.extend_from_slice(produced);
        }

        let actual = (output.len() - start) as u64;
        if let Some(expected) = descriptor.content_size {
            if expected != actual {
                throw!(Error::ContentSizeMismatch { expected, actual });
            }
        }
        check_content_checksum(reader, descriptor, self.verify_checksum, || content_hasher.digest())?;
    }
}

/// Decompress all frames in `input` with default settings (no dictionary, checksums not verified).
#[throws]
pub fn decompress_frame(input: &[u8]) -> Vec<u8> {
    DecompressionSettings::default().decompress(input)?
}

#[cfg(test)]
mod tests {
    use super::*;

    // handmade frame: default header, one uncompressed block "abc", end mark
    fn stored_frame() -> Vec<u8> {
        let mut frame = vec![0x04, 0x22, 0x4D, 0x18, 0x40, 0x70, 0xDF];
        frame.extend_from_slice(&(3 | INCOMPRESSIBLE).to_le_bytes());
        frame.extend_from_slice(b"abc");
        frame.extend_from_slice(&[0, 0, 0, 0]);
        frame
    }

    #[test]
    fn stored_block() {
        assert_eq!(decompress_frame(&stored_frame()).unwrap(), b"abc");
    }

    #[test]
    fn wrong_magic() {
        let mut frame = stored_frame();
        frame[0] = 0x05;
        assert!(matches!(decompress_frame(&frame), Err(Error::InvalidMagicNumber(0x184D2205))));
    }

    #[test]
    fn empty_input_is_truncated() {
        assert!(matches!(decompress_frame(&[]), Err(Error::TruncatedInput)));
    }

    #[test]
    fn truncated_everywhere() {
        let frame = stored_frame();
        for len in 1..frame.len() {
            assert!(decompress_frame(&frame[..len]).is_err(), "prefix of {} bytes decoded", len);
        }
    }

    #[test]
    fn trailing_garbage() {
        let mut frame = stored_frame();
        frame.extend_from_slice(&[1, 2, 3, 4, 5]);
        assert!(matches!(decompress_frame(&frame), Err(Error::InvalidMagicNumber(_))));
    }

    #[test]
    fn block_larger_than_maximum() {
        let mut frame = vec![0x04, 0x22, 0x4D, 0x18, 0x40, 0x70, 0xDF];
        frame.extend_from_slice(&(5 * 1024 * 1024u32 | INCOMPRESSIBLE).to_le_bytes());
        assert!(matches!(decompress_frame(&frame), Err(Error::BlockSizeOverflow)));
    }

    #[test]
    fn io_error_conversion() {
        let e: io::Error = Error::HeaderChecksumFail.into();
        assert_eq!(e.kind(), ErrorKind::Other);
        let e: io::Error = Error::InputError(io::Error::new(ErrorKind::UnexpectedEof, "eof")).into();
        assert_eq!(e.kind(), ErrorKind::UnexpectedEof);
    }
}
