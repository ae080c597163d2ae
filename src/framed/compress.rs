use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};
use std::borrow::Cow;
use std::cmp;
use std::io::{self, ErrorKind, Read, Write};
use thiserror::Error;
use tracing::{debug, trace};

use super::encoder::FrameEncoder;
use super::header::{BlockDescriptor, Flags, FrameDescriptor};
use super::{INCOMPRESSIBLE, WINDOW_SIZE};
use crate::dictionary::Dictionary;
use crate::raw::{self, CompressError, HashTable};
use crate::xxhash::xxh32;

/// Errors when compressing an LZ4 frame.
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("error reading from the input you gave me")]
    ReadError(io::Error),
    #[error("error writing to the output you gave me")]
    WriteError(#[from] io::Error),
    #[error("the output buffer is too small for the compressed frame")]
    OutputBufferTooSmall,
    #[error("the stream was already finished")]
    StreamFinished,
    #[error("the raw LZ4 compression failed")]
    CodecError(#[from] CompressError),
}
type Error = CompressionError; // do it this way for better docs

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::ReadError(e) | Error::WriteError(e) => e,
            e => io::Error::new(ErrorKind::Other, e),
        }
    }
}

/// Positions in the match finder are 32 bits; long dependent frames are rebased before they get close.
const REBASE_THRESHOLD: usize = 1 << 30;

/// Writes one block (length field, data, optional checksum) at the start of `out` and returns
/// the number of bytes used.
///
/// `src[start..]` is the block, anything before `start` is history known to `table`.
/// Falls back to storing the block uncompressed unless compression makes it strictly smaller.
#[throws]
pub(crate) fn write_block(out: &mut [u8], src: &[u8], start: usize, table: &mut HashTable, block_checksums: bool) -> usize {
    let raw_block = &src[start..];
    let raw_len = raw_block.len();
    if out.len() < 4 {
        throw!(Error::OutputBufferTooSmall);
    }

    // limit output by input size so we never have negative compression ratio
    let limit = cmp::min(out.len(), 4 + raw_len);
    let attempt = raw::compress_block(src, start, raw_len, table, &mut out[..limit], 4);
    let (length_field, stored_len) = match attempt {
        Ok(written) if written < raw_len => (written as u32, written),
        Ok(_) | Err(CompressError::OutputBufferTooSmall) => {
            // incompressible
            match out.get_mut(4..4 + raw_len) {
                Some(body) => body.copy_from_slice(raw_block),
                None => throw!(Error::OutputBufferTooSmall),
            }
            (raw_len as u32 | INCOMPRESSIBLE, raw_len)
        }
        Err(e) => throw!(e),
    };
    LE::write_u32(&mut out[..4], length_field);

    let mut used = 4 + stored_len;
    if block_checksums {
        let checksum = xxh32(&out[4..used], 0);
        match out.get_mut(used..used + 4) {
            Some(field) => LE::write_u32(field, checksum),
            None => throw!(Error::OutputBufferTooSmall),
        }
        used += 4;
    }

    trace!(raw_len, stored_len, compressed = (length_field & INCOMPRESSIBLE == 0), "wrote block");
    used
}

/// Bounds-checked cursor over the caller's output buffer.
struct FrameOutput<'o> {
    buffer: &'o mut [u8],
    position: usize,
}

impl<'o> FrameOutput<'o> {
    #[throws]
    fn put(&mut self, data: &[u8]) {
        match self.buffer.get_mut(self.position..self.position + data.len()) {
            Some(target) => target.copy_from_slice(data),
            None => throw!(Error::OutputBufferTooSmall),
        }
        self.position += data.len();
    }

    fn rest(&mut self) -> &mut [u8] {
        &mut self.buffer[self.position..]
    }
}

/// A builder-style struct that configures compression settings.
/// This is how you compress LZ4 frames.
/// (An LZ4 file usually consists of a single frame.)
///
/// Create it using `Default::default()`.
#[derive(Clone, Debug)]
pub struct CompressionSettings<'a> {
    independent_blocks: bool,
    block_checksums: bool,
    content_checksum: bool,
    content_size: bool,
    block_size: usize,
    dictionary: Option<&'a Dictionary>,
    write_dictionary_id: bool,
}
impl<'a> Default for CompressionSettings<'a> {
    fn default() -> Self {
        Self {
            independent_blocks: false,
            block_checksums: false,
            content_checksum: false,
            content_size: true,
            block_size: 4 * 1024 * 1024,
            dictionary: None,
            write_dictionary_id: false,
        }
    }
}
impl<'a> CompressionSettings<'a> {
    /// In independent mode, blocks are not allowed to reference data from previous blocks.
    /// Hence, using dependent blocks yields slightly better compression.
    /// The upside of independent blocks is that they can be compressed in parallel and decoded in any order.
    ///
    /// Blocks are dependent by default.
    pub fn independent_blocks(&mut self, v: bool) -> &mut Self {
        self.independent_blocks = v;
        self
    }

    /// Block checksums can help detect data corruption in storage and transit.
    /// They do not offer error correction though.
    ///
    /// Block checksums are disabled by default.
    pub fn block_checksums(&mut self, v: bool) -> &mut Self {
        self.block_checksums = v;
        self
    }

    /// The content checksum (also called frame checksum) is calculated over the contents of the entire frame.
    /// This makes them cheaper than block checksums as their size overhead is constant
    /// as well as marginally more useful, because they can help protect against incorrect decompression.
    ///
    /// Note that the content checksum can only be verified *after* the entire frame has been read.
    ///
    /// Content checksums are disabled by default.
    pub fn content_checksum(&mut self, v: bool) -> &mut Self {
        self.content_checksum = v;
        self
    }

    /// Write the uncompressed size into the header of one-shot frames, which lets the decompressor
    /// allocate the output once. Streaming compression never knows the size up front.
    ///
    /// Enabled by default.
    pub fn content_size(&mut self, v: bool) -> &mut Self {
        self.content_size = v;
        self
    }

    /// Supported sizes are 64 KiB, 256 KiB, 1 MiB and 4 MiB. Other values are rounded up to the
    /// next supported size, anything larger than 4 MiB becomes 4 MiB.
    ///
    /// The default block size is 4 MiB.
    pub fn block_size(&mut self, v: usize) -> &mut Self {
        self.block_size = v;
        self
    }

    /// Compress against `dict`. The decompressing side needs the same dictionary bytes.
    ///
    /// By default, no dictionary is used.
    pub fn dictionary(&mut self, dict: &'a Dictionary) -> &mut Self {
        self.dictionary = Some(dict);
        self
    }

    /// Write the dictionary's id into the frame header.
    ///
    /// The LZ4 CLI never writes one, and decoders mostly ignore it, so this is off by default.
    pub fn write_dictionary_id(&mut self, v: bool) -> &mut Self {
        self.write_dictionary_id = v;
        self
    }

    /// The block size that actually ends up in the frame.
    pub fn block_maxsize(&self) -> usize {
        // every value BlockDescriptor::new produces is a valid size
        BlockDescriptor::new(self.block_size).block_maxsize().unwrap_or(4 * 1024 * 1024)
    }

    pub(crate) fn frame_descriptor(&self, content_size: Option<u64>) -> FrameDescriptor {
        let mut flags = Flags::empty();
        if self.independent_blocks {
            flags |= Flags::IndependentBlocks;
        }
        if self.block_checksums {
            flags |= Flags::BlockChecksums;
        }
        if self.content_checksum {
            flags |= Flags::ContentChecksum;
        }

        FrameDescriptor {
            flags,
            block_maxsize: self.block_maxsize(),
            content_size,
            dictionary_id: match self.dictionary {
                Some(dict) if self.write_dictionary_id => Some(dict.id()),
                _ => None,
            },
        }
    }

    pub(crate) fn get_dictionary(&self) -> Option<&'a Dictionary> {
        self.dictionary
    }

    /// Worst-case size of a frame holding `len` bytes of input.
    pub fn max_compressed_size(&self, len: usize) -> usize {
        let mut size = 19 + len + len / 255 + 64 + 8;
        if self.block_checksums {
            size += 4 * (len / self.block_maxsize() + 1);
        }
        size
    }

    /// Compress `input` into a single frame held in a freshly allocated vector.
    #[throws]
    pub fn compress_to_vec(&self, input: &[u8]) -> Vec<u8> {
        let mut output = vec![0; self.max_compressed_size(input.len())];
        let len = self.compress_into(input, &mut output)?;
        output.truncate(len);
        output
    }

    /// Compress `input` into a single frame written to the start of `output`; returns the frame length.
    ///
    /// [`max_compressed_size`](Self::max_compressed_size) bytes are always enough. Smaller buffers work as
    /// long as the frame fits, otherwise this fails with [`CompressionError::OutputBufferTooSmall`].
    #[throws]
    pub fn compress_into(&self, input: &[u8], output: &mut [u8]) -> usize {
        let content_size = if self.content_size { Some(input.len() as u64) } else { None };
        let descriptor = self.frame_descriptor(content_size);
        let block_maxsize = descriptor.block_maxsize;
        debug!(len = input.len(), block_maxsize, flags = ?descriptor.flags, "compressing frame");

        let mut header = Vec::with_capacity(19);
        descriptor.write_to(&mut header);
        let mut out = FrameOutput { buffer: output, position: 0 };
        out.put(&header)?;

        let mut table = HashTable::new();
        if self.independent_blocks {
            let mut work = Vec::new();
            for block in input.chunks(block_maxsize) {
                let used = self.write_independent_block(out.rest(), block, &mut work, &mut table)?;
                out.position += used;
            }
        } else {
            // the dictionary is stitched in front of the input so matches can reach into it
            let (work, offset) = match self.dictionary {
                Some(dict) if !dict.is_empty() => {
                    let mut work = Vec::with_capacity(dict.len() + input.len());
                    work.extend_from_slice(dict.window());
                    work.extend_from_slice(input);
                    table.clone_from(dict.table());
                    (Cow::Owned(work), dict.len())
                }
                _ => (Cow::Borrowed(input), 0),
            };

            let mut base = 0;
            let mut block_start = offset;
            while block_start < work.len() {
                let block_end = cmp::min(block_start + block_maxsize, work.len());
                if block_end - base > REBASE_THRESHOLD {
                    let new_base = cmp::max(base, block_start.saturating_sub(WINDOW_SIZE));
                    table.shift(new_base - base);
                    base = new_base;
                }

                let src = &work[base..block_end];
                let used = write_block(out.rest(), src, block_start - base, &mut table, self.block_checksums)?;
                out.position += used;
                block_start = block_end;
            }
        }

        out.put(&[0; 4])?;
        if self.content_checksum {
            // over the original input, never the dictionary
            out.put(&xxh32(input, 0).to_le_bytes())?;
        }
        out.position
    }

    /// Compress `block` on its own, seeing nothing but the dictionary as history.
    #[throws]
    pub(crate) fn write_independent_block(&self, out: &mut [u8], block: &[u8], work: &mut Vec<u8>, table: &mut HashTable) -> usize {
        match self.dictionary {
            Some(dict) if !dict.is_empty() => {
                work.clear();
                work.extend_from_slice(dict.window());
                work.extend_from_slice(block);
                table.clone_from(dict.table());
                write_block(out, work, dict.len(), table, self.block_checksums)?
            }
            _ => {
                table.clear();
                write_block(out, block, 0, table, self.block_checksums)?
            }
        }
    }

    /// Compress everything `reader` produces into `writer`, as one frame.
    ///
    /// The content size is not known up front, so the header never carries it.
    #[throws]
    pub fn compress<R: Read, W: Write>(&self, mut reader: R, mut writer: W) {
        let mut encoder = FrameEncoder::new(self);
        let mut buffer = vec![0u8; WINDOW_SIZE];
        loop {
            let read_bytes = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => throw!(Error::ReadError(e)),
            };
            writer.write_all(&encoder.add(&buffer[..read_bytes])?)?;
        }
        writer.write_all(&encoder.finish()?)?;
    }

    /// Like [`compress_to_vec`](Self::compress_to_vec), but compresses blocks on the rayon thread pool.
    ///
    /// Parallel workers cannot share a history window, so the frame always uses independent blocks.
    #[cfg(feature = "parallel")]
    #[throws]
    pub fn compress_parallel(&self, input: &[u8]) -> Vec<u8> {
        use rayon::prelude::*;

        let mut settings = self.clone();
        settings.independent_blocks(true);
        let content_size = if settings.content_size { Some(input.len() as u64) } else { None };
        let descriptor = settings.frame_descriptor(content_size);
        debug!(len = input.len(), block_maxsize = descriptor.block_maxsize, "compressing frame in parallel");

        let blocks = input
            .par_chunks(descriptor.block_maxsize)
            .map(|block| -> Result<Vec<u8>, Error> {
                let mut out = vec![0; block.len() + 8];
                let used = settings.write_independent_block(&mut out, block, &mut Vec::new(), &mut HashTable::new())?;
                out.truncate(used);
                Ok(out)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut output = Vec::with_capacity(self.max_compressed_size(input.len()));
        descriptor.write_to(&mut output);
        for block in &blocks {
            output.extend_from_slice(block);
        }
        output.extend_from_slice(&[0; 4]);
        if settings.content_checksum {
            output.extend_from_slice(&xxh32(input, 0).to_le_bytes());
        }
        output
    }
}

/// Upper bound for the size of a frame holding `len` bytes with default settings.
pub fn max_compressed_size(len: usize) -> usize {
    CompressionSettings::default().max_compressed_size(len)
}

/// Compress `input` into one frame with default settings.
#[throws]
pub fn compress_frame(input: &[u8]) -> Vec<u8> {
    CompressionSettings::default().compress_to_vec(input)?
}
