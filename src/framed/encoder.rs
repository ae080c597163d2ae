use fehler::{throw, throws};
use std::cmp;
use tracing::debug;

use super::compress::{write_block, CompressionError, CompressionSettings};
use super::header::FrameDescriptor;
use super::WINDOW_SIZE;
use crate::raw::HashTable;
use crate::xxhash::XxHash32;

type Error = CompressionError;

/// Incremental frame compressor.
///
/// Feed input with [`add`](FrameEncoder::add) in pieces of any size and write out whatever it returns;
/// [`finish`](FrameEncoder::finish) flushes the last block and closes the frame.
/// A block is emitted as soon as a full block's worth of input is pending.
///
/// The frame header never carries a content size since it is written before the size is known.
#[derive(Debug)]
pub struct FrameEncoder<'a> {
    settings: CompressionSettings<'a>,
    descriptor: FrameDescriptor,
    /// History (at most one window, dependent mode only) followed by the input not yet compressed.
    buffer: Vec<u8>,
    history_len: usize,
    table: HashTable,
    /// Reused for independent blocks that need the dictionary in front of them.
    work: Vec<u8>,
    scratch: Vec<u8>,
    content_hasher: XxHash32,
    header_written: bool,
    finished: bool,
}

impl<'a> FrameEncoder<'a> {
    pub fn new(settings: &CompressionSettings<'a>) -> Self {
        let descriptor = settings.frame_descriptor(None);
        let mut encoder = FrameEncoder {
            settings: settings.clone(),
            buffer: Vec::with_capacity(descriptor.block_maxsize + WINDOW_SIZE),
            descriptor,
            history_len: 0,
            table: HashTable::new(),
            work: Vec::new(),
            scratch: Vec::new(),
            content_hasher: XxHash32::with_seed(0),
            header_written: false,
            finished: false,
        };

        if !encoder.descriptor.independent_blocks() {
            if let Some(dict) = settings.get_dictionary() {
                encoder.buffer.extend_from_slice(dict.window());
                encoder.history_len = dict.len();
                encoder.table.clone_from(dict.table());
            }
        }
        encoder
    }

    /// The header this encoder writes.
    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    /// Input bytes accepted but not yet emitted as part of a block.
    pub fn pending(&self) -> usize {
        self.buffer.len() - self.history_len
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Accept `chunk` and return the frame bytes it completes (possibly none).
    #[throws]
    pub fn add(&mut self, chunk: &[u8]) -> Vec<u8> {
        if self.finished {
            throw!(Error::StreamFinished);
        }

        let mut output = Vec::new();
        self.write_header(&mut output);
        if self.descriptor.content_checksum() {
            self.content_hasher.update(chunk);
        }

        let block_maxsize = self.descriptor.block_maxsize;
        let mut chunk = chunk;
        while !chunk.is_empty() {
            // never buffer more than one block of input
            let take = cmp::min(chunk.len(), block_maxsize - self.pending());
            self.buffer.extend_from_slice(&chunk[..take]);
            chunk = &chunk[take..];
            if self.pending() == block_maxsize {
                self.flush_block(&mut output)?;
            }
        }
        output
    }

    /// Compress whatever is still pending and close the frame.
    ///
    /// The encoder cannot be used afterwards; every further call fails with
    /// [`CompressionError::StreamFinished`].
    #[throws]
    pub fn finish(&mut self) -> Vec<u8> {
        if self.finished {
            throw!(Error::StreamFinished);
        }

        let mut output = Vec::new();
        self.write_header(&mut output);
        if self.pending() > 0 {
            self.flush_block(&mut output)?;
        }
        output.extend_from_slice(&[0; 4]);
        if self.descriptor.content_checksum() {
            output.extend_from_slice(&self.content_hasher.digest().to_le_bytes());
        }

        self.finished = true;
        debug!("frame finished");
        output
    }

    fn write_header(&mut self, output: &mut Vec<u8>) {
        if !self.header_written {
            self.descriptor.write_to(output);
            self.header_written = true;
        }
    }

    #[throws]
    fn flush_block(&mut self, output: &mut Vec<u8>) {
        let start = self.history_len;
        let end = self.buffer.len();
        // a stored block plus its checksum always fits
        self.scratch.resize(end - start + 8, 0);

        let used = if self.descriptor.independent_blocks() {
            let block = &self.buffer[start..end];
            self.settings.write_independent_block(&mut self.scratch, block, &mut self.work, &mut self.table)?
        } else {
            write_block(&mut self.scratch, &self.buffer, start, &mut self.table, self.descriptor.block_checksums())?
        };
        output.extend_from_slice(&self.scratch[..used]);

        if self.descriptor.independent_blocks() {
            self.buffer.clear();
            self.history_len = 0;
        } else {
            // slide: keep one window of history, positions in the table move along with it
            let drop = end.saturating_sub(WINDOW_SIZE);
            self.buffer.drain(..drop);
            self.table.shift(drop);
            self.history_len = end - drop;
        }
    }
}
