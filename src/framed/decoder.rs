use fehler::{throw, throws};
use tracing::trace;

use super::decompress::{block_overflow, DecompressionError, DecompressionSettings};
use super::header::FrameDescriptor;
use super::parser::{FrameEvent, FrameParser};
use super::window::HistoryWindow;
use crate::raw;
use crate::xxhash::{xxh32, XxHash32};

type Error = DecompressionError;

/// Incremental frame decompressor.
///
/// Input may be split anywhere, [`update`](FrameDecoder::update) returns the decompressed bytes of every
/// block the new input completes. Concatenated frames and skippable frames are handled like
/// [`DecompressionSettings::decompress`] does.
#[derive(Debug)]
pub struct FrameDecoder<'a> {
    parser: FrameParser,
    dictionary: &'a [u8],
    verify_checksum: bool,
    descriptor: Option<FrameDescriptor>,
    window: HistoryWindow,
    workspace: Vec<u8>,
    content_hasher: XxHash32,
    produced: u64,
}

impl<'a> FrameDecoder<'a> {
    pub fn new(settings: &DecompressionSettings<'a>) -> Self {
        let dictionary = settings.dictionary_window();
        FrameDecoder {
            parser: FrameParser::new(),
            dictionary,
            verify_checksum: settings.verifies_checksum(),
            descriptor: None,
            window: HistoryWindow::seeded(dictionary),
            workspace: Vec::new(),
            content_hasher: XxHash32::with_seed(0),
            produced: 0,
        }
    }

    /// The header of the frame being decoded, or of the last one if the decoder sits between frames.
    pub fn descriptor(&self) -> Option<&FrameDescriptor> {
        self.descriptor.as_ref()
    }

    /// Feed the next piece of input.
    #[throws]
    pub fn update(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut output = Vec::new();
        for event in self.parser.push(chunk)? {
            match event {
                FrameEvent::Header(descriptor) => {
                    self.window.reset(self.dictionary);
                    self.content_hasher = XxHash32::with_seed(0);
                    self.produced = 0;
                    self.descriptor = Some(descriptor);
                }
                FrameEvent::Block { data, compressed, checksum } => {
                    self.decode_block(&data, compressed, checksum, &mut output)?;
                }
                FrameEvent::ContentChecksum(stored) => {
                    if self.verify_checksum && self.content_hasher.digest() != stored {
                        throw!(Error::ContentChecksumFail);
                    }
                }
                FrameEvent::End => {
                    let expected = self.descriptor.as_ref().and_then(|d| d.content_size);
                    if let Some(expected) = expected {
                        if expected != self.produced {
                            throw!(Error::ContentSizeMismatch { expected, actual: self.produced });
                        }
                    }
                }
            }
        }
        output
    }

    /// Signal the end of input. Fails if it ended inside a frame.
    #[throws]
    pub fn finish(&self) {
        self.parser.finish()?;
    }

    #[throws]
    fn decode_block(&mut self, data: &[u8], compressed: bool, checksum: Option<u32>, output: &mut Vec<u8>) {
        let (block_maxsize, independent, content_checksum) = match &self.descriptor {
            Some(d) => (d.block_maxsize, d.independent_blocks(), d.content_checksum()),
            // the parser only reports blocks after a header
            None => throw!(Error::TruncatedInput),
        };

        if let (true, Some(stored)) = (self.verify_checksum, checksum) {
            if xxh32(data, 0) != stored {
                throw!(Error::BlockChecksumFail);
            }
        }

        let produced = if compressed {
            self.workspace.resize(block_maxsize, 0);
            let history = if independent { self.dictionary } else { self.window.as_slice() };
            let written = raw::decompress_block(data, &mut self.workspace, 0, history).map_err(block_overflow)?;
            &self.workspace[..written]
        } else {
            data
        };
        trace!(len = produced.len(), compressed, "decoded block");

        if content_checksum {
            self.content_hasher.update(produced);
        }
        if !independent {
            self.window.push(produced);
        }
        self.produced += produced.len() as u64;
        output.extend_from_slice(produced);
    }
}
