use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};
use std::cmp;
use tracing::{debug, trace};

use super::header::{descriptor_len, FrameDescriptor};
use super::{is_skippable, DecompressionError, INCOMPRESSIBLE, MAGIC};

type Error = DecompressionError;

/// Structural pieces of a frame stream, in the order they occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame header was parsed (and its checksum verified).
    Header(FrameDescriptor),
    /// One block, exactly as stored. `checksum` is the stored block checksum, if the frame has them.
    Block { data: Vec<u8>, compressed: bool, checksum: Option<u32> },
    /// The stored content checksum. Always followed by `End`.
    ContentChecksum(u32),
    /// The frame is complete; another frame (or nothing) may follow.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Magic,
    Header,
    BlockSize,
    BlockBody { len: usize, compressed: bool },
    ContentChecksum,
    SkippableSize,
    Skip { remaining: u64 },
}

/// What the parser needs to remember about the current frame's header.
#[derive(Debug, Clone, Copy, Default)]
struct Layout {
    block_maxsize: usize,
    block_checksums: bool,
    content_checksum: bool,
}

/// Incremental frame parser.
///
/// Feed it bytes in whatever pieces they arrive in; it hands back every structural event those bytes
/// complete and keeps incomplete trailing bytes until the next [`push`](FrameParser::push).
/// Concatenated frames are parsed one after another and skippable frames are skipped silently.
///
/// After an error the stream cannot be resumed; drop the parser.
#[derive(Debug)]
pub struct FrameParser {
    state: State,
    backlog: Vec<u8>,
    layout: Layout,
}

impl Default for FrameParser {
    fn default() -> Self {
        FrameParser { state: State::Magic, backlog: Vec::new(), layout: Layout::default() }
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True between frames, with nothing buffered.
    pub fn is_idle(&self) -> bool {
        self.state == State::Magic && self.backlog.is_empty()
    }

    /// Number of bytes received but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.backlog.len()
    }

    /// Signal the end of the input: fails if it stopped in the middle of a frame.
    #[throws]
    pub fn finish(&self) {
        if !self.is_idle() {
            throw!(Error::TruncatedInput);
        }
    }

    #[throws]
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        self.backlog.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut cursor = 0;
        let result = self.run(&mut cursor, &mut events);
        self.backlog.drain(..cursor);
        result?;
        events
    }

    #[throws]
    fn run(&mut self, cursor: &mut usize, events: &mut Vec<FrameEvent>) {
        loop {
            let available = &self.backlog[*cursor..];
            match self.state {
                State::Magic => {
                    if available.len() < 4 {
                        break;
                    }
                    let magic = LE::read_u32(available);
                    *cursor += 4;
                    self.state = if magic == MAGIC {
                        State::Header
                    } else if is_skippable(magic) {
                        State::SkippableSize
                    } else {
                        throw!(Error::InvalidMagicNumber(magic));
                    };
                }
                State::Header => {
                    let flg = match available.first() {
                        Some(&flg) => flg,
                        None => break,
                    };
                    let len = descriptor_len(flg) + 1;
                    if available.len() < len {
                        break;
                    }
                    let descriptor = FrameDescriptor::parse(&available[..len])?;
                    *cursor += len;
                    debug!(block_maxsize = descriptor.block_maxsize, flags = ?descriptor.flags, "frame header");

                    self.layout = Layout {
                        block_maxsize: descriptor.block_maxsize,
                        block_checksums: descriptor.block_checksums(),
                        content_checksum: descriptor.content_checksum(),
                    };
                    events.push(FrameEvent::Header(descriptor));
                    self.state = State::BlockSize;
                }
                State::BlockSize => {
                    if available.len() < 4 {
                        break;
                    }
                    let block_length = LE::read_u32(available);
                    *cursor += 4;
                    if block_length == 0 {
                        if self.layout.content_checksum {
                            self.state = State::ContentChecksum;
                        } else {
                            events.push(FrameEvent::End);
                            self.state = State::Magic;
                        }
                        continue;
                    }

                    let compressed = block_length & INCOMPRESSIBLE == 0;
                    let len = (block_length & !INCOMPRESSIBLE) as usize;
                    if len > self.layout.block_maxsize {
                        throw!(Error::BlockSizeOverflow);
                    }
                    self.state = State::BlockBody { len, compressed };
                }
                State::BlockBody { len, compressed } => {
                    let needed = if self.layout.block_checksums { len + 4 } else { len };
                    if available.len() < needed {
                        break;
                    }
                    let checksum = if self.layout.block_checksums {
                        Some(LE::read_u32(&available[len..]))
                    } else {
                        None
                    };
                    trace!(len, compressed, "parsed block");
                    events.push(FrameEvent::Block { data: available[..len].to_vec(), compressed, checksum });
                    *cursor += needed;
                    self.state = State::BlockSize;
                }
                State::ContentChecksum => {
                    if available.len() < 4 {
                        break;
                    }
                    events.push(FrameEvent::ContentChecksum(LE::read_u32(available)));
                    events.push(FrameEvent::End);
                    *cursor += 4;
                    self.state = State::Magic;
                }
                State::SkippableSize => {
                    if available.len() < 4 {
                        break;
                    }
                    let remaining = u64::from(LE::read_u32(available));
                    *cursor += 4;
                    debug!(remaining, "skipping skippable frame");
                    self.state = State::Skip { remaining };
                }
                State::Skip { remaining } => {
                    let n = cmp::min(remaining, available.len() as u64);
                    *cursor += n as usize;
                    let remaining = remaining - n;
                    if remaining == 0 {
                        self.state = State::Magic;
                    } else {
                        self.state = State::Skip { remaining };
                        break;
                    }
                }
            }
        }
    }
}
