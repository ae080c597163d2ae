use std::cmp;
use std::io::{self, BufRead, ErrorKind, Read, Write};

use fehler::{throw, throws};

use super::compress::CompressionSettings;
use super::decoder::FrameDecoder;
use super::decompress::DecompressionSettings;
use super::encoder::FrameEncoder;

type IoError = io::Error;

/// [`Write`] adapter that compresses everything written to it into one frame.
///
/// Call [`finish`](FrameWriter::finish) at the end; dropping the writer without it leaves the frame unterminated.
#[derive(Debug)]
pub struct FrameWriter<'a, W: Write> {
    inner: W,
    encoder: FrameEncoder<'a>,
}

impl<'a, W: Write> FrameWriter<'a, W> {
    pub fn new(inner: W, settings: &CompressionSettings<'a>) -> Self {
        FrameWriter { inner, encoder: FrameEncoder::new(settings) }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Close the frame and hand back the underlying writer.
    #[throws(IoError)]
    pub fn finish(mut self) -> W {
        let tail = self.encoder.finish()?;
        self.inner.write_all(&tail)?;
        self.inner.flush()?;
        self.inner
    }
}

impl<'a, W: Write> Write for FrameWriter<'a, W> {
    #[throws(IoError)]
    fn write(&mut self, buf: &[u8]) -> usize {
        let compressed = self.encoder.add(buf)?;
        self.inner.write_all(&compressed)?;
        buf.len()
    }

    #[throws(IoError)]
    fn flush(&mut self) {
        self.inner.flush()?;
    }
}

/// [`Read`] adapter that decompresses the frames read from an underlying reader.
///
/// Reading ends (returns 0) when the underlying reader is exhausted at a frame boundary;
/// running dry inside a frame is an [`ErrorKind::UnexpectedEof`] error.
#[derive(Debug)]
pub struct FrameReader<'a, R: Read> {
    inner: R,
    decoder: FrameDecoder<'a>,
    read_buf: Vec<u8>,
    buffer: Vec<u8>,
    bytes_taken: usize,
    eof: bool,
}

impl<'a, R: Read> FrameReader<'a, R> {
    pub fn new(inner: R, settings: &DecompressionSettings<'a>) -> Self {
        FrameReader {
            inner,
            decoder: FrameDecoder::new(settings),
            read_buf: vec![0; 64 * 1024],
            buffer: Vec::new(),
            bytes_taken: 0,
            eof: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<'a, R: Read> Read for FrameReader<'a, R> {
    #[throws(IoError)]
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mybuf = self.fill_buf()?;
        let bytes_to_take = cmp::min(mybuf.len(), buf.len());
        buf[..bytes_to_take].copy_from_slice(&mybuf[..bytes_to_take]);
        self.consume(bytes_to_take);
        bytes_to_take
    }
}

impl<'a, R: Read> BufRead for FrameReader<'a, R> {
    #[throws(IoError)]
    fn fill_buf(&mut self) -> &[u8] {
        // a single read may complete no block at all, keep going until one does or the input ends
        while self.bytes_taken == self.buffer.len() && !self.eof {
            let n = match self.inner.read(&mut self.read_buf) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => throw!(e),
            };
            if n == 0 {
                self.eof = true;
                if self.decoder.finish().is_err() {
                    throw!(io::Error::new(ErrorKind::UnexpectedEof, "input ended inside an LZ4 frame"));
                }
            } else {
                self.buffer = self.decoder.update(&self.read_buf[..n])?;
                self.bytes_taken = 0;
            }
        }
        &self.buffer[self.bytes_taken..]
    }

    fn consume(&mut self, amt: usize) {
        self.bytes_taken += amt;
        assert!(self.bytes_taken <= self.buffer.len(), "You consumed more bytes than I even gave you!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 31) % 199) as u8 ^ (i >> 9) as u8).collect()
    }

    #[test]
    fn writer_then_reader() {
        let data = sample(250_000);
        let mut settings = CompressionSettings::default();
        settings.block_size(64 * 1024).content_checksum(true);
        let mut writer = FrameWriter::new(Vec::new(), &settings);
        for chunk in data.chunks(1234) {
            writer.write_all(chunk).unwrap();
        }
        let frame = writer.finish().unwrap();

        let mut decompression = DecompressionSettings::default();
        decompression.verify_checksum(true);
        let mut reader = FrameReader::new(&frame[..], &decompression);
        let mut output = Vec::new();
        reader.read_to_end(&mut output).unwrap();
        assert_eq!(output, data);
    }

    #[test]
    fn truncated_stream_is_eof_error() {
        let frame = CompressionSettings::default().compress_to_vec(&sample(10_000)).unwrap();
        let mut reader = FrameReader::new(&frame[..frame.len() - 2], &DecompressionSettings::default());
        let mut output = Vec::new();
        let err = reader.read_to_end(&mut output).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn lines_through_bufread() {
        let text = "first line\nsecond line\nthird line\n".repeat(50);
        let frame = CompressionSettings::default().compress_to_vec(text.as_bytes()).unwrap();
        let reader = FrameReader::new(&frame[..], &DecompressionSettings::default());
        let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 150);
        assert_eq!(lines[1], "second line");
    }
}
