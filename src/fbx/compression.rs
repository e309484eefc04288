//! Deflate compression layered with a rolling Adler-32 checksum.
//!
//! Compressed array bodies carry a checksum of the *uncompressed* element
//! bytes, so both wrappers track the plain-text side of the stream: the
//! writer hashes bytes before they enter the encoder, the reader hashes
//! bytes as they come out of the decoder.

use std::io::{Read, Write};

use adler32::RollingAdler32;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use log::trace;

/// A `Write` adapter that deflates everything written to it while keeping a
/// rolling checksum of the uncompressed bytes.
///
/// The inner encoder buffers trailing bytes until closed, so the checksum
/// and the inner stream position are only meaningful after [`finish`]
/// (`ChecksumWriter::finish`) has run.
pub struct ChecksumWriter<W: Write> {
    encoder: DeflateEncoder<W>,
    checksum: RollingAdler32,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(inner: W) -> Self {
        ChecksumWriter {
            encoder: DeflateEncoder::new(inner, Compression::default()),
            checksum: RollingAdler32::new(),
        }
    }

    /// Flush and close the encoder, returning the inner stream and the
    /// checksum of all uncompressed bytes written.
    pub fn finish(self) -> std::io::Result<(W, u32)> {
        let hash = self.checksum.hash();
        let inner = self.encoder.finish()?;
        trace!("Deflate stream closed, payload checksum {:#010x}", hash);
        Ok((inner, hash))
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.encoder.write(buf)?;
        self.checksum.update_buffer(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.encoder.flush()
    }
}

/// A `Read` adapter that inflates a deflate stream while keeping a rolling
/// checksum of the decompressed bytes it hands out.
pub struct ChecksumReader<R: Read> {
    decoder: DeflateDecoder<R>,
    checksum: RollingAdler32,
}

impl<R: Read> ChecksumReader<R> {
    pub fn new(inner: R) -> Self {
        ChecksumReader {
            decoder: DeflateDecoder::new(inner),
            checksum: RollingAdler32::new(),
        }
    }

    /// The checksum of all decompressed bytes read so far.
    pub fn checksum(&self) -> u32 {
        self.checksum.hash()
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.checksum.update_buffer(&buf[..n]);
        Ok(n)
    }
}
