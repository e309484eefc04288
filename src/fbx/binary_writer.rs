//! Binary FBX serialization.

use std::io::{Cursor, Seek, SeekFrom, Write};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use log::{debug, info, trace};

use super::binary::{
    self, document_footer_code, EXTENSION, FOOTER_ZEROES_1, FOOTER_ZEROES_2, NULL_RECORD_SIZE,
};
use super::compression::ChecksumWriter;
use super::error::{FbxError, Result};
use super::node::{FbxDocument, FbxNode, Property};

/// Writes an FBX document to a binary stream.
///
/// The whole file is serialized into an in-memory buffer first, because the
/// format backpatches end offsets and block lengths after the fact; a single
/// bulk flush to the output follows completion.
pub struct BinaryWriter<W: Write> {
    output: W,
    buf: Cursor<Vec<u8>>,
    /// The minimum raw size of an array in bytes before it is compressed.
    pub compression_threshold: usize,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(output: W) -> Self {
        BinaryWriter {
            output,
            buf: Cursor::new(Vec::new()),
            compression_threshold: 1024,
        }
    }

    /// Consume the writer and return the output stream.
    pub fn into_inner(self) -> W {
        self.output
    }

    /// Serialize a document and flush it to the output in one pass.
    pub fn write(&mut self, document: &FbxDocument) -> Result<()> {
        info!(
            "Writing binary FBX document: version {}, {} top-level nodes",
            document.version.as_u32(),
            document.nodes.len()
        );
        self.buf.set_position(0);
        self.buf.write_all(binary::HEADER_MAGIC)?;
        self.buf.write_u32::<LittleEndian>(document.version.as_u32())?;
        for node in &document.nodes {
            self.write_node(Some(node))?;
        }
        self.write_node(None)?;
        let code = document_footer_code(document)?;
        self.buf.write_all(&code)?;
        self.write_footer(document.version.as_u32())?;

        let len = self.buf.position() as usize;
        self.output.write_all(&self.buf.get_ref()[..len])?;
        self.output.flush()?;
        debug!("Flushed {} bytes", len);
        Ok(())
    }

    fn write_footer(&mut self, version: u32) -> Result<()> {
        self.buf.write_all(&[0u8; FOOTER_ZEROES_1])?;
        self.buf.write_u32::<LittleEndian>(version)?;
        self.buf.write_all(&[0u8; FOOTER_ZEROES_2])?;
        self.buf.write_all(&EXTENSION)?;
        Ok(())
    }

    fn write_node(&mut self, node: Option<&FbxNode>) -> Result<()> {
        let node = match node {
            Some(node) => node,
            None => {
                // Sibling list terminator and "opened-then-closed" marker.
                self.buf.write_all(&[0u8; NULL_RECORD_SIZE])?;
                return Ok(());
            }
        };

        let name = node.name.as_bytes();
        if name.len() > u8::MAX as usize {
            return Err(FbxError::limit(
                self.buf.position(),
                format!("Node name '{}' is too long", node.name),
            ));
        }

        let end_offset_pos = self.buf.position();
        self.buf.write_u32::<LittleEndian>(0)?; // end offset placeholder
        self.buf.write_u32::<LittleEndian>(node.properties.len() as u32)?;
        let property_len_pos = self.buf.position();
        self.buf.write_u32::<LittleEndian>(0)?; // property block length placeholder
        self.buf.write_u8(name.len() as u8)?;
        self.buf.write_all(name)?;

        let property_begin = self.buf.position();
        for property in &node.properties {
            self.write_property(property)?;
        }
        let property_end = self.buf.position();
        self.backpatch(property_len_pos, (property_end - property_begin) as u32)?;

        if !node.children.is_empty() {
            for child in &node.children {
                if let Some(child) = child {
                    self.write_node(Some(child))?;
                }
            }
            self.write_node(None)?;
        }

        let end = self.buf.position();
        self.backpatch(end_offset_pos, end as u32)?;
        Ok(())
    }

    // Rewrites a 4-byte placeholder once the true value is known.
    fn backpatch(&mut self, pos: u64, value: u32) -> Result<()> {
        let end = self.buf.position();
        self.buf.seek(SeekFrom::Start(pos))?;
        self.buf.write_u32::<LittleEndian>(value)?;
        self.buf.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    fn write_property(&mut self, property: &Property) -> Result<()> {
        match property {
            Property::Byte(_) => {
                // ASCII narrowing artifact; the binary registry has no tag for it.
                return Err(FbxError::UnsupportedType {
                    type_name: property.type_name(),
                    context: "binary property",
                });
            }
            Property::Short(v) => {
                self.buf.write_u8(b'Y')?;
                self.buf.write_i16::<LittleEndian>(*v)?;
            }
            Property::Int(v) => {
                self.buf.write_u8(b'I')?;
                self.buf.write_i32::<LittleEndian>(*v)?;
            }
            Property::Long(v) => {
                self.buf.write_u8(b'L')?;
                self.buf.write_i64::<LittleEndian>(*v)?;
            }
            Property::Float(v) => {
                self.buf.write_u8(b'F')?;
                self.buf.write_f32::<LittleEndian>(*v)?;
            }
            Property::Double(v) => {
                self.buf.write_u8(b'D')?;
                self.buf.write_f64::<LittleEndian>(*v)?;
            }
            Property::Bool(v) => {
                self.buf.write_u8(b'C')?;
                self.buf.write_u8(*v as u8)?;
            }
            Property::Bytes(bytes) => {
                self.buf.write_u8(b'R')?;
                self.buf.write_u32::<LittleEndian>(bytes.len() as u32)?;
                self.buf.write_all(bytes)?;
            }
            Property::String(s) => {
                self.buf.write_u8(b'S')?;
                let encoded = mangle_separators(s);
                self.buf.write_u32::<LittleEndian>(encoded.len() as u32)?;
                self.buf.write_all(encoded.as_bytes())?;
            }
            Property::IntArray(v) => {
                self.buf.write_u8(b'i')?;
                self.write_array(v.len(), 4, |raw| {
                    for e in v {
                        raw.extend_from_slice(&e.to_le_bytes());
                    }
                })?;
            }
            Property::LongArray(v) => {
                self.buf.write_u8(b'l')?;
                self.write_array(v.len(), 8, |raw| {
                    for e in v {
                        raw.extend_from_slice(&e.to_le_bytes());
                    }
                })?;
            }
            Property::FloatArray(v) => {
                self.buf.write_u8(b'f')?;
                self.write_array(v.len(), 4, |raw| {
                    for e in v {
                        raw.extend_from_slice(&e.to_le_bytes());
                    }
                })?;
            }
            Property::DoubleArray(v) => {
                self.buf.write_u8(b'd')?;
                self.write_array(v.len(), 8, |raw| {
                    for e in v {
                        raw.extend_from_slice(&e.to_le_bytes());
                    }
                })?;
            }
            Property::BoolArray(v) => {
                self.buf.write_u8(b'b')?;
                self.write_array(v.len(), 1, |raw| {
                    for e in v {
                        raw.push(*e as u8);
                    }
                })?;
            }
        }
        Ok(())
    }

    /// Write one array body: element count, compress flag, byte-span field,
    /// then either the raw element bytes or a deflate block with a trailing
    /// checksum of the uncompressed bytes. The byte-span field is
    /// backpatched once the compressed span is known; on the uncompressed
    /// path it stays zero and readers ignore it.
    fn write_array<F>(&mut self, count: usize, elem_size: usize, encode: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<u8>),
    {
        let mut raw = Vec::with_capacity(count * elem_size);
        encode(&mut raw);

        let compress = raw.len() >= self.compression_threshold;
        self.buf.write_u32::<LittleEndian>(count as u32)?;
        self.buf.write_u32::<LittleEndian>(compress as u32)?;
        let span_pos = self.buf.position();
        self.buf.write_u32::<LittleEndian>(0)?;
        let data_start = self.buf.position();

        if compress {
            trace!(
                "Compressing array: {} elements, {} raw bytes",
                count,
                raw.len()
            );
            // Compressor settings header, matching the original encoder.
            self.buf.write_all(&[0x58, 0x85])?;
            let mut codec = ChecksumWriter::new(&mut self.buf);
            codec.write_all(&raw)?;
            // The encoder buffers trailing bytes until closed; finish before
            // reading the checksum or the stream position.
            let (_, checksum) = codec.finish()?;
            self.buf.write_u32::<BigEndian>(checksum)?;
            let data_end = self.buf.position();
            self.backpatch(span_pos, (data_end - data_start) as u32)?;
        } else {
            self.buf.write_all(&raw)?;
        }
        Ok(())
    }
}

/// Re-encode any `::` separator as the binary control-byte pair, with the
/// path segments reversed. Required for hierarchical reference
/// compatibility; the reader applies the inverse transform.
pub(super) fn mangle_separators(s: &str) -> String {
    if !s.contains("::") {
        return s.to_string();
    }
    let segments: Vec<&str> = s.split("::").collect();
    let mut out = String::with_capacity(s.len());
    for (i, segment) in segments.iter().rev().enumerate() {
        if i > 0 {
            out.push('\x00');
            out.push('\x01');
        }
        out.push_str(segment);
    }
    out
}

/// Inverse of [`mangle_separators`], applied when reading.
pub(super) fn unmangle_separators(s: &str) -> String {
    if !s.contains("\x00\x01") {
        return s.to_string();
    }
    let segments: Vec<&str> = s.split("\x00\x01").collect();
    let mut out = String::with_capacity(s.len());
    for (i, segment) in segments.iter().rev().enumerate() {
        if i > 0 {
            out.push_str("::");
        }
        out.push_str(segment);
    }
    out
}
