//! Binary FBX parsing.

use std::io::Read;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{debug, info, trace};

use super::binary::{EXTENSION, FOOTER_CODE_SIZE, FOOTER_ZEROES_1, FOOTER_ZEROES_2, HEADER_MAGIC};
use super::binary_writer::unmangle_separators;
use super::compression::ChecksumReader;
use super::error::{FbxError, Result};
use super::node::{FbxDocument, FbxNode, FbxVersion, Property};

/// Reads an FBX document from a binary stream.
///
/// Consumption is forward-only; the reader tracks its own byte position so
/// that end offsets can be verified and errors can report where they were
/// detected.
pub struct BinaryReader<R: Read> {
    stream: R,
    position: u64,
    /// The maximum array element count or blob payload size that will be
    /// allocated.
    ///
    /// Malformed or hostile input could otherwise cause large amounts of
    /// memory to be allocated. Expand as necessary for trusted sources.
    pub max_array_length: usize,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(stream: R) -> Self {
        BinaryReader {
            stream,
            position: 0,
            max_array_length: 1 << 24,
        }
    }

    /// Read a full document: header, node tree and footer.
    pub fn read(&mut self) -> Result<FbxDocument> {
        let mut magic = [0u8; HEADER_MAGIC.len()];
        self.fill(&mut magic)?;
        if magic != *HEADER_MAGIC {
            return Err(FbxError::format(0, "Invalid header magic"));
        }
        let raw_version = self.read_u32()?;
        let version = FbxVersion::try_from(raw_version)?;
        info!("Reading binary FBX document: version {}", raw_version);

        let mut nodes = Vec::new();
        while let Some(node) = self.read_node()? {
            nodes.push(node);
        }
        debug!("Read {} top-level nodes", nodes.len());

        // The footer code is keyed by the original creation time and cannot
        // be re-derived here; only its presence is required.
        let mut code = [0u8; FOOTER_CODE_SIZE];
        self.fill(&mut code)?;
        self.check_footer(raw_version)?;

        Ok(FbxDocument { version, nodes })
    }

    // Validates the structural padding, the repeated version field and the
    // trailing constant.
    fn check_footer(&mut self, version: u32) -> Result<()> {
        let mut pad = [0u8; FOOTER_ZEROES_2];
        self.fill(&mut pad[..FOOTER_ZEROES_1])?;
        if pad[..FOOTER_ZEROES_1].iter().any(|&b| b != 0) {
            return Err(FbxError::format(self.position, "Invalid footer padding"));
        }
        let footer_version = self.read_u32()?;
        if footer_version != version {
            return Err(FbxError::format(
                self.position,
                format!(
                    "Footer version {} does not match header version {}",
                    footer_version, version
                ),
            ));
        }
        self.fill(&mut pad)?;
        if pad.iter().any(|&b| b != 0) {
            return Err(FbxError::format(self.position, "Invalid footer padding"));
        }
        let mut extension = [0u8; EXTENSION.len()];
        self.fill(&mut extension)?;
        if extension != EXTENSION {
            return Err(FbxError::format(
                self.position,
                "Invalid footer trailing constant",
            ));
        }
        Ok(())
    }

    /// Read one framed node, or `None` for a null record.
    fn read_node(&mut self) -> Result<Option<FbxNode>> {
        let record_start = self.position;
        let end_offset = self.read_u32()? as u64;
        let num_properties = self.read_u32()?;
        let property_list_len = self.read_u32()? as u64;
        let name_len = self.read_u8()?;

        if end_offset == 0 {
            if num_properties != 0 || property_list_len != 0 || name_len != 0 {
                return Err(FbxError::format(record_start, "Malformed null record"));
            }
            return Ok(None);
        }

        let mut name_buf = vec![0u8; name_len as usize];
        self.fill(&mut name_buf)?;
        let name = String::from_utf8_lossy(&name_buf).into_owned();
        trace!(
            "Node '{}' at offset {}: {} properties, end offset {}",
            name,
            record_start,
            num_properties,
            end_offset
        );

        let properties_start = self.position;
        let mut properties = Vec::new();
        for _ in 0..num_properties {
            properties.push(self.read_property()?);
        }
        if self.position - properties_start != property_list_len {
            return Err(FbxError::format(
                self.position,
                format!(
                    "Property block of '{}' spans {} bytes, {} recorded",
                    name,
                    self.position - properties_start,
                    property_list_len
                ),
            ));
        }

        // A position short of the end offset means a nested child list
        // follows, terminated by a null record. A node whose block closed
        // with no children still keeps one null entry.
        let mut children = Vec::new();
        if self.position < end_offset {
            while let Some(child) = self.read_node()? {
                children.push(Some(child));
            }
            if children.is_empty() {
                children.push(None);
            }
        }

        if self.position != end_offset {
            return Err(FbxError::format(
                self.position,
                format!(
                    "Node '{}' ends at {}, end offset says {}",
                    name, self.position, end_offset
                ),
            ));
        }
        Ok(Some(FbxNode {
            name,
            properties,
            children,
        }))
    }

    fn read_property(&mut self) -> Result<Property> {
        let tag_offset = self.position;
        let tag = self.read_u8()?;
        let property = match tag {
            b'Y' => Property::Short(self.read_i16()?),
            b'C' => Property::Bool(self.read_u8()? != 0),
            b'I' => Property::Int(self.read_i32()?),
            b'F' => Property::Float(f32::from_bits(self.read_u32()?)),
            b'D' => Property::Double(f64::from_bits(self.read_u64()?)),
            b'L' => Property::Long(self.read_i64()?),
            b'R' => Property::Bytes(self.read_blob()?),
            b'S' => {
                let raw = self.read_blob()?;
                let text = String::from_utf8_lossy(&raw);
                Property::String(unmangle_separators(&text))
            }
            b'i' => {
                let raw = self.read_array_bytes(4)?;
                Property::IntArray(
                    raw.chunks_exact(4)
                        .map(|c| LittleEndian::read_i32(c))
                        .collect(),
                )
            }
            b'l' => {
                let raw = self.read_array_bytes(8)?;
                Property::LongArray(
                    raw.chunks_exact(8)
                        .map(|c| LittleEndian::read_i64(c))
                        .collect(),
                )
            }
            b'f' => {
                let raw = self.read_array_bytes(4)?;
                Property::FloatArray(
                    raw.chunks_exact(4)
                        .map(|c| LittleEndian::read_f32(c))
                        .collect(),
                )
            }
            b'd' => {
                let raw = self.read_array_bytes(8)?;
                Property::DoubleArray(
                    raw.chunks_exact(8)
                        .map(|c| LittleEndian::read_f64(c))
                        .collect(),
                )
            }
            b'b' => {
                let raw = self.read_array_bytes(1)?;
                Property::BoolArray(raw.iter().map(|&b| b != 0).collect())
            }
            other => {
                return Err(FbxError::format(
                    tag_offset,
                    format!("Unknown property type tag {:?}", other as char),
                ));
            }
        };
        Ok(property)
    }

    // Length-prefixed payload for raw and string properties.
    fn read_blob(&mut self) -> Result<Vec<u8>> {
        let len_offset = self.position;
        let len = self.read_i32()?;
        if len < 0 {
            return Err(FbxError::format(
                len_offset,
                format!("Negative payload length {}", len),
            ));
        }
        let len = len as usize;
        if len > self.max_array_length {
            return Err(FbxError::limit(
                len_offset,
                format!(
                    "Payload length {} higher than permitted maximum {}",
                    len, self.max_array_length
                ),
            ));
        }
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Decode one array body to its raw (uncompressed) element bytes.
    fn read_array_bytes(&mut self, elem_size: usize) -> Result<Vec<u8>> {
        let count_offset = self.position;
        let count = self.read_i32()?;
        if count < 0 {
            return Err(FbxError::format(
                count_offset,
                format!("Negative array length {}", count),
            ));
        }
        let count = count as usize;
        if count > self.max_array_length {
            return Err(FbxError::limit(
                count_offset,
                format!(
                    "Array length {} higher than permitted maximum {}",
                    count, self.max_array_length
                ),
            ));
        }
        let encoding = self.read_u32()?;
        let compressed_len = self.read_u32()? as usize;
        let raw_size = count * elem_size;

        match encoding {
            0 => {
                let mut raw = vec![0u8; raw_size];
                self.fill(&mut raw)?;
                Ok(raw)
            }
            1 => {
                // Deflate overhead stays small even for stored blocks, so a
                // block far larger than the raw data cannot be legitimate.
                let max_block = raw_size + raw_size / 1024 + 64;
                if compressed_len > max_block {
                    return Err(FbxError::limit(
                        self.position,
                        format!(
                            "Compressed block of {} bytes for a {} byte array",
                            compressed_len, raw_size
                        ),
                    ));
                }
                if compressed_len < 7 {
                    return Err(FbxError::format(
                        self.position,
                        format!("Compressed array block of {} bytes is too short", compressed_len),
                    ));
                }
                let mut block = vec![0u8; compressed_len];
                self.fill(&mut block)?;
                // 2-byte compressor settings header, deflate body, then a
                // big-endian checksum of the uncompressed bytes.
                let body = &block[2..compressed_len - 4];
                let expected = BigEndian::read_u32(&block[compressed_len - 4..]);

                let mut decoder = ChecksumReader::new(body);
                let mut raw = Vec::with_capacity(raw_size);
                // Stop as soon as the output exceeds the declared size; a
                // crafted stream could otherwise expand without bound.
                (&mut decoder)
                    .take(raw_size as u64 + 1)
                    .read_to_end(&mut raw)
                    .map_err(|e| {
                        FbxError::format(self.position, format!("Decompression failed: {}", e))
                    })?;
                if raw.len() > raw_size {
                    return Err(FbxError::format(
                        self.position,
                        format!(
                            "Array decompressed past its declared size of {} bytes",
                            raw_size
                        ),
                    ));
                }
                if raw.len() != raw_size {
                    return Err(FbxError::format(
                        self.position,
                        format!(
                            "Array decompressed to {} bytes, expected {}",
                            raw.len(),
                            raw_size
                        ),
                    ));
                }
                let actual = decoder.checksum();
                if actual != expected {
                    return Err(FbxError::ChecksumMismatch { expected, actual });
                }
                Ok(raw)
            }
            other => Err(FbxError::format(
                self.position,
                format!("Unknown array encoding {}", other),
            )),
        }
    }

    // --- Offset-tracked primitive reads ---

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.stream.read_exact(buf) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(FbxError::format(
                self.position,
                "Unexpected end of stream",
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    fn read_i16(&mut self) -> Result<i16> {
        let mut b = [0u8; 2];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_i16(&b))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_u32(&b))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_i32(&b))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_u64(&b))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_i64(&b))
    }
}
