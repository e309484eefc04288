//! Core FBX codec module

pub mod error;
pub mod node;
mod ascii_reader;
mod ascii_writer;
mod binary;
mod binary_reader;
mod binary_writer;
mod compression;
mod id;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use log::info;

pub use ascii_reader::AsciiReader;
pub use ascii_writer::AsciiWriter;
pub use binary::{footer_code, Timestamp};
pub use binary_reader::BinaryReader;
pub use binary_writer::BinaryWriter;
pub use compression::{ChecksumReader, ChecksumWriter};
pub use error::{FbxError, Result};
pub use id::IdGenerator;
pub use node::{FbxDocument, FbxNode, FbxVersion, Property};

/// Read a binary FBX file from the given path.
pub fn read_binary(path: impl AsRef<Path>) -> Result<FbxDocument> {
    let path = path.as_ref();
    info!("Opening binary FBX file: {}", path.display());
    let file = File::open(path)?;
    let mut reader = BinaryReader::new(BufReader::new(file));
    reader.read()
}

/// Read an ASCII FBX file from the given path.
pub fn read_ascii(path: impl AsRef<Path>) -> Result<FbxDocument> {
    let path = path.as_ref();
    info!("Opening ASCII FBX file: {}", path.display());
    let file = File::open(path)?;
    let mut reader = AsciiReader::new(BufReader::new(file));
    reader.read()
}

/// Write a document to the given path in the binary format.
pub fn write_binary(document: &FbxDocument, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    info!("Writing binary FBX file: {}", path.display());
    let file = File::create(path)?;
    let mut writer = BinaryWriter::new(BufWriter::new(file));
    writer.write(document)
}

/// Write a document to the given path in the ASCII format.
pub fn write_ascii(document: &FbxDocument, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    info!("Writing ASCII FBX file: {}", path.display());
    let file = File::create(path)?;
    let mut writer = AsciiWriter::new(BufWriter::new(file));
    writer.write(document)
}

/// Whether the file at the given path starts with the binary FBX magic.
pub fn is_binary(path: impl AsRef<Path>) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; binary::HEADER_MAGIC.len()];
    let mut read = 0;
    while read < magic.len() {
        let n = file.read(&mut magic[read..])?;
        if n == 0 {
            return Ok(false);
        }
        read += n;
    }
    Ok(magic == *binary::HEADER_MAGIC)
}
