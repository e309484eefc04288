//! # fbx-io
//!
//! A reader and writer for FBX scene files, covering both on-disk
//! encodings: the compact binary format (with its footer code, offset
//! backpatching and compressed arrays) and the human-readable ASCII format.
//! Both codecs share one generic node-tree model.
pub mod fbx;

// Re-export the main types for convenience
pub use fbx::{
    error::{FbxError, Result},
    node::{FbxDocument, FbxNode, FbxVersion, Property},
    read_ascii, read_binary, write_ascii, write_binary, AsciiReader, AsciiWriter, BinaryReader,
    BinaryWriter, IdGenerator,
};
