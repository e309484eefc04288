//! Custom error types for the fbx-io crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum FbxError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The data is structurally invalid or does not conform to the FBX format.
    /// Carries the byte offset at which the problem was detected.
    #[error("Invalid format at offset {offset}: {message}")]
    Format { offset: u64, message: String },

    /// A declared length exceeds the configured cap (node name or array length).
    #[error("Limit exceeded at offset {offset}: {message}")]
    LimitExceeded { offset: u64, message: String },

    /// A checksum validation failed, indicating data corruption.
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// An invalid or out-of-range argument at a public entry point.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A property value has no codec registered for its kind.
    #[error("Unsupported property type {type_name} in {context}")]
    UnsupportedType {
        type_name: &'static str,
        context: &'static str,
    },

    /// The file declares a format version this crate does not know.
    #[error("Unsupported FBX version: {0}")]
    UnsupportedVersion(u32),
}

impl FbxError {
    pub(crate) fn format(offset: u64, message: impl Into<String>) -> Self {
        FbxError::Format {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn limit(offset: u64, message: impl Into<String>) -> Self {
        FbxError::LimitExceeded {
            offset,
            message: message.into(),
        }
    }
}

/// A convenience `Result` type alias using the crate's `FbxError` type.
pub type Result<T> = std::result::Result<T, FbxError>;
