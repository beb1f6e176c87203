//! Cache error types.

use crate::entry::EntryId;
use thiserror::Error;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors raised by the cache and its dump formats.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No entry was ever created with this id.
    #[error("no cache entry with id {0}")]
    NotFound(EntryId),

    /// The dump file was written by an unsupported format version.
    #[error("unsupported cache dump version {found}")]
    UnsupportedVersion {
        /// Version byte found in the file.
        found: u8,
    },

    /// Structurally invalid dump contents.
    #[error("malformed cache dump at offset {offset}: {message}")]
    Deserialization {
        /// Byte offset of the offending field.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// Wire-level decoding failure inside a dump.
    #[error("protocol error: {0}")]
    Proto(#[from] iterdns_proto::Error),

    /// I/O failure while reading or writing a dump.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub(crate) fn deserialization(offset: usize, message: impl Into<String>) -> Self {
        Self::Deserialization {
            offset,
            message: message.into(),
        }
    }
}
