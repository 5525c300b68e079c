use thiserror::Error;

use crate::CodecError;

/// Result type alias using [`ForkMapError`].
pub type Result<T> = std::result::Result<T, ForkMapError>;

/// Errors raised while building, opening or querying a forkmap file.
#[derive(Debug, Error)]
pub enum ForkMapError {
    /// The encoder failed to produce a key or payload for an entry.
    ///
    /// `index` is the zero-based position of the entry in the input stream.
    #[error("failed to encode entry {index}: {source}")]
    Encoding {
        index: u64,
        #[source]
        source: CodecError,
    },

    /// The file is truncated, padded, or its offset tables are inconsistent.
    #[error("malformed forkmap file: {0}")]
    Format(String),

    /// A stored payload failed to decompress or decode.
    #[error("failed to decode value for key {key:?}: {source}")]
    Decode {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForkMapError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        ForkMapError::Format(message.into())
    }

    /// Returns `true` for errors caused by a malformed file.
    pub fn is_format(&self) -> bool {
        matches!(self, ForkMapError::Format(_))
    }
}
