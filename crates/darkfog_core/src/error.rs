use std::io;
use std::str::Utf8Error;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Io,
    FormatMismatch,
    Truncated,
    RegionNotFound,
    BoundaryCountMismatch,
    StructuralAssumption,
    InvalidInput,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Bad magic or a buffer too short to hold the fixed header prefix.
    #[error("not a save container: {0}")]
    FormatMismatch(String),

    #[error("read of {width} bytes at offset {offset} runs past end of buffer (len {len})")]
    Truncated {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// Neither the anchored search nor the empty-region heuristic matched.
    #[error("hive region not found: {0}")]
    RegionNotFound(String),

    #[error("star boundary count mismatch: declared {expected} stars, decoded {actual}")]
    BoundaryCountMismatch { expected: usize, actual: usize },

    #[error("structural assumption violated at offset {offset}: {message}")]
    StructuralAssumption { offset: usize, message: String },

    #[error("invalid utf-8 string at offset {offset}: {source}")]
    InvalidUtf8 {
        offset: usize,
        #[source]
        source: Utf8Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SaveError {
    pub fn structural(offset: usize, message: impl Into<String>) -> Self {
        Self::StructuralAssumption {
            offset,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::Io,
            Self::FormatMismatch(_) | Self::InvalidUtf8 { .. } => ErrorCode::FormatMismatch,
            Self::Truncated { .. } => ErrorCode::Truncated,
            Self::RegionNotFound(_) => ErrorCode::RegionNotFound,
            Self::BoundaryCountMismatch { .. } => ErrorCode::BoundaryCountMismatch,
            Self::StructuralAssumption { .. } => ErrorCode::StructuralAssumption,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, SaveError>;
