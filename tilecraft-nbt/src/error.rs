use std::io;

use thiserror::Error;

use crate::tag::TagType;

pub type Result<T> = std::result::Result<T, NbtError>;

/// Errors produced while reading or writing tag trees.
#[derive(Debug, Error)]
pub enum NbtError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The stream is structurally broken: unknown discriminant, truncated
    /// payload, bad length prefix or invalid UTF-8.
    #[error("malformed tag: {0}")]
    MalformedTag(String),

    #[error("root tag is {0:?}, expected a compound")]
    NotACompound(TagType),

    #[error("list holds {expected:?} elements, cannot insert {found:?}")]
    ListTypeMismatch { expected: TagType, found: TagType },

    #[error("unable to decompress {method} data: {source}")]
    Decompress {
        method: &'static str,
        #[source]
        source: io::Error,
    },
}

impl NbtError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        NbtError::MalformedTag(message.into())
    }

    /// Running out of bytes mid-tag is a structural problem, not an I/O one.
    pub(crate) fn truncated(err: io::Error, what: &str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            NbtError::MalformedTag(format!("{what} reads past end of stream"))
        } else {
            NbtError::Io(err)
        }
    }
}
