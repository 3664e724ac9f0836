use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid region filename {0:?}")]
    InvalidFilename(String),

    #[error("region header is only {0} bytes, expected 8192")]
    HeaderTooShort(u64),

    #[error("chunk {index} points to offset {offset} past end of file ({file_size} bytes)")]
    InvalidChunkOffset {
        index: usize,
        offset: u64,
        file_size: u64,
    },

    #[error("chunk {index} has invalid size {size}")]
    InvalidChunkSize { index: usize, size: u32 },
}
