//! Named Binary Tag codec.
//!
//! Reads and writes the tag trees stored in `level.dat` and region file
//! chunk slots, with optional gzip/zlib envelopes.

pub mod error;
pub mod file;
pub mod io;
pub mod tag;

pub use error::{NbtError, Result};
pub use file::{Compression, NbtFile, compress, decompress};
pub use tag::{Compound, List, Tag, TagType};
