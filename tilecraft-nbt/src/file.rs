use std::fs;
use std::io::{Cursor, Read, Write};
use std::ops::{Deref, DerefMut};
use std::path::Path;

use flate2::Compression as Level;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

use crate::error::{NbtError, Result};
use crate::io::{read_compound, write_compound};
use crate::tag::{Compound, TagType};

/// Stream envelope around a serialized root compound. The discriminants are
/// the method bytes used by region files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    #[default]
    Gzip = 1,
    Zlib = 2,
}

impl Compression {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Compression::None),
            1 => Some(Compression::Gzip),
            2 => Some(Compression::Zlib),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    fn name(self) -> &'static str {
        match self {
            Compression::None => "uncompressed",
            Compression::Gzip => "gzip",
            Compression::Zlib => "zlib",
        }
    }
}

/// Inflates `data` completely. Failures are reported as `Decompress` so a
/// corrupt envelope is not mistaken for a corrupt tag stream.
pub fn decompress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let result = match compression {
        Compression::None => return Ok(data.to_vec()),
        Compression::Gzip => GzDecoder::new(data).read_to_end(&mut out),
        Compression::Zlib => ZlibDecoder::new(data).read_to_end(&mut out),
    };
    result.map_err(|source| NbtError::Decompress {
        method: compression.name(),
        source,
    })?;
    Ok(out)
}

pub fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Level::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Level::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
    }
}

/// A named root compound, the unit stored in `level.dat` and in every
/// region file chunk slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NbtFile {
    pub name: String,
    pub root: Compound,
}

impl NbtFile {
    pub fn new(name: impl Into<String>, root: Compound) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Decodes a root compound from `reader`.
    ///
    /// The first tag must be a named compound. Trailing bytes after its end
    /// marker are ignored.
    pub fn read<R: Read>(reader: &mut R, compression: Compression) -> Result<Self> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        Self::from_bytes(&raw, compression)
    }

    pub fn from_bytes(data: &[u8], compression: Compression) -> Result<Self> {
        let plain = decompress(data, compression)?;
        let mut cursor = Cursor::new(plain.as_slice());

        let mut type_byte = [0u8; 1];
        cursor
            .read_exact(&mut type_byte)
            .map_err(|e| NbtError::truncated(e, "root tag"))?;
        let tag_type = TagType::try_from(type_byte[0])?;
        if tag_type != TagType::Compound {
            return Err(NbtError::NotACompound(tag_type));
        }

        let mut len = [0u8; 2];
        cursor
            .read_exact(&mut len)
            .map_err(|e| NbtError::truncated(e, "root name"))?;
        let mut name = vec![0u8; u16::from_be_bytes(len) as usize];
        cursor
            .read_exact(&mut name)
            .map_err(|e| NbtError::truncated(e, "root name"))?;
        let name = String::from_utf8(name)
            .map_err(|e| NbtError::malformed(format!("invalid UTF-8 root name: {e}")))?;

        let root = read_compound(&mut cursor, 1)?;
        Ok(Self { name, root })
    }

    pub fn write<W: Write>(&self, writer: &mut W, compression: Compression) -> Result<()> {
        writer.write_all(&self.to_bytes(compression)?)?;
        Ok(())
    }

    pub fn to_bytes(&self, compression: Compression) -> Result<Vec<u8>> {
        let mut plain = Vec::new();
        plain.push(TagType::Compound.id());
        let name_len = u16::try_from(self.name.len())
            .map_err(|_| NbtError::malformed("root name longer than 65535 bytes"))?;
        plain.extend_from_slice(&name_len.to_be_bytes());
        plain.extend_from_slice(self.name.as_bytes());
        write_compound(&mut plain, &self.root)?;
        compress(&plain, compression)
    }

    /// Reads a gzip-compressed file such as `level.dat`.
    pub fn read_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_bytes(&data, Compression::Gzip)
    }

    pub fn write_path(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_bytes(Compression::Gzip)?)?;
        Ok(())
    }
}

impl Deref for NbtFile {
    type Target = Compound;

    fn deref(&self) -> &Compound {
        &self.root
    }
}

impl DerefMut for NbtFile {
    fn deref_mut(&mut self) -> &mut Compound {
        &mut self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    #[test]
    fn test_root_must_be_compound() {
        // A named int at the top level.
        let bytes = vec![3, 0, 1, b'x', 0, 0, 0, 1];
        let err = NbtFile::from_bytes(&bytes, Compression::None).unwrap_err();
        assert!(matches!(err, NbtError::NotACompound(TagType::Int)));
    }

    #[test]
    fn test_root_needs_a_name() {
        // Type byte only, no name length.
        let err = NbtFile::from_bytes(&[10], Compression::None).unwrap_err();
        assert!(matches!(err, NbtError::MalformedTag(_)));
    }

    #[test]
    fn test_empty_root_name_is_allowed() {
        let bytes = vec![10, 0, 0, 1, 0, 1, b'b', 9, 0];
        let file = NbtFile::from_bytes(&bytes, Compression::None).unwrap();
        assert_eq!(file.name, "");
        assert_eq!(file.get("b"), Some(&Tag::Byte(9)));
    }

    #[test]
    fn test_bad_gzip_is_decompress_error() {
        let err = NbtFile::from_bytes(&[1, 2, 3, 4], Compression::Gzip).unwrap_err();
        assert!(matches!(err, NbtError::Decompress { method: "gzip", .. }));
    }

    #[test]
    fn test_compression_bytes() {
        assert_eq!(Compression::from_byte(2), Some(Compression::Zlib));
        assert_eq!(Compression::from_byte(3), None);
        assert_eq!(Compression::Gzip.as_byte(), 1);
    }
}
