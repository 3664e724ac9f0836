//! Region files (`r.<x>.<z>.mca`): 32x32 chunk slots behind an 8 KiB header.

mod header;

pub use header::{Header, Location};

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use tilecraft_nbt::Compression;

use crate::chunk::Chunk;
use crate::crop::{Crop, NoCrop};
use crate::error::RegionError;
use crate::pos::{ChunkPos, RegionPos};

pub const SECTOR_SIZE: usize = 4096;
pub const HEADER_SIZE: usize = 8192;
pub const CHUNKS_PER_REGION: usize = 1024;

/// Outcome of [`RegionFile::load_chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Ok,
    DoesNotExist,
    /// Decodable, but required tags are missing.
    DataInvalid,
    /// The payload is not a valid (compressed) tag stream.
    NbtError,
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ChunkStatus::Ok => "ok",
            ChunkStatus::DoesNotExist => "does not exist",
            ChunkStatus::DataInvalid => "data invalid",
            ChunkStatus::NbtError => "NBT error",
        };
        f.write_str(text)
    }
}

pub struct RegionFile {
    path: PathBuf,
    pos_original: RegionPos,
    pos: RegionPos,
    rotation: u8,
    crop: Arc<dyn Crop>,

    containing_chunks: BTreeSet<ChunkPos>,
    chunk_exists: Vec<bool>,
    chunk_timestamps: Vec<u32>,
    chunk_data: Vec<Vec<u8>>,
    chunk_compression: Vec<u8>,
}

impl fmt::Debug for RegionFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionFile")
            .field("path", &self.path)
            .field("pos", &self.pos)
            .field("rotation", &self.rotation)
            .field("chunks", &self.containing_chunks.len())
            .finish()
    }
}

impl RegionFile {
    /// Creates a handle for `path`. Nothing is read until
    /// [`read_headers`](Self::read_headers) or [`read_all`](Self::read_all).
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, RegionError> {
        let path = path.into();
        let pos = RegionPos::by_filename(&path)?;
        Ok(Self {
            path,
            pos_original: pos,
            pos,
            rotation: 0,
            crop: Arc::new(NoCrop),
            containing_chunks: BTreeSet::new(),
            chunk_exists: vec![false; CHUNKS_PER_REGION],
            chunk_timestamps: vec![0; CHUNKS_PER_REGION],
            chunk_data: vec![Vec::new(); CHUNKS_PER_REGION],
            chunk_compression: vec![0; CHUNKS_PER_REGION],
        })
    }

    pub fn set_rotation(&mut self, rotation: u8) {
        self.rotation = rotation % 4;
        self.pos = self.pos_original.rotate(self.rotation);
    }

    pub fn set_crop(&mut self, crop: Arc<dyn Crop>) {
        self.crop = crop;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Position after rotation.
    pub fn pos(&self) -> RegionPos {
        self.pos
    }

    pub fn original_pos(&self) -> RegionPos {
        self.pos_original
    }

    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    /// Header slot of a (rotated) chunk position.
    pub fn chunk_index(&self, pos: ChunkPos) -> usize {
        pos.rotate(4 - self.rotation).region_index()
    }

    fn reset(&mut self) {
        self.containing_chunks.clear();
        self.chunk_exists.fill(false);
        self.chunk_timestamps.fill(0);
        self.chunk_compression.fill(0);
        for data in &mut self.chunk_data {
            data.clear();
        }
    }

    // Fills the tables from a parsed header and returns the locations of
    // all present chunks.
    fn apply_header(&mut self, header: &Header, file_size: u64) -> Result<Vec<Location>, RegionError> {
        self.reset();
        for index in 0..CHUNKS_PER_REGION {
            let location = header.locations[index];
            if !location.is_present() {
                continue;
            }
            if file_size < location.byte_offset() + 5 {
                log::error!(
                    "Corrupt region '{}': invalid offset of chunk {}:{}",
                    self.path.display(),
                    index % 32,
                    index / 32
                );
                return Err(RegionError::InvalidChunkOffset {
                    index,
                    offset: location.byte_offset(),
                    file_size,
                });
            }
            self.chunk_timestamps[index] = header.timestamps[index];

            let original = ChunkPos::from_region_local(
                self.pos_original,
                (index % 32) as i32,
                (index / 32) as i32,
            );
            if !self.crop.is_chunk_contained(original) {
                continue;
            }
            self.chunk_exists[index] = true;
            self.containing_chunks.insert(original.rotate(self.rotation));
        }
        Ok(header.locations.clone())
    }

    /// Reads only the header: which chunks exist and their timestamps.
    /// Chunks outside the crop are not listed as present.
    pub fn read_headers(&mut self) -> Result<(), RegionError> {
        let mut file = File::open(&self.path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE as u64 {
            log::error!("Corrupt region '{}': header is too short", self.path.display());
            return Err(RegionError::HeaderTooShort(file_size));
        }
        let mut raw = vec![0u8; HEADER_SIZE];
        file.read_exact(&mut raw)?;
        let header = Header::parse(&raw).ok_or(RegionError::HeaderTooShort(file_size))?;
        self.apply_header(&header, file_size)?;
        Ok(())
    }

    /// Reads the header and the raw payload of every present chunk.
    pub fn read_all(&mut self) -> Result<(), RegionError> {
        let data = fs::read(&self.path)?;
        let file_size = data.len() as u64;
        let header = Header::parse(&data).ok_or_else(|| {
            log::error!("Corrupt region '{}': header is too short", self.path.display());
            RegionError::HeaderTooShort(file_size)
        })?;
        let locations = self.apply_header(&header, file_size)?;

        for (index, location) in locations.iter().enumerate() {
            if !location.is_present() {
                continue;
            }
            let offset = location.byte_offset() as usize;
            let length = BigEndian::read_u32(&data[offset..offset + 4]);
            if length == 0 {
                log::error!(
                    "Corrupt region '{}': size of chunk {}:{} is zero",
                    self.path.display(),
                    index % 32,
                    index / 32
                );
                return Err(RegionError::InvalidChunkSize { index, size: length });
            }
            let size = (length - 1) as usize;
            let start = offset + 5;
            if data.len() < start + size {
                log::error!(
                    "Corrupt region '{}': invalid size of chunk {}:{}",
                    self.path.display(),
                    index % 32,
                    index / 32
                );
                return Err(RegionError::InvalidChunkSize { index, size: length });
            }
            self.chunk_compression[index] = data[offset + 4];
            self.chunk_data[index] = data[start..start + size].to_vec();
        }
        Ok(())
    }

    /// Rebuilds the file at `path` from the in-memory slots. Chunks are
    /// packed in slot order from byte 8192, each padded to a full sector.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), RegionError> {
        let mut header = Header::default();
        header.timestamps.copy_from_slice(&self.chunk_timestamps);

        let mut payload = Vec::new();
        for (index, data) in self.chunk_data.iter().enumerate() {
            if data.is_empty() {
                continue;
            }
            let position = HEADER_SIZE + payload.len();
            let length = u32::try_from(data.len() + 1).map_err(|_| RegionError::InvalidChunkSize {
                index,
                size: u32::MAX,
            })?;

            let mut prefix = [0u8; 4];
            BigEndian::write_u32(&mut prefix, length);
            payload.extend_from_slice(&prefix);
            payload.push(self.chunk_compression[index]);
            payload.extend_from_slice(data);
            let padded = payload.len().div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
            payload.resize(padded, 0);

            header.locations[index] =
                Location::for_payload((position / SECTOR_SIZE) as u32, data.len() + 5);
        }

        let mut out = header.encode();
        out.extend_from_slice(&payload);
        fs::write(path, out)?;
        Ok(())
    }

    /// Writes back to the file this region was opened from.
    pub fn save(&self) -> Result<(), RegionError> {
        self.write(&self.path)
    }

    /// Rotated positions of all chunks present and inside the crop.
    pub fn containing_chunks(&self) -> &BTreeSet<ChunkPos> {
        &self.containing_chunks
    }

    pub fn containing_chunks_count(&self) -> usize {
        self.containing_chunks.len()
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.chunk_exists[self.chunk_index(pos)]
    }

    pub fn chunk_timestamp(&self, pos: ChunkPos) -> u32 {
        self.chunk_timestamps[self.chunk_index(pos)]
    }

    pub fn set_chunk_timestamp(&mut self, pos: ChunkPos, timestamp: u32) {
        let index = self.chunk_index(pos);
        self.chunk_timestamps[index] = timestamp;
    }

    pub fn chunk_data(&self, pos: ChunkPos) -> &[u8] {
        &self.chunk_data[self.chunk_index(pos)]
    }

    pub fn chunk_compression(&self, pos: ChunkPos) -> u8 {
        self.chunk_compression[self.chunk_index(pos)]
    }

    /// Replaces the payload of one slot in memory. Empty `data` removes the
    /// chunk.
    pub fn set_chunk_data(&mut self, pos: ChunkPos, data: Vec<u8>, compression: Compression) {
        let index = self.chunk_index(pos);
        self.chunk_compression[index] = compression.as_byte();
        if data.is_empty() {
            self.chunk_exists[index] = false;
            self.containing_chunks.remove(&pos);
        } else {
            self.chunk_exists[index] = true;
            self.containing_chunks.insert(pos);
        }
        self.chunk_data[index] = data;
    }

    /// Decodes one chunk into `chunk` using this region's rotation and crop.
    pub fn load_chunk(&self, pos: ChunkPos, chunk: &mut Chunk) -> ChunkStatus {
        let index = self.chunk_index(pos);
        let data = &self.chunk_data[index];
        if !self.chunk_exists[index] || data.is_empty() {
            return ChunkStatus::DoesNotExist;
        }

        let Some(compression) = Compression::from_byte(self.chunk_compression[index]) else {
            log::error!(
                "Unable to read chunk at {pos}: unknown compression method {}",
                self.chunk_compression[index]
            );
            return ChunkStatus::DataInvalid;
        };

        chunk.set_rotation(self.rotation);
        chunk.set_crop(Arc::clone(&self.crop));
        match chunk.read_nbt(data, compression) {
            Ok(true) => ChunkStatus::Ok,
            Ok(false) => ChunkStatus::DataInvalid,
            Err(err) => {
                log::error!("Unable to read chunk at {pos}: {err}");
                ChunkStatus::NbtError
            }
        }
    }
}
