//! Region file header.
//!
//! The header consists of two tables:
//! - Location table: where each chunk is stored
//! - Timestamp table: when each chunk was last saved

use byteorder::{BigEndian, ByteOrder};

use super::{CHUNKS_PER_REGION, HEADER_SIZE, SECTOR_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Start of the payload in 4096-byte sectors. 0 means absent.
    pub sector_offset: u32,
    pub sector_count: u8,
}

impl Location {
    pub fn is_present(&self) -> bool {
        self.sector_offset != 0
    }

    pub fn byte_offset(&self) -> u64 {
        self.sector_offset as u64 * SECTOR_SIZE as u64
    }

    /// Location of a payload of `len` bytes (length prefix and method
    /// byte included) starting at `sector_offset`.
    pub fn for_payload(sector_offset: u32, len: usize) -> Self {
        let sectors = len.div_ceil(SECTOR_SIZE);
        Self {
            sector_offset,
            sector_count: sectors.min(u8::MAX as usize) as u8,
        }
    }
}

/// Both 4 KiB tables of a region file.
#[derive(Debug, Clone)]
pub struct Header {
    pub locations: Vec<Location>,
    pub timestamps: Vec<u32>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            locations: vec![Location::default(); CHUNKS_PER_REGION],
            timestamps: vec![0; CHUNKS_PER_REGION],
        }
    }
}

impl Header {
    /// Parses the first 8192 bytes of `data`. Returns `None` if the slice is
    /// shorter than that.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_SIZE {
            return None;
        }
        let mut header = Header::default();
        for i in 0..CHUNKS_PER_REGION {
            // Each entry: 3 bytes offset + 1 byte sector count
            let entry = &data[i * 4..i * 4 + 4];
            header.locations[i] = Location {
                sector_offset: BigEndian::read_u24(&entry[..3]),
                sector_count: entry[3],
            };
            header.timestamps[i] = BigEndian::read_u32(&data[SECTOR_SIZE + i * 4..]);
        }
        Some(header)
    }

    /// Encodes both tables (8192 bytes).
    pub fn encode(&self) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_SIZE];
        for (i, location) in self.locations.iter().enumerate() {
            let entry = &mut header[i * 4..i * 4 + 4];
            BigEndian::write_u24(&mut entry[..3], location.sector_offset);
            entry[3] = location.sector_count;
        }
        for (i, timestamp) in self.timestamps.iter().enumerate() {
            BigEndian::write_u32(&mut header[SECTOR_SIZE + i * 4..], *timestamp);
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        let header = Header::default().encode();
        assert_eq!(header.len(), 8192);
        assert!(header.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_location_entry_layout() {
        let mut header = Header::default();
        header.locations[1] = Location { sector_offset: 0x010203, sector_count: 4 };
        header.timestamps[1] = 0xdeadbeef;
        let bytes = header.encode();
        assert_eq!(&bytes[4..8], &[1, 2, 3, 4]);
        assert_eq!(&bytes[4100..4104], &[0xde, 0xad, 0xbe, 0xef]);

        let parsed = Header::parse(&bytes).unwrap();
        assert_eq!(parsed.locations[1].byte_offset(), 0x010203 * 4096);
        assert_eq!(parsed.timestamps[1], 0xdeadbeef);
        assert!(!parsed.locations[0].is_present());
    }

    #[test]
    fn test_short_header() {
        assert!(Header::parse(&[0u8; 8191]).is_none());
    }

    #[test]
    fn test_sector_count() {
        assert_eq!(Location::for_payload(2, 5).sector_count, 1);
        assert_eq!(Location::for_payload(2, 4096).sector_count, 1);
        assert_eq!(Location::for_payload(2, 4097).sector_count, 2);
        assert_eq!(Location::for_payload(2, 4096 * 300).sector_count, 255);
    }
}
