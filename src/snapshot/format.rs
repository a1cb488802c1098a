//! Binary format for session snapshots.

use std::io::{self, Read, Write};

use crate::schema::{NeighborSet, RuleSet};

/// Magic bytes identifying a session snapshot.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"LIFE";

/// Current format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Flag bit: cell bytes are LZ4-compressed.
const FLAG_LZ4: u16 = 1;

/// Snapshot header.
///
/// Magic(4) + Version(2) + Flags(2) + Width(4) + Height(4) + Density(4) +
/// Frequency(8) + Born(2) + Survive(2) + Reserved(8) = 40
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotHeader {
    pub width: u32,
    pub height: u32,
    pub density: u32,
    pub frequency: f64,
    pub rules: RuleSet,
    pub compressed: bool,
}

impl SnapshotHeader {
    pub const SIZE: usize = 40;

    /// Number of cell bytes that follow the header once decompressed.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let flags = if self.compressed { FLAG_LZ4 } else { 0 };
        w.write_all(SNAPSHOT_MAGIC)?;
        w.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        w.write_all(&flags.to_le_bytes())?;
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&self.density.to_le_bytes())?;
        w.write_all(&self.frequency.to_le_bytes())?;
        w.write_all(&self.rules.born.mask().to_le_bytes())?;
        w.write_all(&self.rules.survive.mask().to_le_bytes())?;
        // Reserved bytes
        w.write_all(&[0u8; 8])?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, SnapshotError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }

        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];
        let mut buf8 = [0u8; 8];

        r.read_exact(&mut buf2)?;
        let version = u16::from_le_bytes(buf2);
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        r.read_exact(&mut buf2)?;
        let flags = u16::from_le_bytes(buf2);

        r.read_exact(&mut buf4)?;
        let width = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let height = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let density = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf8)?;
        let frequency = f64::from_le_bytes(buf8);

        r.read_exact(&mut buf2)?;
        let born = NeighborSet::from_mask(u16::from_le_bytes(buf2));

        r.read_exact(&mut buf2)?;
        let survive = NeighborSet::from_mask(u16::from_le_bytes(buf2));

        // Skip reserved bytes
        r.read_exact(&mut buf8)?;

        Ok(Self {
            width,
            height,
            density,
            frequency,
            rules: RuleSet { born, survive },
            compressed: flags & FLAG_LZ4 != 0,
        })
    }
}

/// Everything needed to resume a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub width: usize,
    pub height: usize,
    pub density: u32,
    pub frequency: f64,
    pub rules: RuleSet,
    /// Row-major cell bytes of the current buffer.
    pub cells: Vec<u8>,
}

impl SessionSnapshot {
    /// Encode to the binary blob. Cells are LZ4-compressed when the `lz4`
    /// feature is enabled.
    pub fn encode(&self) -> Vec<u8> {
        let compressed = cfg!(feature = "lz4");
        let header = SnapshotHeader {
            width: self.width as u32,
            height: self.height as u32,
            density: self.density,
            frequency: self.frequency,
            rules: self.rules,
            compressed,
        };

        let mut blob = Vec::with_capacity(SnapshotHeader::SIZE + self.cells.len());
        // Writing into a Vec cannot fail
        let _ = header.write_to(&mut blob);
        if compressed {
            blob.extend_from_slice(&compress_lz4(&self.cells));
        } else {
            blob.extend_from_slice(&self.cells);
        }
        blob
    }

    /// Decode a blob produced by `encode`.
    pub fn decode(blob: &[u8]) -> Result<Self, SnapshotError> {
        let mut reader = blob;
        let header = SnapshotHeader::read_from(&mut reader)?;
        if header.width == 0 || header.height == 0 {
            return Err(SnapshotError::EmptyGrid);
        }

        let cells = if header.compressed {
            decompress_lz4(reader)?
        } else {
            reader.to_vec()
        };
        if cells.len() != header.cell_count() {
            return Err(SnapshotError::SizeMismatch {
                expected: header.cell_count(),
                actual: cells.len(),
            });
        }

        Ok(Self {
            width: header.width as usize,
            height: header.height as usize,
            density: header.density,
            frequency: header.frequency,
            rules: header.rules,
            cells,
        })
    }
}

/// Compress data using LZ4.
#[cfg(feature = "lz4")]
pub fn compress_lz4(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress LZ4 data.
#[cfg(feature = "lz4")]
pub fn decompress_lz4(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| SnapshotError::Decompress(e.to_string()))
}

/// Fallback when LZ4 is not available.
#[cfg(not(feature = "lz4"))]
pub fn compress_lz4(data: &[u8]) -> Vec<u8> {
    data.to_vec()
}

#[cfg(not(feature = "lz4"))]
pub fn decompress_lz4(_data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    Err(SnapshotError::Decompress(
        "snapshot is LZ4-compressed but the lz4 feature is disabled".to_string(),
    ))
}

/// Snapshot decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid LIFE magic bytes")]
    BadMagic,
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u16),
    #[error("Snapshot grid has zero width or height")]
    EmptyGrid,
    #[error("Snapshot holds {actual} cells, header says {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Snapshot decompression failed: {0}")]
    Decompress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionSnapshot {
        SessionSnapshot {
            width: 4,
            height: 3,
            density: 6,
            frequency: 12.5,
            rules: "B36/S23".parse().unwrap(),
            cells: vec![0, 1, 0, 0, 1, 1, 0, 0, 0, 0, 0, 1],
        }
    }

    #[test]
    fn test_header_size() {
        let header = SnapshotHeader {
            width: 1,
            height: 1,
            density: 1,
            frequency: 1.0,
            rules: RuleSet::conway(),
            compressed: false,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), SnapshotHeader::SIZE);
        assert_eq!(&buf[..4], SNAPSHOT_MAGIC);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let snapshot = sample();
        let decoded = SessionSnapshot::decode(&snapshot.encode()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            SessionSnapshot::decode(b"NOPE and some more bytes to read"),
            Err(SnapshotError::BadMagic)
        ));
        assert!(matches!(
            SessionSnapshot::decode(b"LI"),
            Err(SnapshotError::Io(_))
        ));

        let mut blob = sample().encode();
        blob[4] = 9;
        assert!(matches!(
            SessionSnapshot::decode(&blob),
            Err(SnapshotError::UnsupportedVersion(9))
        ));
    }

    #[cfg(not(feature = "lz4"))]
    #[test]
    fn test_decode_rejects_truncated_cells() {
        let mut blob = sample().encode();
        blob.pop();
        assert!(matches!(
            SessionSnapshot::decode(&blob),
            Err(SnapshotError::SizeMismatch {
                expected: 12,
                actual: 11
            })
        ));
    }
}
