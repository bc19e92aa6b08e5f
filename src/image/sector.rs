/// Sector status records and compression decisions

use std::fmt;

/// How sector compression is decided when writing an IMD track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    /// Keep compressed sectors compressed while their data stays uniform
    #[default]
    AsRead,
    /// Compress every uniform sector
    ForceCompress,
    /// Never compress
    ForceDecompress,
}

/// Per-sector status (the SDR byte), decomposed into its facets
///
/// Only the nine combinations the format defines are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorStatus {
    /// No data could be read; nothing stored in the file
    Unavailable,
    /// Data is present
    Present {
        /// Stored as a single fill byte
        compressed: bool,
        /// Read with a deleted data address mark
        deleted: bool,
        /// Read with a data error
        error: bool,
    },
}

impl SectorStatus {
    /// Plain readable sector
    pub const NORMAL: SectorStatus = SectorStatus::Present {
        compressed: false,
        deleted: false,
        error: false,
    };

    /// Plain compressed sector
    pub const COMPRESSED: SectorStatus = SectorStatus::Present {
        compressed: true,
        deleted: false,
        error: false,
    };

    /// Decode a status byte, `None` outside the nine valid values
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(SectorStatus::Unavailable),
            1..=8 => {
                let bits = value - 1;
                Some(SectorStatus::Present {
                    compressed: bits & 0x01 != 0,
                    deleted: bits & 0x02 != 0,
                    error: bits & 0x04 != 0,
                })
            }
            _ => None,
        }
    }

    /// Encode as a status byte
    pub fn to_wire(self) -> u8 {
        match self {
            SectorStatus::Unavailable => 0,
            SectorStatus::Present {
                compressed,
                deleted,
                error,
            } => 1 + compressed as u8 + ((deleted as u8) << 1) + ((error as u8) << 2),
        }
    }

    /// Check if the sector carries data
    pub fn has_data(&self) -> bool {
        matches!(self, SectorStatus::Present { .. })
    }

    /// Check if the sector is stored compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, SectorStatus::Present { compressed: true, .. })
    }

    /// Check if the sector has a deleted data address mark
    pub fn is_deleted(&self) -> bool {
        matches!(self, SectorStatus::Present { deleted: true, .. })
    }

    /// Check if the sector was read with a data error
    pub fn has_error(&self) -> bool {
        matches!(self, SectorStatus::Present { error: true, .. })
    }

    /// Number of payload bytes stored after the status byte on disk
    pub fn stored_len(&self, sector_size: usize) -> usize {
        match self {
            SectorStatus::Unavailable => 0,
            SectorStatus::Present { compressed: true, .. } => 1,
            SectorStatus::Present { .. } => sector_size,
        }
    }

    /// Check whether two statuses differ only in compression
    pub fn differs_only_in_compression(&self, other: &SectorStatus) -> bool {
        match (self, other) {
            (
                SectorStatus::Present {
                    compressed: c1,
                    deleted: d1,
                    error: e1,
                },
                SectorStatus::Present {
                    compressed: c2,
                    deleted: d2,
                    error: e2,
                },
            ) => c1 != c2 && d1 == d2 && e1 == e2,
            _ => false,
        }
    }

    /// Compute the status to write for a sector holding `data`
    ///
    /// Unavailable sectors stay unavailable. Compression follows `mode`;
    /// a sector is only ever compressed if its data is uniform.
    pub fn resolve(
        self,
        data: &[u8],
        mode: CompressionMode,
        force_non_bad: bool,
        force_non_deleted: bool,
    ) -> SectorStatus {
        match self {
            SectorStatus::Unavailable => SectorStatus::Unavailable,
            SectorStatus::Present {
                compressed,
                deleted,
                error,
            } => {
                let uniform = is_uniform(data).is_some();
                let compressed = match mode {
                    CompressionMode::ForceCompress => uniform,
                    CompressionMode::ForceDecompress => false,
                    CompressionMode::AsRead => compressed && uniform,
                };
                SectorStatus::Present {
                    compressed,
                    deleted: deleted && !force_non_deleted,
                    error: error && !force_non_bad,
                }
            }
        }
    }
}

impl TryFrom<u8> for SectorStatus {
    type Error = crate::error::ImdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SectorStatus::from_wire(value).ok_or_else(|| {
            crate::error::ImdError::invalid_format(format!(
                "Invalid sector status byte 0x{:02X}",
                value
            ))
        })
    }
}

impl From<SectorStatus> for u8 {
    fn from(status: SectorStatus) -> Self {
        status.to_wire()
    }
}

impl fmt::Display for SectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectorStatus::Unavailable => write!(f, "Unavailable"),
            SectorStatus::Present {
                compressed,
                deleted,
                error,
            } => {
                write!(f, "{}", if *compressed { "Compressed" } else { "Normal" })?;
                if *deleted {
                    write!(f, "|DAM")?;
                }
                if *error {
                    write!(f, "|ERR")?;
                }
                Ok(())
            }
        }
    }
}

/// Check if every byte equals the first; returns that byte
///
/// An empty slice is not uniform.
pub fn is_uniform(data: &[u8]) -> Option<u8> {
    let (&first, rest) = data.split_first()?;
    rest.iter().all(|&b| b == first).then_some(first)
}

/// Running totals of sector classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectorStats {
    /// All sectors seen
    pub total: u64,
    /// Sectors stored compressed
    pub compressed: u64,
    /// Sectors with a deleted data address mark
    pub deleted: u64,
    /// Sectors with a data error
    pub bad: u64,
    /// Sectors without data
    pub unavailable: u64,
}

impl SectorStats {
    /// Account one sector
    pub fn record(&mut self, status: SectorStatus) {
        self.total += 1;
        if !status.has_data() {
            self.unavailable += 1;
            return;
        }
        if status.is_compressed() {
            self.compressed += 1;
        }
        if status.is_deleted() {
            self.deleted += 1;
        }
        if status.has_error() {
            self.bad += 1;
        }
    }

    /// Account every sector of a track
    pub fn record_all<I: IntoIterator<Item = SectorStatus>>(&mut self, statuses: I) {
        for status in statuses {
            self.record(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_round_trip() {
        for value in 0..=8u8 {
            let status = SectorStatus::from_wire(value).unwrap();
            assert_eq!(status.to_wire(), value);
        }
        assert_eq!(SectorStatus::from_wire(9), None);
        assert_eq!(SectorStatus::from_wire(0xFF), None);
    }

    #[test]
    fn test_wire_facets() {
        let s = SectorStatus::from_wire(7).unwrap();
        assert!(s.has_data());
        assert!(!s.is_compressed());
        assert!(s.is_deleted());
        assert!(s.has_error());

        let s = SectorStatus::from_wire(4).unwrap();
        assert!(s.is_compressed());
        assert!(s.is_deleted());
        assert!(!s.has_error());

        let s = SectorStatus::from_wire(0).unwrap();
        assert!(!s.has_data());
        assert!(!s.is_compressed());
    }

    #[test]
    fn test_try_from_invalid() {
        let result = SectorStatus::try_from(9u8);
        assert!(result.unwrap_err().is_format_error());
        assert_eq!(SectorStatus::try_from(2u8).unwrap(), SectorStatus::COMPRESSED);
    }

    #[test]
    fn test_stored_len() {
        assert_eq!(SectorStatus::Unavailable.stored_len(512), 0);
        assert_eq!(SectorStatus::COMPRESSED.stored_len(512), 1);
        assert_eq!(SectorStatus::NORMAL.stored_len(512), 512);
    }

    #[test]
    fn test_is_uniform() {
        assert_eq!(is_uniform(&[0xE5; 512]), Some(0xE5));
        assert_eq!(is_uniform(&[0x00]), Some(0x00));
        assert_eq!(is_uniform(&[]), None);

        let mut data = vec![0xE5; 512];
        data[511] = 0xE4;
        assert_eq!(is_uniform(&data), None);
    }

    #[test]
    fn test_resolve_force_compress() {
        let uniform = vec![0xE5; 128];
        let mixed: Vec<u8> = (0..128).map(|i| i as u8).collect();

        let s = SectorStatus::NORMAL.resolve(&uniform, CompressionMode::ForceCompress, false, false);
        assert_eq!(s, SectorStatus::COMPRESSED);

        let s = SectorStatus::NORMAL.resolve(&mixed, CompressionMode::ForceCompress, false, false);
        assert_eq!(s, SectorStatus::NORMAL);
    }

    #[test]
    fn test_resolve_as_read() {
        let uniform = vec![0x00; 128];
        let mut changed = uniform.clone();
        changed[5] = 1;

        // Normal uniform sectors are not compressed as-read
        let s = SectorStatus::NORMAL.resolve(&uniform, CompressionMode::AsRead, false, false);
        assert_eq!(s, SectorStatus::NORMAL);

        let s = SectorStatus::COMPRESSED.resolve(&uniform, CompressionMode::AsRead, false, false);
        assert_eq!(s, SectorStatus::COMPRESSED);

        // Compressed sector whose data was edited must expand
        let s = SectorStatus::COMPRESSED.resolve(&changed, CompressionMode::AsRead, false, false);
        assert_eq!(s, SectorStatus::NORMAL);
    }

    #[test]
    fn test_resolve_force_flags() {
        let data = vec![0x11; 256];
        let s = SectorStatus::from_wire(8).unwrap();

        let r = s.resolve(&data, CompressionMode::ForceDecompress, true, false);
        assert_eq!(r.to_wire(), 3); // normal + DAM

        let r = s.resolve(&data, CompressionMode::AsRead, false, true);
        assert_eq!(r.to_wire(), 6); // compressed + error

        let r = s.resolve(&data, CompressionMode::AsRead, true, true);
        assert_eq!(r, SectorStatus::COMPRESSED);
    }

    #[test]
    fn test_resolve_unavailable() {
        let data = vec![0xE5; 128];
        for mode in [
            CompressionMode::AsRead,
            CompressionMode::ForceCompress,
            CompressionMode::ForceDecompress,
        ] {
            let s = SectorStatus::Unavailable.resolve(&data, mode, true, true);
            assert_eq!(s, SectorStatus::Unavailable);
        }
    }

    #[test]
    fn test_differs_only_in_compression() {
        let normal = SectorStatus::from_wire(5).unwrap();
        let compressed = SectorStatus::from_wire(6).unwrap();
        assert!(normal.differs_only_in_compression(&compressed));
        assert!(!normal.differs_only_in_compression(&SectorStatus::COMPRESSED));
        assert!(!normal.differs_only_in_compression(&normal));
        assert!(!SectorStatus::Unavailable.differs_only_in_compression(&SectorStatus::NORMAL));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SectorStatus::Unavailable.to_string(), "Unavailable");
        assert_eq!(SectorStatus::from_wire(8).unwrap().to_string(), "Compressed|DAM|ERR");
    }

    #[test]
    fn test_stats() {
        let mut stats = SectorStats::default();
        stats.record_all((0..=8).filter_map(SectorStatus::from_wire));

        assert_eq!(stats.total, 9);
        assert_eq!(stats.unavailable, 1);
        assert_eq!(stats.compressed, 4);
        assert_eq!(stats.deleted, 4);
        assert_eq!(stats.bad, 4);
    }
}
