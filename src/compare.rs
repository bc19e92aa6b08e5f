/// Track by track comparison of two IMD images

use crate::error::Result;
use crate::format::DEFAULT_FILL_BYTE;
use crate::image::Track;
use crate::io::reader::{load_track_into, read_comment, read_header};
use std::fmt;
use std::io::Read;

/// Set of differences found between two images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffFlags(pub u32);

impl DiffFlags {
    /// Header lines differ
    pub const HEADER: u32 = 0x001;
    /// Comments differ
    pub const COMMENT: u32 = 0x002;
    /// Track header fields or map presence differ
    pub const TRACK_HDR: u32 = 0x004;
    /// Sector, cylinder or head map contents differ
    pub const TRACK_MAP: u32 = 0x008;
    /// Expanded sector data differs
    pub const TRACK_DATA: u32 = 0x010;
    /// Sector status differs beyond compression
    pub const TRACK_FLAG: u32 = 0x020;
    /// Sector status differs only in compression
    pub const COMPRESS: u32 = 0x040;
    /// Detected interleave differs
    pub const INTERLEAVE: u32 = 0x080;
    /// One image has more tracks than the other
    pub const FILE_STRUCT: u32 = 0x100;

    /// Differences that make the images different disks
    pub const HARD: u32 = Self::COMMENT
        | Self::TRACK_HDR
        | Self::TRACK_MAP
        | Self::TRACK_DATA
        | Self::TRACK_FLAG
        | Self::FILE_STRUCT;

    /// Record a difference
    #[inline]
    pub fn set(&mut self, bits: u32) {
        self.0 |= bits;
    }

    /// Check if any of the given bits are set
    #[inline]
    pub fn contains(&self, bits: u32) -> bool {
        (self.0 & bits) != 0
    }

    /// Check if no difference was found
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Check for a hard difference
    #[inline]
    pub fn is_hard(&self) -> bool {
        self.contains(Self::HARD)
    }

    /// Check if the only sector level difference is compression
    pub fn compression_only(&self) -> bool {
        !self.is_hard() && self.contains(Self::COMPRESS)
    }

    /// Check if the only sector level difference is interleave
    pub fn interleave_only(&self) -> bool {
        !self.is_hard() && !self.contains(Self::COMPRESS) && self.contains(Self::INTERLEAVE)
    }
}

impl std::ops::BitOr for DiffFlags {
    type Output = DiffFlags;

    fn bitor(self, rhs: DiffFlags) -> DiffFlags {
        DiffFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for DiffFlags {
    fn bitor_assign(&mut self, rhs: DiffFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for DiffFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "Identical");
        }
        let names = [
            (Self::HEADER, "HEADER"),
            (Self::COMMENT, "COMMENT"),
            (Self::TRACK_HDR, "TRACK_HDR"),
            (Self::TRACK_MAP, "TRACK_MAP"),
            (Self::TRACK_DATA, "TRACK_DATA"),
            (Self::TRACK_FLAG, "TRACK_FLAG"),
            (Self::COMPRESS, "COMPRESS"),
            (Self::INTERLEAVE, "INTERLEAVE"),
            (Self::FILE_STRUCT, "FILE_STRUCT"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", set.join("|"))
    }
}

/// Outcome of comparing two images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompareResult {
    /// Differences found
    pub flags: DiffFlags,
    /// Track pairs examined
    pub tracks_compared: usize,
}

/// Compare two loaded tracks
///
/// When the headers differ nothing else is compared.
pub fn compare_tracks(a: &Track, b: &Track, ignore_compression: bool) -> DiffFlags {
    let mut flags = DiffFlags::default();
    if a.header() != b.header() {
        flags.set(DiffFlags::TRACK_HDR);
        return flags;
    }

    if a.smap() != b.smap() || a.cmap() != b.cmap() || a.hmap() != b.hmap() {
        flags.set(DiffFlags::TRACK_MAP);
    }
    if a.best_interleave() != b.best_interleave() {
        flags.set(DiffFlags::INTERLEAVE);
    }

    for index in 0..a.sector_count() {
        if a.sector_data(index) != b.sector_data(index) {
            flags.set(DiffFlags::TRACK_DATA);
        }
        let (sa, sb) = (a.status(index), b.status(index));
        if sa == sb {
            continue;
        }
        match (sa, sb) {
            (Some(sa), Some(sb)) if sa.differs_only_in_compression(&sb) => {
                if !ignore_compression {
                    flags.set(DiffFlags::COMPRESS);
                }
            }
            _ => flags.set(DiffFlags::TRACK_FLAG),
        }
    }
    flags
}

/// Compare two IMD streams
///
/// Stops after the first track that leaves a hard difference. Read
/// failures in either stream are returned as errors.
pub fn compare_images<R1: Read, R2: Read>(
    mut first: R1,
    mut second: R2,
    ignore_compression: bool,
) -> Result<CompareResult> {
    let mut result = CompareResult::default();

    let header1 = read_header(&mut first)?;
    let header2 = read_header(&mut second)?;
    if header1 != header2 {
        result.flags.set(DiffFlags::HEADER);
    }
    if read_comment(&mut first)? != read_comment(&mut second)? {
        result.flags.set(DiffFlags::COMMENT);
    }

    let mut track1 = Track::default();
    let mut track2 = Track::default();
    loop {
        let more1 = load_track_into(&mut first, &mut track1, DEFAULT_FILL_BYTE)?;
        let more2 = load_track_into(&mut second, &mut track2, DEFAULT_FILL_BYTE)?;
        if more1 != more2 {
            result.flags.set(DiffFlags::FILE_STRUCT);
            break;
        }
        if !more1 {
            break;
        }

        result.tracks_compared += 1;
        result.flags |= compare_tracks(&track1, &track2, ignore_compression);
        if result.flags.is_hard() {
            break;
        }
    }
    Ok(result)
}
