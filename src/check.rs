/// Streaming consistency checks over an IMD file
///
/// The checker records facts as bits in [`CheckFailures`]; classifying
/// them as errors or warnings is left to the caller.

use crate::image::interleave::{calculate_best_interleave, Interleave};
use crate::image::sector::{SectorStats, SectorStatus};
use crate::image::track::has_duplicates;
use crate::io::reader::{read_byte, read_full, read_header, read_track_header, skip_comment};
use std::fmt;
use std::io::{self, Read, Seek};

/// Set of failed checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckFailures(pub u32);

impl CheckFailures {
    /// Header line missing or malformed
    pub const HEADER: u32 = 0x0001;
    /// Comment terminator not found
    pub const COMMENT_TERM: u32 = 0x0002;
    /// Track header, maps or sector data could not be read
    pub const TRACK_READ: u32 = 0x0004;
    /// Stream position could not be determined
    pub const FTELL: u32 = 0x0008;
    /// Cylinder above the allowed maximum
    pub const CON_CYL: u32 = 0x0010;
    /// Head other than the required one
    pub const CON_HEAD: u32 = 0x0020;
    /// More sectors than allowed on a track
    pub const CON_SECTORS: u32 = 0x0040;
    /// Cylinder lower than the previous track on the same side
    pub const SEQ_CYL_DEC: u32 = 0x0080;
    /// Head not ascending within a cylinder
    pub const SEQ_HEAD_ORDER: u32 = 0x0100;
    /// Sector id repeated within a track
    pub const DUPE_SID: u32 = 0x0200;
    /// Sector status byte outside the defined values
    pub const INV_SFLAG_VALUE: u32 = 0x0400;
    /// Some sector was read with a data error
    pub const SFLAG_DATA_ERR: u32 = 0x0800;
    /// Some sector carries a deleted data address mark
    pub const SFLAG_DEL_DAM: u32 = 0x1000;
    /// Sides end at different cylinders
    pub const DIFF_MAX_CYL: u32 = 0x2000;
    /// Head value above 1
    pub const HEAD_RANGE: u32 = 0x4000;

    /// Every defined bit, lowest first
    pub const ALL: [u32; 15] = [
        Self::HEADER,
        Self::COMMENT_TERM,
        Self::TRACK_READ,
        Self::FTELL,
        Self::CON_CYL,
        Self::CON_HEAD,
        Self::CON_SECTORS,
        Self::SEQ_CYL_DEC,
        Self::SEQ_HEAD_ORDER,
        Self::DUPE_SID,
        Self::INV_SFLAG_VALUE,
        Self::SFLAG_DATA_ERR,
        Self::SFLAG_DEL_DAM,
        Self::DIFF_MAX_CYL,
        Self::HEAD_RANGE,
    ];

    /// Create from a raw mask
    #[inline]
    pub fn new(value: u32) -> Self {
        CheckFailures(value)
    }

    /// Record a failure
    #[inline]
    pub fn set(&mut self, bit: u32) {
        self.0 |= bit;
    }

    /// Check if any of the given bits failed
    #[inline]
    pub fn contains(&self, bits: u32) -> bool {
        (self.0 & bits) != 0
    }

    /// Check if nothing failed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Failures selected by `mask`
    pub fn errors(&self, mask: u32) -> CheckFailures {
        CheckFailures(self.0 & mask)
    }

    /// Failures not selected by `mask`
    pub fn warnings(&self, mask: u32) -> CheckFailures {
        CheckFailures(self.0 & !mask)
    }

    /// Iterate over the failed bits, lowest first
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        Self::ALL.into_iter().filter(move |&bit| self.contains(bit))
    }

    /// Human readable name of a single bit
    pub fn describe(bit: u32) -> &'static str {
        match bit {
            Self::HEADER => "Invalid Header",
            Self::COMMENT_TERM => "Bad Comment Terminator",
            Self::TRACK_READ => "Track Read Failure",
            Self::FTELL => "Stream Position Failure",
            Self::CON_CYL => "Cylinder Constraint Violation",
            Self::CON_HEAD => "Head Constraint Violation",
            Self::CON_SECTORS => "Sector Constraint Violation",
            Self::SEQ_CYL_DEC => "Cylinder Sequence Decrease",
            Self::SEQ_HEAD_ORDER => "Head Sequence Out of Order",
            Self::DUPE_SID => "Duplicate Sector ID",
            Self::INV_SFLAG_VALUE => "Invalid Sector Flag Value",
            Self::SFLAG_DATA_ERR => "Data Error Flag Set",
            Self::SFLAG_DEL_DAM => "Deleted DAM Flag Set",
            Self::DIFF_MAX_CYL => "Max Cylinder Differs Between Sides",
            Self::HEAD_RANGE => "Head Value Out of Range",
            _ => "Unknown Check",
        }
    }
}

impl fmt::Display for CheckFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "OK");
        }
        let names: Vec<&str> = self.iter().map(Self::describe).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Failures treated as errors unless the caller chooses otherwise
///
/// Everything except the sequence, flag and max-cylinder checks.
pub const DEFAULT_ERROR_MASK: u32 = CheckFailures::HEADER
    | CheckFailures::COMMENT_TERM
    | CheckFailures::TRACK_READ
    | CheckFailures::FTELL
    | CheckFailures::CON_CYL
    | CheckFailures::CON_HEAD
    | CheckFailures::CON_SECTORS
    | CheckFailures::DUPE_SID
    | CheckFailures::INV_SFLAG_VALUE
    | CheckFailures::HEAD_RANGE;

/// Optional geometry constraints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Highest cylinder allowed
    pub max_cylinder: Option<u8>,
    /// Head every track must be on
    pub required_head: Option<u8>,
    /// Most sectors allowed on a track
    pub max_sectors: Option<u8>,
}

/// Outcome of a check run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResults {
    /// Tracks whose header was read
    pub track_count: usize,
    /// Highest cylinder seen on each of heads 0 and 1
    pub max_cylinder: [Option<u8>; 2],
    /// Highest head value seen
    pub max_head: Option<u8>,
    /// Sector totals
    pub stats: SectorStats,
    /// Interleave of the first track
    pub interleave: Option<Interleave>,
    /// Failed checks
    pub failures: CheckFailures,
}

impl CheckResults {
    /// Number of sides seen
    pub fn sides(&self) -> usize {
        self.max_head.map_or(0, |h| h as usize + 1)
    }
}

/// Scan an IMD stream and check its structure
///
/// Sector payloads are skipped rather than loaded. Structural failures
/// (header, comment, track read, position, invalid status) end the scan;
/// results gathered up to that point are kept.
///
/// Status bytes are read one at a time, so file streams should be wrapped
/// in a `BufReader`.
pub fn run_checks<R: Read + Seek>(mut reader: R, opts: &CheckOptions) -> CheckResults {
    let mut results = CheckResults::default();

    if read_header(&mut reader).is_err() {
        results.failures.set(CheckFailures::HEADER);
        return results;
    }
    if skip_comment(&mut reader).is_err() {
        results.failures.set(CheckFailures::COMMENT_TERM);
        return results;
    }

    let mut prev: Option<(u8, u8)> = None;
    let mut last_cyl: [Option<u8>; 2] = [None, None];
    let mut smap = Vec::new();
    let mut maps = Vec::new();

    loop {
        if reader.stream_position().is_err() {
            results.failures.set(CheckFailures::FTELL);
            break;
        }
        let header = match read_track_header(&mut reader) {
            Ok(Some(h)) => h,
            Ok(None) => break,
            Err(_) => {
                results.failures.set(CheckFailures::TRACK_READ);
                break;
            }
        };
        results.track_count += 1;

        let (cyl, head) = (header.cylinder, header.head);
        if opts.max_cylinder.is_some_and(|max| cyl > max) {
            results.failures.set(CheckFailures::CON_CYL);
        }
        if opts.required_head.is_some_and(|req| head != req) {
            results.failures.set(CheckFailures::CON_HEAD);
        }
        if opts.max_sectors.is_some_and(|max| header.sector_count > max) {
            results.failures.set(CheckFailures::CON_SECTORS);
        }

        results.max_head = results.max_head.max(Some(head));
        match (
            last_cyl.get_mut(head as usize),
            results.max_cylinder.get_mut(head as usize),
        ) {
            (Some(last), Some(side_max)) => {
                if last.is_some_and(|last| cyl < last) {
                    results.failures.set(CheckFailures::SEQ_CYL_DEC);
                }
                *last = Some(cyl);
                *side_max = (*side_max).max(Some(cyl));
            }
            _ => results.failures.set(CheckFailures::HEAD_RANGE),
        }
        if let Some((prev_cyl, prev_head)) = prev {
            if cyl == prev_cyl && head <= prev_head {
                results.failures.set(CheckFailures::SEQ_HEAD_ORDER);
            }
        }
        prev = Some((cyl, head));

        let sector_size = match header.sector_size() {
            Some(size) => size,
            None => {
                results.failures.set(CheckFailures::TRACK_READ);
                break;
            }
        };

        let count = header.sector_count as usize;
        smap.resize(count, 0);
        maps.resize(header.maps_len() - count, 0);
        if !fill(&mut reader, &mut smap) || !fill(&mut reader, &mut maps) {
            results.failures.set(CheckFailures::TRACK_READ);
            break;
        }
        if has_duplicates(&smap) {
            results.failures.set(CheckFailures::DUPE_SID);
        }
        if results.interleave.is_none() {
            results.interleave = Some(calculate_best_interleave(&smap));
        }

        match scan_sectors(&mut reader, count, sector_size, &mut results) {
            Ok(()) => {}
            Err(bit) => {
                results.failures.set(bit);
                break;
            }
        }
    }

    if let [Some(side0), Some(side1)] = results.max_cylinder {
        if side0 != side1 {
            results.failures.set(CheckFailures::DIFF_MAX_CYL);
        }
    }
    results
}

/// Read status bytes and skip payloads; returns the bit that ends the scan
fn scan_sectors<R: Read>(
    reader: &mut R,
    count: usize,
    sector_size: usize,
    results: &mut CheckResults,
) -> std::result::Result<(), u32> {
    for _ in 0..count {
        let byte = match read_byte(reader) {
            Ok(Some(b)) => b,
            _ => return Err(CheckFailures::TRACK_READ),
        };
        let status = SectorStatus::from_wire(byte).ok_or(CheckFailures::INV_SFLAG_VALUE)?;
        results.stats.record(status);
        if status.has_error() {
            results.failures.set(CheckFailures::SFLAG_DATA_ERR);
        }
        if status.is_deleted() {
            results.failures.set(CheckFailures::SFLAG_DEL_DAM);
        }

        let len = status.stored_len(sector_size) as u64;
        match io::copy(&mut reader.by_ref().take(len), &mut io::sink()) {
            Ok(n) if n == len => {}
            _ => return Err(CheckFailures::TRACK_READ),
        }
    }
    Ok(())
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> bool {
    matches!(read_full(reader, buf), Ok(n) if n == buf.len())
}
