/// Drive recommendations for writing an image back to real media

use crate::error::{ImdError, Result};
use crate::io::reader::{read_header, read_track_header, skip_comment, skip_track_body};
use std::fmt;
use std::io::Read;

/// Bytes per second at 500 kbps
const BYTES_PER_SEC_500K: u32 = 62_500;
/// Guessed per-sector overhead (gaps, address mark, CRC)
const SECTOR_OVERHEAD: u32 = 85;
/// Guessed per-track overhead (index gap)
const TRACK_OVERHEAD: u32 = 85;

/// Data rates by `mode % 3`
const RATES_KBPS: [u16; 3] = [500, 300, 250];

/// Physical drive able to write an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriveType {
    /// 3.5" double density, 80 tracks
    D35Dd,
    /// 3.5" high density, 80 tracks
    D35Hd,
    /// 5.25" double density, 40 tracks
    D525Dd40,
    /// 5.25" quad density, 80 tracks
    D525Dd80,
    /// 5.25" high density, 80 tracks
    D525Hd,
    /// 8" single or double sided, 77 tracks
    D8,
}

impl DriveType {
    /// Cylinders the drive can step to
    pub fn tracks(self) -> u8 {
        match self {
            DriveType::D525Dd40 => 40,
            DriveType::D8 => 77,
            _ => 80,
        }
    }
}

impl fmt::Display for DriveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriveType::D35Dd => "3.5\" DD 80-track",
            DriveType::D35Hd => "3.5\" HD 80-track",
            DriveType::D525Dd40 => "5.25\" DD 40-track",
            DriveType::D525Dd80 => "5.25\" QD 80-track",
            DriveType::D525Hd => "5.25\" HD 80-track",
            DriveType::D8 => "8\" SS/DS 77-track",
        };
        f.write_str(name)
    }
}

/// Setting needed when writing with a given drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriveOption {
    /// Step twice per cylinder
    DoubleStep,
    /// Write 300 kbps tracks at 250 kbps
    Translate300To250,
    /// Write 250 kbps tracks at 300 kbps
    Translate250To300,
}

impl fmt::Display for DriveOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriveOption::DoubleStep => "DS=1 (Double Step)",
            DriveOption::Translate300To250 => "T300=250",
            DriveOption::Translate250To300 => "T250=300",
        };
        f.write_str(name)
    }
}

/// Caveat attached to a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriveNote {
    /// Image has at most 40 cylinders
    FortyTrack,
    /// Image has exactly 77 cylinders
    SeventySevenTrack,
    /// Tracks are short enough for a 360 RPM drive
    Rpm360,
}

impl fmt::Display for DriveNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DriveNote::FortyTrack => {
                "40 track image will use only first half of 80 track drive"
            }
            DriveNote::SeventySevenTrack => "77 track image likely requires an 8\" drive",
            DriveNote::Rpm360 => {
                "Track size suggests 360 RPM drive; writing on 300 RPM may work but leave extra gap"
            }
        };
        f.write_str(text)
    }
}

/// A drive with the options and notes that apply to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    /// Drive type
    pub drive: DriveType,
    /// Options to use, in a fixed order
    pub options: Vec<DriveOption>,
    /// Caveats, in a fixed order
    pub notes: Vec<DriveNote>,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  IMD Options: ", self.drive)?;
        if self.options.is_empty() {
            return write!(f, "(none)");
        }
        let options: Vec<String> = self.options.iter().map(|o| o.to_string()).collect();
        write!(f, "{}", options.join(", "))
    }
}

/// Geometry and drive recommendations for an image
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalysisResult {
    /// Tracks in the image
    pub track_count: usize,
    /// Highest cylinder number
    pub max_cylinder: u8,
    /// Highest head number
    pub max_head: u8,
    /// Data rates used, ascending
    pub data_rates: Vec<u16>,
    /// Estimated raw size of the largest track in bytes
    pub max_track_bytes: u32,
    /// Drives able to write the image, most likely first
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisResult {
    /// Cylinders a drive must reach
    pub fn cylinders(&self) -> usize {
        if self.track_count == 0 {
            0
        } else {
            self.max_cylinder as usize + 1
        }
    }

    /// Heads a drive must have
    pub fn heads(&self) -> usize {
        if self.track_count == 0 {
            0
        } else {
            self.max_head as usize + 1
        }
    }

    /// Every note used by any recommendation, without repeats
    pub fn notes(&self) -> Vec<DriveNote> {
        let mut notes: Vec<DriveNote> = self
            .recommendations
            .iter()
            .flat_map(|r| r.notes.iter().copied())
            .collect();
        notes.sort();
        notes.dedup();
        notes
    }
}

/// Estimated raw bytes of a track with `count` sectors of `size` bytes
pub fn estimate_track_bytes(sector_size: usize, count: u8) -> u32 {
    if count == 0 {
        return 0;
    }
    (sector_size as u32 + SECTOR_OVERHEAD) * count as u32 + TRACK_OVERHEAD
}

/// Scan an IMD stream and recommend drives that can write it
///
/// Only track headers are examined; sector payloads are skipped. Fails
/// with `MixedDataRates` when tracks use more than one data rate.
pub fn analyze<R: Read>(mut reader: R) -> Result<AnalysisResult> {
    read_header(&mut reader)?;
    skip_comment(&mut reader)?;

    let mut result = AnalysisResult::default();
    let mut rates_seen = [false; 3];
    while let Some(header) = read_track_header(&mut reader)? {
        skip_track_body(&mut reader, &header)?;
        result.track_count += 1;
        result.max_cylinder = result.max_cylinder.max(header.cylinder);
        result.max_head = result.max_head.max(header.head);
        rates_seen[header.mode as usize % 3] = true;

        let size = header.sector_size().unwrap_or(0);
        result.max_track_bytes = result
            .max_track_bytes
            .max(estimate_track_bytes(size, header.sector_count));
    }

    let mut rates: Vec<u16> = RATES_KBPS
        .iter()
        .zip(rates_seen)
        .filter(|(_, seen)| *seen)
        .map(|(&rate, _)| rate)
        .collect();
    rates.sort_unstable();
    if rates.len() > 1 {
        return Err(ImdError::MixedDataRates { rates });
    }
    result.data_rates = rates;
    result.recommendations = recommend(&result);
    Ok(result)
}

/// Conditions shared by every recommendation for an image
struct Fit {
    forty_track: bool,
    notes: Vec<DriveNote>,
}

impl Fit {
    fn drive(&self, drive: DriveType, translate: Option<DriveOption>) -> Recommendation {
        let mut options = Vec::new();
        let mut notes = self.notes.clone();
        if self.forty_track && drive != DriveType::D525Dd40 {
            options.push(DriveOption::DoubleStep);
        } else {
            notes.retain(|&n| n != DriveNote::FortyTrack);
        }
        options.extend(translate);
        Recommendation {
            drive,
            options,
            notes,
        }
    }
}

fn recommend(result: &AnalysisResult) -> Vec<Recommendation> {
    let rate = match result.data_rates.first() {
        Some(&rate) => rate,
        None => return Vec::new(),
    };

    let forty_track = result.max_cylinder < 40;
    let mut notes = Vec::new();
    if forty_track {
        notes.push(DriveNote::FortyTrack);
    }
    if result.max_cylinder == 76 {
        notes.push(DriveNote::SeventySevenTrack);
    }
    if rate == 500 && result.max_track_bytes < BYTES_PER_SEC_500K / 6 {
        notes.push(DriveNote::Rpm360);
    }
    let fit = Fit { forty_track, notes };

    let mut drives = Vec::new();
    match rate {
        500 => {
            drives.push(fit.drive(DriveType::D35Hd, None));
            drives.push(fit.drive(DriveType::D525Hd, None));
            if result.max_cylinder < DriveType::D8.tracks() {
                drives.push(fit.drive(DriveType::D8, None));
            }
        }
        300 => {
            let t32 = Some(DriveOption::Translate300To250);
            drives.push(fit.drive(DriveType::D525Hd, t32));
            drives.push(fit.drive(DriveType::D35Dd, None));
            drives.push(fit.drive(DriveType::D35Hd, None));
            drives.push(fit.drive(DriveType::D525Dd80, t32));
            if forty_track {
                drives.push(fit.drive(DriveType::D525Dd40, t32));
            }
        }
        _ => {
            if forty_track {
                drives.push(fit.drive(DriveType::D525Dd40, None));
            }
            drives.push(fit.drive(DriveType::D525Dd80, None));
            drives.push(fit.drive(DriveType::D525Hd, Some(DriveOption::Translate250To300)));
            drives.push(fit.drive(DriveType::D35Dd, None));
            drives.push(fit.drive(DriveType::D35Hd, None));
        }
    }
    drives
}
