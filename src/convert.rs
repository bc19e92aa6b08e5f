/// Streaming IMD conversion: rewrite, merge, filter and export tracks

use crate::error::Result;
use crate::format::DEFAULT_FILL_BYTE;
use crate::image::interleave::InterleaveMode;
use crate::image::{ImdHeader, SectorStats, Track};
use crate::io::reader::{load_track, read_comment, read_header, skip_comment};
use crate::io::writer::{
    resolved_statuses, write_comment, write_header, write_track_bin, write_track_imd,
    WriteOptions,
};
use log::{debug, warn};
use std::io::{Read, Write};
use std::ops::RangeInclusive;

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// IMD file with header and comment
    #[default]
    Imd,
    /// Raw sector data only
    Binary,
}

/// Tracks to drop, per cylinder and side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackExclusion {
    mask: [u8; 256],
}

impl TrackExclusion {
    /// Side 0 bit
    pub const SIDE_0: u8 = 0x01;
    /// Side 1 bit
    pub const SIDE_1: u8 = 0x02;
    /// Both sides
    pub const BOTH: u8 = Self::SIDE_0 | Self::SIDE_1;

    /// Exclude nothing
    pub fn new() -> Self {
        Self { mask: [0; 256] }
    }

    /// Exclude the given sides of a cylinder
    pub fn exclude(&mut self, cylinder: u8, sides: u8) {
        self.mask[cylinder as usize] |= sides & Self::BOTH;
    }

    /// Exclude the given sides of a range of cylinders
    pub fn exclude_range(&mut self, cylinders: RangeInclusive<u8>, sides: u8) {
        for cylinder in cylinders {
            self.exclude(cylinder, sides);
        }
    }

    /// Check whether a track is excluded
    ///
    /// Head 0 is side 0; every other head counts as side 1.
    pub fn is_excluded(&self, cylinder: u8, head: u8) -> bool {
        let side = if head == 0 { Self::SIDE_0 } else { Self::SIDE_1 };
        self.mask[cylinder as usize] & side != 0
    }

    /// Check whether anything is excluded
    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|&m| m == 0)
    }
}

impl Default for TrackExclusion {
    fn default() -> Self {
        Self::new()
    }
}

/// How the output comment is derived from the input comment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommentEdit {
    /// Copy the input comment
    #[default]
    Keep,
    /// Write this comment instead
    Replace(Vec<u8>),
    /// Add this text after the input comment, on a new line
    Append(Vec<u8>),
}

impl CommentEdit {
    /// Produce the output comment from the input one
    ///
    /// Appending inserts CR LF first unless the input comment is empty or
    /// already ends in a line feed.
    pub fn apply(&self, mut comment: Vec<u8>) -> Vec<u8> {
        match self {
            CommentEdit::Keep => comment,
            CommentEdit::Replace(text) => text.clone(),
            CommentEdit::Append(text) => {
                if comment.last().is_some_and(|&b| b != b'\n') {
                    comment.extend_from_slice(b"\r\n");
                }
                comment.extend_from_slice(text);
                comment
            }
        }
    }
}

/// Options for a conversion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Per-track write options
    pub write: WriteOptions,
    /// Output container
    pub output: OutputFormat,
    /// Fill for unavailable and padded sectors
    pub fill_byte: u8,
    /// Tracks to drop
    pub exclude: TrackExclusion,
    /// Pad tracks with unavailable sectors up to this count
    pub add_missing: Option<u8>,
    /// Creator written into the new header line
    pub creator: String,
    /// Comment handling
    pub comment: CommentEdit,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            write: WriteOptions::default(),
            output: OutputFormat::Imd,
            fill_byte: DEFAULT_FILL_BYTE,
            exclude: TrackExclusion::new(),
            add_missing: None,
            creator: crate::CREATOR.to_string(),
            comment: CommentEdit::Keep,
        }
    }
}

impl ConvertOptions {
    /// Defaults for an output container
    ///
    /// Binary output is written in logical sector order (1:1).
    pub fn for_output(output: OutputFormat) -> Self {
        let mut opts = Self {
            output,
            ..Self::default()
        };
        if output == OutputFormat::Binary {
            opts.write.interleave = InterleaveMode::Factor(1);
        }
        opts
    }
}

/// What a conversion run produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertSummary {
    /// Tracks written to the output
    pub tracks_written: usize,
    /// Tracks dropped by the exclusion list
    pub tracks_excluded: usize,
    /// Sectors added by padding
    pub sectors_added: usize,
    /// Statistics of the sectors as written
    pub stats: SectorStats,
}

/// Convert a single IMD stream
pub fn convert<R: Read, W: Write>(
    input: R,
    output: &mut W,
    opts: &ConvertOptions,
) -> Result<ConvertSummary> {
    run(input, None::<std::io::Empty>, output, opts)
}

/// Convert two IMD streams merged by (cylinder, head)
///
/// The lower track of the two inputs is written first; when both hold the
/// same track the primary copy is kept. Comments come from the primary.
pub fn convert_merged<R1: Read, R2: Read, W: Write>(
    primary: R1,
    secondary: R2,
    output: &mut W,
    opts: &ConvertOptions,
) -> Result<ConvertSummary> {
    run(primary, Some(secondary), output, opts)
}

fn run<R1: Read, R2: Read, W: Write>(
    mut primary: R1,
    mut secondary: Option<R2>,
    output: &mut W,
    opts: &ConvertOptions,
) -> Result<ConvertSummary> {
    read_header(&mut primary)?;
    let comment = read_comment(&mut primary)?;
    if let Some(secondary) = secondary.as_mut() {
        read_header(secondary)?;
        skip_comment(secondary)?;
    }

    if opts.output == OutputFormat::Imd {
        write_header(output, &ImdHeader::new(&opts.creator))?;
        write_comment(output, &opts.comment.apply(comment))?;
    }

    let mut summary = ConvertSummary::default();
    let mut next_primary = load_track(&mut primary, opts.fill_byte)?;
    let mut next_secondary = match secondary.as_mut() {
        Some(r) => load_track(r, opts.fill_byte)?,
        None => None,
    };

    loop {
        let kp = next_primary.as_ref().map(|t| (t.cylinder, t.head));
        let ks = next_secondary.as_ref().map(|t| (t.cylinder, t.head));
        let take_primary = match (kp, ks) {
            (Some(kp), Some(ks)) => {
                if kp == ks {
                    warn!(
                        "Track {}/{} present in both inputs, keeping the primary",
                        kp.0, kp.1
                    );
                    next_secondary = None;
                }
                kp <= ks
            }
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        let mut track = if take_primary {
            let track = next_primary.take();
            next_primary = load_track(&mut primary, opts.fill_byte)?;
            track
        } else {
            next_secondary.take()
        };
        if next_secondary.is_none() {
            if let Some(r) = secondary.as_mut() {
                next_secondary = load_track(r, opts.fill_byte)?;
            }
        }

        if let Some(track) = track.as_mut() {
            process_track(track, output, opts, &mut summary)?;
        }
    }

    debug!(
        "Converted {} tracks ({} excluded, {} sectors added)",
        summary.tracks_written, summary.tracks_excluded, summary.sectors_added
    );
    Ok(summary)
}

fn process_track<W: Write>(
    track: &mut Track,
    output: &mut W,
    opts: &ConvertOptions,
    summary: &mut ConvertSummary,
) -> Result<()> {
    if opts.exclude.is_excluded(track.cylinder, track.head) {
        debug!("Skipping excluded track {}/{}", track.cylinder, track.head);
        summary.tracks_excluded += 1;
        return Ok(());
    }

    if let Some(target) = opts.add_missing {
        let added = track.add_missing_sectors(target as usize, opts.fill_byte);
        if added > 0 {
            debug!(
                "Added {} missing sectors to track {}/{}",
                added, track.cylinder, track.head
            );
        }
        if track.sector_count() < target as usize {
            warn!(
                "Track {}/{} has only {} of {} sectors after padding",
                track.cylinder,
                track.head,
                track.sector_count(),
                target
            );
        }
        summary.sectors_added += added;
    }

    match opts.output {
        OutputFormat::Imd => write_track_imd(output, track, &opts.write)?,
        OutputFormat::Binary => write_track_bin(output, track, &opts.write)?,
    }
    summary.tracks_written += 1;
    summary.stats.record_all(resolved_statuses(track, &opts.write));
    Ok(())
}
